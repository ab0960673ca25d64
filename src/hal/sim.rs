use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    thread,
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Driver, Edge, Handler, Pin};
use crate::{
    axis::config::{ServoConfig, StepperConfig},
    machine::config::MachineConfig,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    pub x_travel: i32,
    pub y_travel: i32,
    pub z_travel: i32,
    pub realtime: bool,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            x_travel: 900,
            y_travel: 900,
            z_travel: 150,
            realtime: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StepperRig {
    pub step_pin: Pin,
    pub dir_pin: Pin,
    pub limit1_pin: Pin,
    pub limit2_pin: Pin,
    pub active_high: bool,
    pub position: i32,
    // Limit 1 reads asserted while position <= limit1_at.
    pub limit1_at: i32,
    // Limit 2 reads asserted while position >= limit2_at.
    pub limit2_at: i32,
}

impl StepperRig {
    pub fn for_axis(config: &StepperConfig, travel: i32) -> Self {
        Self {
            step_pin: config.step_pin,
            dir_pin: config.dir_pin,
            limit1_pin: config.limits.limit1,
            limit2_pin: config.limits.limit2,
            active_high: config.limits.active_high,
            position: travel / 2,
            limit1_at: 0,
            limit2_at: travel,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DcRig {
    pub plus_pin: Pin,
    pub minus_pin: Pin,
    pub encoder_pin: Pin,
    pub limit1_pin: Pin,
    pub limit2_pin: Pin,
    pub active_high: bool,
    pub position: i32,
    pub limit1_at: i32,
    pub limit2_at: i32,
}

impl DcRig {
    pub fn for_axis(config: &ServoConfig, travel: i32) -> Self {
        Self {
            plus_pin: config.plus_pin,
            minus_pin: config.minus_pin,
            encoder_pin: config.encoder_pin,
            limit1_pin: config.limits.limit1,
            limit2_pin: config.limits.limit2,
            active_high: config.limits.active_high,
            position: travel / 2,
            limit1_at: 0,
            limit2_at: travel,
        }
    }
}

#[derive(Default)]
struct BenchState {
    outputs: HashMap<Pin, u8>,
    steppers: Vec<StepperRig>,
    dc: Option<DcRig>,
    pulses: HashMap<Pin, u32>,
    interrupts: Vec<(Pin, Edge, Handler)>,
    masked: HashSet<Pin>,
    timers: Vec<(Duration, Handler)>,
    elapsed_us: u64,
}

impl BenchState {
    fn duty(&self, pin: Pin) -> u8 {
        self.outputs.get(&pin).copied().unwrap_or(0)
    }

    fn limit_level(&self, pin: Pin) -> Option<bool> {
        for rig in &self.steppers {
            if rig.limit1_pin == pin {
                return Some((rig.position <= rig.limit1_at) == rig.active_high);
            }
            if rig.limit2_pin == pin {
                return Some((rig.position >= rig.limit2_at) == rig.active_high);
            }
        }
        let dc = self.dc.as_ref()?;
        if dc.limit1_pin == pin {
            return Some((dc.position <= dc.limit1_at) == dc.active_high);
        }
        if dc.limit2_pin == pin {
            return Some((dc.position >= dc.limit2_at) == dc.active_high);
        }
        None
    }
}

#[derive(Default)]
pub struct SimBench {
    state: Mutex<BenchState>,
    realtime: bool,
}

impl SimBench {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn realtime() -> Self {
        Self {
            state: Mutex::default(),
            realtime: true,
        }
    }

    pub fn for_machine(machine: &MachineConfig, config: &BenchConfig) -> Self {
        let bench = if config.realtime {
            Self::realtime()
        } else {
            Self::new()
        };
        bench.add_stepper(StepperRig::for_axis(&machine.x, config.x_travel));
        bench.add_stepper(StepperRig::for_axis(&machine.y, config.y_travel));
        bench.set_dc(DcRig::for_axis(&machine.z, config.z_travel));
        bench
    }

    fn lock(&self) -> MutexGuard<'_, BenchState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_stepper(&self, rig: StepperRig) {
        self.lock().steppers.push(rig);
    }

    pub fn set_dc(&self, rig: DcRig) {
        self.lock().dc = Some(rig);
    }

    pub fn stepper_position(&self, step_pin: Pin) -> Option<i32> {
        self.lock()
            .steppers
            .iter()
            .find(|rig| rig.step_pin == step_pin)
            .map(|rig| rig.position)
    }

    pub fn set_stepper_position(&self, step_pin: Pin, position: i32) {
        if let Some(rig) = self
            .lock()
            .steppers
            .iter_mut()
            .find(|rig| rig.step_pin == step_pin)
        {
            rig.position = position;
        }
    }

    pub fn dc_position(&self) -> Option<i32> {
        self.lock().dc.as_ref().map(|dc| dc.position)
    }

    pub fn pulses(&self, pin: Pin) -> u32 {
        self.lock().pulses.get(&pin).copied().unwrap_or(0)
    }

    pub fn duty(&self, pin: Pin) -> u8 {
        self.lock().duty(pin)
    }

    pub fn output_high(&self, pin: Pin) -> bool {
        self.duty(pin) > 0
    }

    pub fn interrupt_enabled(&self, pin: Pin) -> bool {
        !self.lock().masked.contains(&pin)
    }

    pub fn timer_count(&self) -> usize {
        self.lock().timers.len()
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.lock().elapsed_us)
    }

    pub fn fire_timers(&self) {
        let timers: Vec<Handler> = self
            .lock()
            .timers
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();
        for handler in timers {
            handler();
        }
        self.advance_motor();
    }

    pub fn advance_motor(&self) {
        let handlers: Vec<Handler> = {
            let mut state = self.lock();
            let (plus, minus, encoder) = match state.dc.as_ref() {
                Some(dc) => (
                    state.duty(dc.plus_pin) > 0,
                    state.duty(dc.minus_pin) > 0,
                    dc.encoder_pin,
                ),
                None => return,
            };
            let delta = match (plus, minus) {
                (true, false) => 1,
                (false, true) => -1,
                _ => return,
            };
            if let Some(dc) = state.dc.as_mut() {
                dc.position += delta;
            }
            if state.masked.contains(&encoder) {
                return;
            }
            state
                .interrupts
                .iter()
                .filter(|(pin, _, _)| *pin == encoder)
                .map(|(_, _, handler)| handler.clone())
                .collect()
        };
        for handler in handlers {
            handler();
        }
    }

    pub fn start_timers(self: &Arc<Self>, period: Duration) {
        let bench: Weak<Self> = Arc::downgrade(self);
        thread::spawn(move || {
            debug!("Bench timer thread started ({:?})", period);
            loop {
                thread::sleep(period);
                match bench.upgrade() {
                    Some(bench) => bench.fire_timers(),
                    None => break,
                }
            }
        });
    }

    fn pass_time(&self, us: u64) {
        self.lock().elapsed_us += us;
        if self.realtime {
            thread::sleep(Duration::from_micros(us));
        }
        self.advance_motor();
    }
}

impl Driver for SimBench {
    fn digital_read(&self, pin: Pin) -> bool {
        let state = self.lock();
        state
            .limit_level(pin)
            .unwrap_or_else(|| state.duty(pin) > 0)
    }

    fn digital_write(&self, pin: Pin, high: bool) {
        let mut state = self.lock();
        let was_high = state.duty(pin) > 0;
        state.outputs.insert(pin, if high { u8::MAX } else { 0 });
        if !high || was_high {
            return;
        }

        let dir_pin = match state.steppers.iter().find(|rig| rig.step_pin == pin) {
            Some(rig) => rig.dir_pin,
            None => return,
        };
        let toward_limit2 = state.duty(dir_pin) > 0;
        *state.pulses.entry(pin).or_insert(0) += 1;
        if let Some(rig) = state.steppers.iter_mut().find(|rig| rig.step_pin == pin) {
            rig.position += if toward_limit2 { 1 } else { -1 };
        }
    }

    fn pwm_write(&self, pin: Pin, duty: u8) {
        self.lock().outputs.insert(pin, duty);
    }

    fn delay_us(&self, us: u32) {
        self.pass_time(u64::from(us));
    }

    fn delay_ms(&self, ms: u32) {
        self.pass_time(u64::from(ms) * 1_000);
    }

    fn attach_interrupt(&self, pin: Pin, edge: Edge, handler: Handler) {
        self.lock().interrupts.push((pin, edge, handler));
    }

    fn set_interrupt_enabled(&self, pin: Pin, enabled: bool) {
        let mut state = self.lock();
        if enabled {
            state.masked.remove(&pin);
        } else {
            state.masked.insert(pin);
        }
    }

    fn every(&self, interval: Duration, handler: Handler) {
        self.lock().timers.push((interval, handler));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rig() -> StepperRig {
        StepperRig {
            step_pin: 20,
            dir_pin: 21,
            limit1_pin: 22,
            limit2_pin: 23,
            active_high: true,
            position: 0,
            limit1_at: -2,
            limit2_at: 2,
        }
    }

    #[test]
    fn test_step_pin_rising_edge_moves_rig() {
        let bench = SimBench::new();
        bench.add_stepper(rig());

        bench.digital_write(21, true);
        bench.digital_write(20, true);
        bench.digital_write(20, true);
        bench.digital_write(20, false);
        assert_eq!(bench.stepper_position(20), Some(1));
        assert_eq!(bench.pulses(20), 1);

        bench.digital_write(21, false);
        for _ in 0..3 {
            bench.digital_write(20, true);
            bench.digital_write(20, false);
        }
        assert_eq!(bench.stepper_position(20), Some(-2));
        assert!(bench.digital_read(22));
        assert!(!bench.digital_read(23));
    }

    #[test]
    fn test_bench_for_default_machine() {
        let config = BenchConfig {
            realtime: false,
            ..BenchConfig::default()
        };
        let bench = SimBench::for_machine(&MachineConfig::default(), &config);
        assert_eq!(bench.stepper_position(20), Some(450));
        assert_eq!(bench.stepper_position(16), Some(450));
        assert_eq!(bench.dc_position(), Some(75));
        // Switches idle high and pull low when tripped.
        assert!(bench.digital_read(22));
        assert!(bench.digital_read(23));
        bench.set_stepper_position(20, 0);
        assert!(!bench.digital_read(23));
        assert!(bench.digital_read(22));
    }

    #[test]
    fn test_active_low_switches_invert_levels() {
        let bench = SimBench::new();
        bench.add_stepper(StepperRig {
            active_high: false,
            ..rig()
        });
        assert!(bench.digital_read(22));
        bench.set_stepper_position(20, -5);
        assert!(!bench.digital_read(22));
    }

    #[test]
    fn test_dc_rig_raises_encoder_interrupt_while_driven() {
        let bench = SimBench::new();
        bench.set_dc(DcRig {
            plus_pin: 12,
            minus_pin: 11,
            encoder_pin: 10,
            limit1_pin: 14,
            limit2_pin: 15,
            active_high: true,
            position: 0,
            limit1_at: -10,
            limit2_at: 10,
        });
        let edges = Arc::new(AtomicUsize::new(0));
        let counter = edges.clone();
        bench.attach_interrupt(
            10,
            Edge::Change,
            Arc::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        bench.delay_ms(1);
        assert_eq!(bench.dc_position(), Some(0));

        bench.pwm_write(12, 255);
        bench.delay_ms(1);
        bench.delay_us(5);
        assert_eq!(bench.dc_position(), Some(2));
        assert_eq!(edges.load(Ordering::SeqCst), 2);

        bench.set_interrupt_enabled(10, false);
        bench.delay_ms(1);
        assert_eq!(bench.dc_position(), Some(3));
        assert_eq!(edges.load(Ordering::SeqCst), 2);

        bench.pwm_write(11, 255);
        bench.delay_ms(1);
        assert_eq!(bench.dc_position(), Some(3));
        assert_eq!(bench.elapsed(), Duration::from_micros(4_005));
    }
}
