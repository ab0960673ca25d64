use std::{
    sync::{
        atomic::{AtomicBool, AtomicI32, AtomicU8, Ordering},
        Arc,
    },
    time::Duration,
};

use tracing::{debug, info, warn};

use super::{config::ServoConfig, limit_switches::LimitState, Axis, Direction};
use crate::hal::{Driver, Edge, Pin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetTarget {
    Absolute(i32),
    Relative(i32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoPhase {
    Uncalibrated,
    Calibrating,
    Tracking,
}

const TOWARD_LIMIT1: u8 = 0;
const TOWARD_LIMIT2: u8 = 1;

pub struct ServoCore {
    driver: Arc<dyn Driver>,
    plus_pin: Pin,
    minus_pin: Pin,
    drive_duty: u8,
    encoder: AtomicI32,
    target: AtomicI32,
    max: AtomicI32,
    direction: AtomicU8,
    armed: AtomicBool,
    ticking: AtomicBool,
}

impl ServoCore {
    fn new(config: &ServoConfig, driver: Arc<dyn Driver>) -> Self {
        Self {
            driver,
            plus_pin: config.plus_pin,
            minus_pin: config.minus_pin,
            drive_duty: config.drive_duty,
            encoder: AtomicI32::new(0),
            target: AtomicI32::new(0),
            max: AtomicI32::new(0),
            direction: AtomicU8::new(TOWARD_LIMIT1),
            armed: AtomicBool::new(true),
            ticking: AtomicBool::new(false),
        }
    }

    // Interrupt context: no logging, no waiting.
    pub fn on_encoder_edge(&self) {
        self.release();
        let delta = match self.direction.load(Ordering::Relaxed) {
            TOWARD_LIMIT2 => 1,
            _ => -1,
        };
        self.encoder.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn control_tick(&self) {
        self.ticking.store(true, Ordering::SeqCst);
        if self.armed.load(Ordering::SeqCst) {
            self.track_target();
        }
        self.ticking.store(false, Ordering::SeqCst);
    }

    fn track_target(&self) {
        let max = self.max.load(Ordering::Relaxed);
        let mut target = self.target.load(Ordering::Relaxed);
        let clamped = target.clamp(0, max);
        if clamped != target {
            let _ = self.target.compare_exchange(
                target,
                clamped,
                Ordering::Relaxed,
                Ordering::Relaxed,
            );
            target = clamped;
        }

        let position = self.encoder.load(Ordering::Relaxed);
        if position < target {
            self.energize(Direction::TowardLimit2);
        } else if position > target {
            self.energize(Direction::TowardLimit1);
        } else {
            self.release();
        }
    }

    pub fn set_target(&self, update: SetTarget) -> i32 {
        let max = self.max.load(Ordering::Relaxed);
        let requested = match update {
            SetTarget::Absolute(position) => position,
            SetTarget::Relative(delta) => self.target.load(Ordering::Relaxed).saturating_add(delta),
        };
        let target = requested.clamp(0, max);
        self.target.store(target, Ordering::Relaxed);
        target
    }

    pub fn encoder_position(&self) -> i32 {
        self.encoder.load(Ordering::Relaxed)
    }

    pub fn target_position(&self) -> i32 {
        self.target.load(Ordering::Relaxed)
    }

    pub fn max_position(&self) -> i32 {
        self.max.load(Ordering::Relaxed)
    }

    pub fn commanded_direction(&self) -> Direction {
        match self.direction.load(Ordering::Relaxed) {
            TOWARD_LIMIT2 => Direction::TowardLimit2,
            _ => Direction::TowardLimit1,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    // Returns once no tick that saw the servo armed is still running.
    fn disarm(&self) {
        self.armed.store(false, Ordering::SeqCst);
        while self.ticking.load(Ordering::SeqCst) {
            std::hint::spin_loop();
        }
        self.release();
    }

    fn clear_envelope(&self) {
        self.max.store(0, Ordering::Relaxed);
        self.target.store(0, Ordering::Relaxed);
    }

    // Direction must be stored before the drive turns on.
    fn energize(&self, direction: Direction) {
        let (on, off, code) = match direction {
            Direction::TowardLimit2 => (self.plus_pin, self.minus_pin, TOWARD_LIMIT2),
            Direction::TowardLimit1 => (self.minus_pin, self.plus_pin, TOWARD_LIMIT1),
        };
        self.direction.store(code, Ordering::Relaxed);
        self.driver.digital_write(off, false);
        self.driver.pwm_write(on, self.drive_duty);
    }

    fn release(&self) {
        self.driver.digital_write(self.plus_pin, false);
        self.driver.digital_write(self.minus_pin, false);
    }
}

pub struct ServoAxis {
    config: ServoConfig,
    driver: Arc<dyn Driver>,
    core: Arc<ServoCore>,
    phase: ServoPhase,
    test_mode: bool,
    test_direction: Direction,
}

impl ServoAxis {
    pub fn new(config: ServoConfig, driver: Arc<dyn Driver>) -> Self {
        let core = Arc::new(ServoCore::new(&config, driver.clone()));
        Self {
            config,
            driver,
            core,
            phase: ServoPhase::Uncalibrated,
            test_mode: false,
            test_direction: Direction::TowardLimit1,
        }
    }

    pub fn attach(&self) {
        let core = Arc::downgrade(&self.core);
        self.driver.attach_interrupt(
            self.config.encoder_pin,
            Edge::Change,
            Arc::new(move || {
                if let Some(core) = core.upgrade() {
                    core.on_encoder_edge();
                }
            }),
        );

        let core = Arc::downgrade(&self.core);
        self.driver.every(
            Duration::from_micros(self.config.control_interval_us),
            Arc::new(move || {
                if let Some(core) = core.upgrade() {
                    core.control_tick();
                }
            }),
        );
        debug!(
            "Axis {}: encoder on pin {}, control tick every {}us",
            self.config.name, self.config.encoder_pin, self.config.control_interval_us
        );
    }

    pub fn core(&self) -> &Arc<ServoCore> {
        &self.core
    }

    pub fn phase(&self) -> ServoPhase {
        self.phase
    }

    pub fn set_target(&mut self, update: SetTarget) -> i32 {
        self.core.set_target(update)
    }

    pub fn control_tick(&self) {
        self.core.control_tick();
    }

    fn sweep_step(&self, direction: Direction) -> LimitState {
        self.core.energize(direction);
        self.driver
            .delay_ms(self.config.calibration_step_interval_ms);
        self.limit_state()
    }

    fn sweep_to(&self, direction: Direction, until: LimitState) -> bool {
        let mut taken: u32 = 0;
        let mut state = self.sweep_step(direction);
        while state != until {
            if self
                .config
                .calibration_step_limit
                .is_some_and(|limit| taken >= limit)
            {
                warn!(
                    "Axis {}: {:?} not reached after {} drive steps, abandoning calibration",
                    self.config.name, until, taken
                );
                return false;
            }
            state = self.sweep_step(direction);
            taken += 1;
        }
        true
    }

    fn rebase_encoder(&self, position: i32) -> i32 {
        let pin = self.config.encoder_pin;
        self.driver.set_interrupt_enabled(pin, false);
        let previous = self.core.encoder.swap(position, Ordering::Relaxed);
        self.driver.set_interrupt_enabled(pin, true);
        previous
    }

    fn finish_calibration(&mut self, phase: ServoPhase) {
        self.core.release();
        self.phase = phase;
        if !self.test_mode {
            self.core.arm();
        }
    }
}

impl Axis for ServoAxis {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn limit_state(&self) -> LimitState {
        self.config.limits.sample(self.driver.as_ref())
    }

    fn calibrate(&mut self) -> u16 {
        info!("Calibrating axis {}", self.config.name);
        let previous_phase = self.phase;
        self.phase = ServoPhase::Calibrating;
        self.core.disarm();

        if !self.sweep_to(Direction::TowardLimit2, LimitState::AtLimit2) {
            self.finish_calibration(previous_phase);
            return 0;
        }
        self.rebase_encoder(0);

        // The encoder no longer matches the old envelope, so the axis stays
        // disarmed until a calibration completes.
        if !self.sweep_to(Direction::TowardLimit1, LimitState::AtLimit1) {
            self.core.release();
            self.core.clear_envelope();
            self.phase = ServoPhase::Uncalibrated;
            return 0;
        }
        self.core.release();

        // Limit 1 becomes position zero; the servo then parks at the far end.
        let travel = self.rebase_encoder(0).unsigned_abs();
        let max = i32::try_from(travel).unwrap_or(i32::MAX);
        self.core.max.store(max, Ordering::Relaxed);
        self.core.target.store(max, Ordering::Relaxed);
        self.finish_calibration(ServoPhase::Tracking);

        info!("Axis {} travel: {} encoder ticks", self.config.name, travel);
        u16::try_from(travel).unwrap_or(u16::MAX)
    }

    fn move_steps(&mut self, direction: Direction, steps: u8, _step_delay_ms: u16) -> u8 {
        let delta = match direction {
            Direction::TowardLimit1 => -i32::from(steps),
            Direction::TowardLimit2 => i32::from(steps),
        };
        let before = self.core.target_position();
        let after = self.core.set_target(SetTarget::Relative(delta));
        debug!(
            "Axis {} target {} -> {} (requested {:+})",
            self.config.name, before, after, delta
        );
        u8::try_from(after.abs_diff(before)).unwrap_or(u8::MAX)
    }

    fn test_mode(&self) -> bool {
        self.test_mode
    }

    fn set_test_mode(&mut self, enabled: bool) {
        self.test_mode = enabled;
        if enabled {
            self.core.disarm();
        } else {
            let here = self.core.encoder_position();
            self.core.set_target(SetTarget::Absolute(here));
            self.core.arm();
        }
    }

    fn test_tick(&mut self) {
        self.test_direction = self.limit_state().bounce(self.test_direction);
        self.core.energize(self.test_direction);
        self.driver.delay_us(self.config.test_pulse_us);
        self.core.release();
    }

    fn position(&self) -> i32 {
        self.core.encoder_position()
    }
}
