use std::sync::Arc;

use tracing::{debug, info};

use super::config::MachineConfig;
use crate::{
    axis::{
        limit_switches::LimitState, servo::ServoAxis, stepper::StepperAxis, Axis, AxisId,
    },
    hal::{Driver, Pin},
    protocol::{
        config::{CalibrateReport, ProtocolConfig, ReplyPolicy},
        parse_request,
        request::{Request, StatusQuery},
        response::Report,
        OFFSET_SELECTOR, STATUS_SWITCHES,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineSnapshot {
    pub limit_states: [LimitState; 3],
    pub positions: [i32; 3],
    pub test_modes: [bool; 3],
}

pub struct Machine {
    axes: [Box<dyn Axis>; 3],
    driver: Arc<dyn Driver>,
    indicator_pin: Pin,
    test_step_delay_ms: u32,
    protocol: ProtocolConfig,
    report: Report,
}

impl Machine {
    // X, Y, Z order.
    pub fn new(
        axes: [Box<dyn Axis>; 3],
        driver: Arc<dyn Driver>,
        config: &MachineConfig,
        protocol: ProtocolConfig,
    ) -> Self {
        let machine = Self {
            axes,
            driver,
            indicator_pin: config.indicator_pin,
            test_step_delay_ms: config.test_step_delay_ms,
            protocol,
            report: Report::new(),
        };
        machine.idle();
        machine
    }

    pub fn from_config(
        config: &MachineConfig,
        protocol: ProtocolConfig,
        driver: Arc<dyn Driver>,
    ) -> Self {
        let z = ServoAxis::new(config.z.clone(), driver.clone());
        z.attach();
        let axes: [Box<dyn Axis>; 3] = [
            Box::new(StepperAxis::new(config.x.clone(), driver.clone())),
            Box::new(StepperAxis::new(config.y.clone(), driver.clone())),
            Box::new(z),
        ];
        Self::new(axes, driver, config, protocol)
    }

    pub fn axis(&self, id: AxisId) -> &dyn Axis {
        self.axes[Self::index(id)].as_ref()
    }

    pub fn axis_mut(&mut self, id: AxisId) -> &mut dyn Axis {
        self.axes[Self::index(id)].as_mut()
    }

    fn index(id: AxisId) -> usize {
        match id {
            AxisId::X => 0,
            AxisId::Y => 1,
            AxisId::Z => 2,
        }
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn handle(&mut self, frame: &[u8]) -> Option<Report> {
        let request = parse_request(frame, &self.protocol);
        if let Request::Ignored { class, selector } = request {
            debug!("Ignoring request {:#04x} {:#04x}", class, selector);
            return None;
        }

        self.execute(request);
        let selector = frame.get(OFFSET_SELECTOR).copied().unwrap_or(0);
        self.should_reply(&request, selector).then_some(self.report)
    }

    pub fn execute(&mut self, request: Request) {
        match request {
            Request::Calibrate(id) => {
                self.busy();
                let travel = self.axis_mut(id).calibrate();
                self.idle();
                match self.protocol.calibrate_report {
                    CalibrateReport::TravelCount => self.report.put_u16_le(0, travel),
                    CalibrateReport::SwitchSnapshot => self.load_switches(),
                }
            }
            Request::Move {
                axis,
                direction,
                steps,
                step_delay_ms,
            } => {
                let step_delay_ms = step_delay_ms.unwrap_or(self.protocol.default_step_delay_ms);
                self.busy();
                let ax = self.axis_mut(axis);
                let done = ax.move_steps(direction, steps, step_delay_ms);
                let state = ax.limit_state();
                self.idle();
                self.report.set_byte(0, state.code());
                self.report.set_byte(1, done);
            }
            Request::TestEnable(id) => {
                info!("Test mode on for axis {}", self.axis(id).name());
                self.axis_mut(id).set_test_mode(true);
            }
            Request::TestHalt(id) => {
                info!("Test mode off for axis {}", self.axis(id).name());
                self.axis_mut(id).set_test_mode(false);
            }
            Request::Status(StatusQuery::Switches) => self.load_switches(),
            Request::Status(StatusQuery::Positions) => {
                for (i, axis) in self.axes.iter().enumerate() {
                    // Two's complement, truncated to the 16-bit wire field.
                    self.report.put_u16_le(2 * i, axis.position() as u16);
                }
            }
            Request::Status(StatusQuery::LastReport) | Request::Ignored { .. } => {}
        }
    }

    fn should_reply(&self, request: &Request, selector: u8) -> bool {
        match self.protocol.reply_policy {
            ReplyPolicy::StatusOnly => matches!(request, Request::Status(_)),
            ReplyPolicy::StatusAndCalibrate => {
                matches!(request, Request::Status(_) | Request::Calibrate(_))
            }
            ReplyPolicy::SwitchSelectorOnly => selector == STATUS_SWITCHES,
        }
    }

    fn load_switches(&mut self) {
        for (i, axis) in self.axes.iter().enumerate() {
            self.report.set_byte(i, axis.limit_state().code());
        }
    }

    pub fn any_test_mode(&self) -> bool {
        self.axes.iter().any(|axis| axis.test_mode())
    }

    pub fn test_exec(&mut self) {
        for axis in self.axes.iter_mut().filter(|axis| axis.test_mode()) {
            axis.test_tick();
        }
        self.driver.delay_ms(self.test_step_delay_ms);
    }

    pub fn snapshot(&self) -> MachineSnapshot {
        MachineSnapshot {
            limit_states: [0, 1, 2].map(|i| self.axes[i].limit_state()),
            positions: [0, 1, 2].map(|i| self.axes[i].position()),
            test_modes: [0, 1, 2].map(|i| self.axes[i].test_mode()),
        }
    }

    fn busy(&self) {
        self.driver.digital_write(self.indicator_pin, false);
    }

    fn idle(&self) {
        self.driver.digital_write(self.indicator_pin, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        axis::Direction,
        hal::sim::{DcRig, SimBench, StepperRig},
    };
    use std::sync::Mutex;

    type CallLog = Arc<Mutex<Vec<String>>>;

    struct MockAxis {
        name: String,
        bench: Arc<SimBench>,
        log: CallLog,
        state: LimitState,
        travel: u16,
        position: i32,
        test_mode: bool,
    }

    impl MockAxis {
        fn record(&self, call: String) {
            self.log.lock().unwrap().push(format!("{}:{}", self.name, call));
        }
    }

    impl Axis for MockAxis {
        fn name(&self) -> &str {
            &self.name
        }

        fn limit_state(&self) -> LimitState {
            self.state
        }

        fn calibrate(&mut self) -> u16 {
            self.record(format!("calibrate busy={}", !self.bench.output_high(13)));
            self.travel
        }

        fn move_steps(&mut self, direction: Direction, steps: u8, step_delay_ms: u16) -> u8 {
            self.record(format!(
                "move {:?} {} {} busy={}",
                direction,
                steps,
                step_delay_ms,
                !self.bench.output_high(13)
            ));
            steps
        }

        fn test_mode(&self) -> bool {
            self.test_mode
        }

        fn set_test_mode(&mut self, enabled: bool) {
            self.record(format!("test {}", enabled));
            self.test_mode = enabled;
        }

        fn test_tick(&mut self) {
            self.record("tick".to_string());
        }

        fn position(&self) -> i32 {
            self.position
        }
    }

    fn mock_machine(protocol: ProtocolConfig) -> (Machine, CallLog, Arc<SimBench>) {
        let bench = Arc::new(SimBench::new());
        let log = CallLog::default();
        let mock = |name: &str, state, travel, position| -> Box<dyn Axis> {
            Box::new(MockAxis {
                name: name.to_string(),
                bench: bench.clone(),
                log: log.clone(),
                state,
                travel,
                position,
                test_mode: false,
            })
        };
        let axes = [
            mock("X", LimitState::Clear, 900, 12),
            mock("Y", LimitState::AtLimit1, 850, -2),
            mock("Z", LimitState::AtLimit2, 0x0102, 300),
        ];
        let machine = Machine::new(axes, bench.clone(), &MachineConfig::default(), protocol);
        (machine, log, bench)
    }

    fn calls(log: &CallLog) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn test_move_reports_steps_and_state() {
        let (mut machine, log, bench) = mock_machine(ProtocolConfig::default());
        let frame = Request::Move {
            axis: AxisId::Z,
            direction: Direction::TowardLimit2,
            steps: 5,
            step_delay_ms: Some(20),
        }
        .encode();

        assert_eq!(machine.handle(frame.as_bytes()), None);
        assert_eq!(machine.report().byte(1), 5);
        assert_eq!(machine.report().byte(0), LimitState::AtLimit2.code());
        assert_eq!(calls(&log), vec!["Z:move TowardLimit2 5 20 busy=true"]);
        assert!(bench.output_high(13));
    }

    #[test]
    fn test_move_without_delay_field_uses_default() {
        let protocol = ProtocolConfig {
            move_delay_field: false,
            default_step_delay_ms: 7,
            ..ProtocolConfig::default()
        };
        let (mut machine, log, _bench) = mock_machine(protocol);
        machine.handle(&[b'M', b'X', 0, 3, 0xff, 0xff]);
        assert_eq!(calls(&log), vec!["X:move TowardLimit1 3 7 busy=true"]);
    }

    #[test]
    fn test_unknown_class_touches_nothing() {
        let (mut machine, log, _bench) = mock_machine(ProtocolConfig::default());
        let before = machine.snapshot();

        assert_eq!(machine.handle(b"QS"), None);
        assert_eq!(machine.handle(&[b'Q', b'X', 1, 5]), None);
        assert_eq!(machine.handle(b"MQ"), None);

        assert!(calls(&log).is_empty());
        assert_eq!(machine.snapshot(), before);
        assert_eq!(*machine.report(), Report::new());
    }

    #[test]
    fn test_calibrate_result_read_back_through_status() {
        let (mut machine, log, _bench) = mock_machine(ProtocolConfig::default());

        assert_eq!(machine.handle(b"CZ"), None);
        assert_eq!(calls(&log), vec!["Z:calibrate busy=true"]);

        let reply = machine.handle(b"SC").expect("status is answered");
        assert_eq!(reply.u16_le(0), 0x0102);
        assert_eq!(reply.byte(0), 0x02);
        assert_eq!(reply.byte(1), 0x01);
    }

    #[test]
    fn test_earliest_revision_answers_calibrate() {
        let protocol = ProtocolConfig {
            reply_policy: ReplyPolicy::StatusAndCalibrate,
            ..ProtocolConfig::default()
        };
        let (mut machine, _log, _bench) = mock_machine(protocol);
        let reply = machine.handle(b"CX").expect("calibrate is answered");
        assert_eq!(reply.u16_le(0), 900);
        assert_eq!(machine.handle(b"MX"), None);
    }

    #[test]
    fn test_switch_selector_policy_is_narrow() {
        let protocol = ProtocolConfig {
            reply_policy: ReplyPolicy::SwitchSelectorOnly,
            ..ProtocolConfig::default()
        };
        let (mut machine, _log, _bench) = mock_machine(protocol);
        assert_eq!(machine.handle(b"SP"), None);
        assert_eq!(machine.handle(b"SC"), None);
        assert!(machine.handle(b"SS").is_some());
        assert_eq!(machine.handle(b"CX"), None);
    }

    #[test]
    fn test_switch_snapshot_calibrate_report() {
        let protocol = ProtocolConfig {
            calibrate_report: CalibrateReport::SwitchSnapshot,
            ..ProtocolConfig::default()
        };
        let (mut machine, _log, _bench) = mock_machine(protocol);
        machine.handle(b"CY");
        assert_eq!(&machine.report().as_bytes()[..3], &[3, 2, 1]);
    }

    #[test]
    fn test_status_switches_and_positions() {
        let (mut machine, _log, _bench) = mock_machine(ProtocolConfig::default());

        let switches = machine.handle(b"SS").expect("status is answered");
        assert_eq!(&switches.as_bytes()[..3], &[3, 2, 1]);

        let positions = machine.handle(b"SP").expect("status is answered");
        assert_eq!(positions.u16_le(0), 12);
        assert_eq!(positions.u16_le(2), 0xfffe);
        assert_eq!(positions.u16_le(4), 300);
    }

    #[test]
    fn test_status_without_selectors() {
        let protocol = ProtocolConfig {
            status_selectors: false,
            ..ProtocolConfig::default()
        };
        let (mut machine, _log, _bench) = mock_machine(protocol);
        let reply = machine.handle(b"S").expect("status is answered");
        assert_eq!(&reply.as_bytes()[..3], &[3, 2, 1]);
    }

    #[test]
    fn test_test_mode_toggles_and_ticks_enabled_axes() {
        let (mut machine, log, bench) = mock_machine(ProtocolConfig::default());
        assert!(!machine.any_test_mode());

        assert_eq!(machine.handle(b"TY"), None);
        assert!(machine.any_test_mode());
        machine.test_exec();
        assert_eq!(calls(&log), vec!["Y:test true", "Y:tick"]);
        assert_eq!(bench.elapsed().as_millis(), 1);

        machine.handle(b"HY");
        assert!(!machine.any_test_mode());
        assert_eq!(machine.snapshot().test_modes, [false, false, false]);
    }

    fn bench_machine() -> (Machine, Arc<SimBench>) {
        let mut config = MachineConfig::default();
        config.x.calibration_step_limit = Some(1_000);
        config.y.calibration_step_limit = Some(1_000);
        config.z.calibration_step_limit = Some(1_000);

        let bench = Arc::new(SimBench::new());
        bench.add_stepper(StepperRig::for_axis(&config.x, 40));
        bench.add_stepper(StepperRig::for_axis(&config.y, 30));
        bench.set_dc(DcRig::for_axis(&config.z, 24));
        let machine = Machine::from_config(&config, ProtocolConfig::default(), bench.clone());
        (machine, bench)
    }

    #[test]
    fn test_calibrates_real_axes() {
        let (mut machine, bench) = bench_machine();
        assert_eq!(bench.timer_count(), 1);

        machine.handle(b"CX");
        assert_eq!(machine.report().u16_le(0), 40);
        machine.handle(b"CY");
        assert_eq!(machine.report().u16_le(0), 30);
        machine.handle(b"CZ");
        assert_eq!(machine.report().u16_le(0), 24);

        let reply = machine.handle(b"SS").expect("status is answered");
        assert_eq!(
            &reply.as_bytes()[..3],
            &[
                LimitState::AtLimit2.code(),
                LimitState::AtLimit2.code(),
                LimitState::AtLimit1.code()
            ]
        );

        let reply = machine.handle(b"SP").expect("status is answered");
        assert_eq!(reply.u16_le(0), 40);
        assert_eq!(reply.u16_le(2), 30);
        assert_eq!(reply.u16_le(4), 0);
    }

    #[test]
    fn test_move_stops_at_switch_on_real_axis() {
        let (mut machine, bench) = bench_machine();
        bench.set_stepper_position(20, 37);

        let frame = Request::Move {
            axis: AxisId::X,
            direction: Direction::TowardLimit2,
            steps: 10,
            step_delay_ms: Some(0),
        }
        .encode();
        machine.handle(frame.as_bytes());

        assert_eq!(machine.report().byte(0), LimitState::AtLimit2.code());
        assert_eq!(machine.report().byte(1), 4);
        assert_eq!(bench.stepper_position(20), Some(40));
    }
}
