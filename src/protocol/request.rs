use super::{
    config::ProtocolConfig, response::Report, CMD_CALIBRATE, CMD_HALT, CMD_MOVE, CMD_STATUS,
    CMD_TEST, OFFSET_CLASS, OFFSET_DIRECTION, OFFSET_SELECTOR, OFFSET_STEPS, OFFSET_STEP_DELAY,
    STATUS_CALIBRATION, STATUS_POSITIONS, STATUS_SWITCHES,
};
use crate::axis::{AxisId, Direction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusQuery {
    Switches,
    Positions,
    LastReport,
}

impl StatusQuery {
    fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            STATUS_SWITCHES => Some(StatusQuery::Switches),
            STATUS_POSITIONS => Some(StatusQuery::Positions),
            STATUS_CALIBRATION => Some(StatusQuery::LastReport),
            _ => None,
        }
    }

    fn to_wire(self) -> u8 {
        match self {
            StatusQuery::Switches => STATUS_SWITCHES,
            StatusQuery::Positions => STATUS_POSITIONS,
            StatusQuery::LastReport => STATUS_CALIBRATION,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Calibrate(AxisId),
    Move {
        axis: AxisId,
        direction: Direction,
        steps: u8,
        // None when the revision carries no delay field.
        step_delay_ms: Option<u16>,
    },
    TestEnable(AxisId),
    TestHalt(AxisId),
    Status(StatusQuery),
    Ignored { class: u8, selector: u8 },
}

impl Request {
    pub fn decode(frame: &[u8], config: &ProtocolConfig) -> Self {
        let report = Report::from_slice(frame);
        let class = report.byte(OFFSET_CLASS);
        let selector = report.byte(OFFSET_SELECTOR);
        let ignored = Request::Ignored { class, selector };

        if class == CMD_STATUS {
            if !config.status_selectors {
                return Request::Status(StatusQuery::Switches);
            }
            return StatusQuery::from_wire(selector).map_or(ignored, Request::Status);
        }

        let Some(axis) = AxisId::from_wire(selector) else {
            return ignored;
        };
        match class {
            CMD_CALIBRATE => Request::Calibrate(axis),
            CMD_MOVE => Request::Move {
                axis,
                direction: Direction::from_wire(report.byte(OFFSET_DIRECTION)),
                steps: report.byte(OFFSET_STEPS),
                step_delay_ms: config
                    .move_delay_field
                    .then(|| report.u16_le(OFFSET_STEP_DELAY)),
            },
            CMD_TEST => Request::TestEnable(axis),
            CMD_HALT => Request::TestHalt(axis),
            _ => ignored,
        }
    }

    pub fn encode(&self) -> Report {
        let mut report = Report::new();
        let (class, selector) = match *self {
            Request::Calibrate(axis) => (CMD_CALIBRATE, axis.to_wire()),
            Request::Move {
                axis,
                direction,
                steps,
                step_delay_ms,
            } => {
                report.set_byte(OFFSET_DIRECTION, direction.to_wire());
                report.set_byte(OFFSET_STEPS, steps);
                if let Some(delay) = step_delay_ms {
                    report.put_u16_le(OFFSET_STEP_DELAY, delay);
                }
                (CMD_MOVE, axis.to_wire())
            }
            Request::TestEnable(axis) => (CMD_TEST, axis.to_wire()),
            Request::TestHalt(axis) => (CMD_HALT, axis.to_wire()),
            Request::Status(query) => (CMD_STATUS, query.to_wire()),
            Request::Ignored { class, selector } => (class, selector),
        };
        report.set_byte(OFFSET_CLASS, class);
        report.set_byte(OFFSET_SELECTOR, selector);
        report
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Request::Ignored { .. })
    }
}
