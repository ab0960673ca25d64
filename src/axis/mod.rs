pub mod config;
pub mod limit_switches;
pub mod servo;
pub mod stepper;

use limit_switches::LimitState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    TowardLimit1,
    TowardLimit2,
}

impl Direction {
    // Any non-zero byte drives the direction line high.
    pub fn from_wire(byte: u8) -> Self {
        if byte == 0 {
            Direction::TowardLimit1
        } else {
            Direction::TowardLimit2
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            Direction::TowardLimit1 => 0,
            Direction::TowardLimit2 => 1,
        }
    }

    pub fn level(self) -> bool {
        matches!(self, Direction::TowardLimit2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AxisId {
    X,
    Y,
    Z,
}

impl AxisId {
    pub const ALL: [AxisId; 3] = [AxisId::X, AxisId::Y, AxisId::Z];

    pub fn from_wire(byte: u8) -> Option<Self> {
        match byte {
            b'X' => Some(AxisId::X),
            b'Y' => Some(AxisId::Y),
            b'Z' => Some(AxisId::Z),
            _ => None,
        }
    }

    pub fn to_wire(self) -> u8 {
        match self {
            AxisId::X => b'X',
            AxisId::Y => b'Y',
            AxisId::Z => b'Z',
        }
    }
}

pub trait Axis: Send {
    fn name(&self) -> &str;

    fn limit_state(&self) -> LimitState;

    fn calibrate(&mut self) -> u16;

    fn move_steps(&mut self, direction: Direction, steps: u8, step_delay_ms: u16) -> u8;

    fn test_mode(&self) -> bool;
    fn set_test_mode(&mut self, enabled: bool);

    fn test_tick(&mut self);

    fn position(&self) -> i32;
}
