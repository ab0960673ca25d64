use super::{config::LimitPins, Direction};
use crate::hal::Driver;

// Both switches tripped reads as Clear; the wire has no code for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitState {
    Clear,
    AtLimit1,
    AtLimit2,
}

impl LimitState {
    pub const CLEAR_CODE: u8 = 3;
    pub const LIMIT1_CODE: u8 = 2;
    pub const LIMIT2_CODE: u8 = 1;

    pub fn from_switches(limit1: bool, limit2: bool) -> Self {
        match (limit1, limit2) {
            (true, false) => LimitState::AtLimit1,
            (false, true) => LimitState::AtLimit2,
            _ => LimitState::Clear,
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            LimitState::Clear => Self::CLEAR_CODE,
            LimitState::AtLimit1 => Self::LIMIT1_CODE,
            LimitState::AtLimit2 => Self::LIMIT2_CODE,
        }
    }

    pub fn blocks(&self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (LimitState::AtLimit1, Direction::TowardLimit1)
                | (LimitState::AtLimit2, Direction::TowardLimit2)
        )
    }

    pub fn bounce(&self, current: Direction) -> Direction {
        match self {
            LimitState::AtLimit1 => Direction::TowardLimit2,
            LimitState::AtLimit2 => Direction::TowardLimit1,
            LimitState::Clear => current,
        }
    }
}

impl LimitPins {
    pub fn sample(&self, driver: &dyn Driver) -> LimitState {
        let limit1 = driver.digital_read(self.limit1) == self.active_high;
        let limit2 = driver.digital_read(self.limit2) == self.active_high;
        LimitState::from_switches(limit1, limit2)
    }
}
