use serde::{Deserialize, Serialize};

use crate::hal::Pin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitPins {
    pub limit1: Pin,
    pub limit2: Pin,
    // Level a tripped switch reads.
    #[serde(default)]
    pub active_high: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StepperConfig {
    pub name: String,
    pub step_pin: Pin,
    pub dir_pin: Pin,
    pub limits: LimitPins,
    pub pulse_width_us: u32,
    pub calibration_step_interval_us: u32,
    // None waits for the switch forever.
    pub calibration_step_limit: Option<u32>,
}

impl StepperConfig {
    pub fn x() -> Self {
        Self {
            name: "X".to_string(),
            step_pin: 20,
            dir_pin: 21,
            limits: LimitPins {
                limit1: 23,
                limit2: 22,
                active_high: false,
            },
            pulse_width_us: 100,
            calibration_step_interval_us: 600,
            calibration_step_limit: None,
        }
    }

    pub fn y() -> Self {
        Self {
            name: "Y".to_string(),
            step_pin: 16,
            dir_pin: 17,
            limits: LimitPins {
                limit1: 19,
                limit2: 18,
                active_high: false,
            },
            ..Self::x()
        }
    }
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self::x()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServoConfig {
    pub name: String,
    // Drives toward limit 2.
    pub plus_pin: Pin,
    // Drives toward limit 1.
    pub minus_pin: Pin,
    pub encoder_pin: Pin,
    pub limits: LimitPins,
    pub drive_duty: u8,
    pub control_interval_us: u64,
    pub calibration_step_interval_ms: u32,
    pub test_pulse_us: u32,
    pub calibration_step_limit: Option<u32>,
}

impl Default for ServoConfig {
    fn default() -> Self {
        Self {
            name: "Z".to_string(),
            plus_pin: 12,
            minus_pin: 11,
            encoder_pin: 10,
            limits: LimitPins {
                limit1: 15,
                limit2: 14,
                active_high: false,
            },
            drive_duty: 255,
            control_interval_us: 1_000,
            calibration_step_interval_ms: 10,
            test_pulse_us: 400,
            calibration_step_limit: None,
        }
    }
}
