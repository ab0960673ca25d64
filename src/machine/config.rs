use serde::{Deserialize, Serialize};

use crate::{
    axis::config::{ServoConfig, StepperConfig},
    hal::Pin,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    pub x: StepperConfig,
    pub y: StepperConfig,
    pub z: ServoConfig,
    pub indicator_pin: Pin,
    pub test_step_delay_ms: u32,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            x: StepperConfig::x(),
            y: StepperConfig::y(),
            z: ServoConfig::default(),
            indicator_pin: 13,
            test_step_delay_ms: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub channel_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 16,
        }
    }
}
