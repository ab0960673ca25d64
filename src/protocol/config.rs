use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyPolicy {
    StatusOnly,
    StatusAndCalibrate,
    SwitchSelectorOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrateReport {
    TravelCount,
    SwitchSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub status_selectors: bool,
    pub move_delay_field: bool,
    pub default_step_delay_ms: u16,
    pub calibrate_report: CalibrateReport,
    pub reply_policy: ReplyPolicy,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            status_selectors: true,
            move_delay_field: true,
            default_step_delay_ms: 1,
            calibrate_report: CalibrateReport::TravelCount,
            reply_policy: ReplyPolicy::StatusOnly,
        }
    }
}
