use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    hal::sim::BenchConfig,
    host_link::config::SocketServerConfig,
    machine::config::{MachineConfig, ManagerConfig},
    protocol::config::ProtocolConfig,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub machine: MachineConfig,
    pub protocol: ProtocolConfig,
    pub manager: ManagerConfig,
    pub server: SocketServerConfig,
    pub bench: BenchConfig,
    // Fallback filter when RUST_LOG is unset.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            machine: MachineConfig::default(),
            protocol: ProtocolConfig::default(),
            manager: ManagerConfig::default(),
            server: SocketServerConfig::default(),
            bench: BenchConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }
}
