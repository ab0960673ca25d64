use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SocketServerConfig {
    pub socket_path: String,
    pub max_connections: usize,
    pub send_timeout_ms: u64,
}

impl Default for SocketServerConfig {
    fn default() -> Self {
        Self {
            socket_path: "/tmp/ewaste-stage.sock".to_string(),
            max_connections: 4,
            send_timeout_ms: 50,
        }
    }
}
