use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server / connection manager
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    #[serde(default = "d_stale_timeout")]
    pub stale_timeout_seconds: u64,
    #[serde(default = "d_heartbeat_timeout")]
    pub heartbeat_timeout_seconds: u64,
    #[serde(default = "d_max_connections")]
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: d_port(),
            host: d_host(),
            heartbeat_interval_seconds: d_heartbeat_interval(),
            stale_timeout_seconds: d_stale_timeout(),
            heartbeat_timeout_seconds: d_heartbeat_timeout(),
            max_connections: d_max_connections(),
        }
    }
}

fn d_port() -> u16 {
    8080
}
fn d_host() -> String {
    "0.0.0.0".into()
}
fn d_heartbeat_interval() -> u64 {
    30
}
fn d_stale_timeout() -> u64 {
    120
}
fn d_heartbeat_timeout() -> u64 {
    10
}
fn d_max_connections() -> usize {
    10_000
}
