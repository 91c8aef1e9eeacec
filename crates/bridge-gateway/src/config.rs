use std::time::Duration;

/// Everything the server engine needs to admit and serve connections.
/// Constructed once by the entry-glue binary and handed in by value —
/// nothing downstream re-reads environment variables or global state.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub max_frame_bytes: usize,
    pub heartbeat_interval: Duration,
    pub api_key: Option<String>,
    pub allowed_origins: Option<Vec<String>>,
    pub agent_name: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
            max_frame_bytes: 50 * 1024 * 1024,
            heartbeat_interval: Duration::from_secs(30),
            api_key: None,
            allowed_origins: None,
            agent_name: "bridge-ws".to_string(),
        }
    }
}
