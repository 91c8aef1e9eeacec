use std::path::PathBuf;
use std::time::Duration;

use bridge_gateway::GatewayConfig;
use thiserror::Error;

use crate::cli::Cli;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("request-timeout-secs must be between 1 and 3600, got {0}")]
    TimeoutOutOfRange(u64),

    #[error("agent-a-binary must not be empty")]
    EmptyAgentABinary,

    #[error("agent-b-binary must not be empty")]
    EmptyAgentBBinary,

    #[error("model-base-url must not be empty")]
    EmptyModelBaseUrl,
}

/// The fully-resolved, validated configuration for one run of the
/// gateway, split into the pieces each downstream constructor needs.
pub struct ResolvedConfig {
    pub gateway: GatewayConfig,
    pub request_timeout: Duration,
    pub agent_a_binary: String,
    pub agent_a_max_turns: Option<u32>,
    pub agent_a_tools: Option<String>,
    pub agent_b_binary: String,
    pub agent_b_model: Option<String>,
    pub model_base_url: String,
    pub session_root: PathBuf,
}

pub fn resolve(cli: &Cli) -> Result<ResolvedConfig, ConfigError> {
    if cli.request_timeout_secs < 1 || cli.request_timeout_secs > 3600 {
        return Err(ConfigError::TimeoutOutOfRange(cli.request_timeout_secs));
    }
    if cli.agent_a_binary.trim().is_empty() {
        return Err(ConfigError::EmptyAgentABinary);
    }
    if cli.agent_b_binary.trim().is_empty() {
        return Err(ConfigError::EmptyAgentBBinary);
    }
    if cli.model_base_url.trim().is_empty() {
        return Err(ConfigError::EmptyModelBaseUrl);
    }

    let gateway = GatewayConfig {
        host: cli.host.clone(),
        port: cli.port,
        max_frame_bytes: cli.max_frame_bytes,
        heartbeat_interval: Duration::from_secs(30),
        api_key: cli.api_key.clone(),
        allowed_origins: if cli.allowed_origins.is_empty() {
            None
        } else {
            Some(cli.allowed_origins.clone())
        },
        agent_name: cli.agent_name.clone(),
    };

    Ok(ResolvedConfig {
        gateway,
        request_timeout: Duration::from_secs(cli.request_timeout_secs),
        agent_a_binary: cli.agent_a_binary.clone(),
        agent_a_max_turns: cli.agent_a_max_turns,
        agent_a_tools: cli.agent_a_tools.clone(),
        agent_b_binary: cli.agent_b_binary.clone(),
        agent_b_model: cli.agent_b_model.clone(),
        model_base_url: cli.model_base_url.clone(),
        session_root: PathBuf::from(&cli.session_dir),
    })
}
