use clap::Parser;

/// Bidirectional WebSocket gateway that multiplexes streaming prompts onto
/// local CLI assistants and a local HTTP-streamed model server.
#[derive(Debug, Parser)]
#[command(name = "bridge-ws", version, about, long_about = None)]
pub struct Cli {
    /// Address to bind the HTTP/WebSocket listener on.
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port to bind the HTTP/WebSocket listener on.
    #[arg(long, default_value_t = 8787)]
    pub port: u16,

    /// Maximum inbound WebSocket message size, in bytes.
    #[arg(long, default_value_t = 50 * 1024 * 1024)]
    pub max_frame_bytes: usize,

    /// Per-request subprocess/HTTP timeout, in seconds (1-3600).
    #[arg(long, default_value_t = 300)]
    pub request_timeout_secs: u64,

    /// Required bearer token; if unset, no authentication is enforced.
    #[arg(long, env = "BRIDGE_API_KEY")]
    pub api_key: Option<String>,

    /// Allowed `Origin` header value. May be passed multiple times; if
    /// never passed, any origin (including none) is admitted.
    #[arg(long = "allowed-origin")]
    pub allowed_origins: Vec<String>,

    /// Path to the agent-assistant (provider A) binary.
    #[arg(long, default_value = "claude")]
    pub agent_a_binary: String,

    /// Maximum turns passed to the agent assistant, if any.
    #[arg(long)]
    pub agent_a_max_turns: Option<u32>,

    /// Tool allowlist (CSV) passed to the agent assistant; pass an empty
    /// string to disable tools entirely.
    #[arg(long)]
    pub agent_a_tools: Option<String>,

    /// Path to the coding-assistant (provider B) binary.
    #[arg(long, default_value = "codex")]
    pub agent_b_binary: String,

    /// Default model passed to the coding assistant on a fresh thread.
    #[arg(long)]
    pub agent_b_model: Option<String>,

    /// Base URL of the local HTTP-streamed model server (provider C).
    #[arg(long, default_value = "http://127.0.0.1:11434")]
    pub model_base_url: String,

    /// Root directory under which per-(connection, project) session
    /// working directories are created.
    #[arg(long, default_value = "bridge-sessions")]
    pub session_dir: String,

    /// Agent name reported in the `connected` handshake frame.
    #[arg(long, default_value = "bridge-ws")]
    pub agent_name: String,

    /// `tracing-subscriber` env-filter directive.
    #[arg(long, default_value = "info")]
    pub log_filter: String,
}
