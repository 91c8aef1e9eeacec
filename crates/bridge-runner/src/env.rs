//! Environment hardening: subprocesses never see the full ambient
//! environment, only an allowlisted subset plus provider-specific
//! credential keys the caller explicitly adds.

use tokio::process::Command;

const ALLOWED_ENV_KEYS: &[&str] = &[
    "PATH",
    "HOME",
    "USER",
    "SHELL",
    "TERM",
    "LANG",
    "LC_ALL",
    "NODE_PATH",
    "XDG_CONFIG_HOME",
];

/// Clears the command's inherited environment and repopulates it from the
/// allowlist plus `extra` (provider-specific keys such as credentials or
/// `MAX_THINKING_TOKENS`).
pub fn apply_env(command: &mut Command, extra: &[(String, String)]) {
    command.env_clear();
    for key in ALLOWED_ENV_KEYS {
        if let Ok(value) = std::env::var(key) {
            command.env(key, value);
        }
    }
    for (key, value) in extra {
        command.env(key, value);
    }
}
