//! Provider A: the agent-style assistant, invoked as `<binary> --print
//! --verbose --output-format stream-json ... -` over a subprocess.

use std::path::Path;

use serde_json::Value;

use crate::adapter::SubprocessAdapter;
use crate::error::RunnerError;
use crate::runner::{send_chunk, EventSender, RunOptions};

/// Provider-level (not per-request) configuration, set once at startup.
#[derive(Debug, Clone, Default)]
pub struct ProviderAConfig {
    pub binary: String,
    pub max_turns: Option<u32>,
    /// `Some("")` means "no tools"; `None` means leave the CLI default.
    pub tools: Option<String>,
}

pub struct ProviderAAdapter {
    config: ProviderAConfig,
}

impl ProviderAAdapter {
    pub fn new(config: ProviderAConfig) -> Self {
        Self { config }
    }
}

impl SubprocessAdapter for ProviderAAdapter {
    fn binary(&self) -> &str {
        &self.config.binary
    }

    fn build_argv(&mut self, opts: &RunOptions, _cwd: Option<&Path>) -> Result<Vec<String>, RunnerError> {
        let mut argv = vec![
            "--print".to_string(),
            "--verbose".to_string(),
            "--output-format".to_string(),
            "stream-json".to_string(),
        ];
        if let Some(max_turns) = self.config.max_turns {
            argv.push("--max-turns".to_string());
            argv.push(max_turns.to_string());
        }
        if let Some(tools) = &self.config.tools {
            argv.push("--tools".to_string());
            argv.push(tools.clone());
        }
        if !opts.images.is_empty() {
            argv.push("--input-format".to_string());
            argv.push("stream-json".to_string());
        }
        if opts.project_id.is_some() {
            argv.push("--continue".to_string());
        }
        if let Some(model) = &opts.model {
            argv.push("--model".to_string());
            argv.push(model.clone());
        }
        if let Some(system_prompt) = &opts.system_prompt {
            argv.push("--append-system-prompt".to_string());
            argv.push(system_prompt.clone());
        }
        argv.push("-".to_string());
        Ok(argv)
    }

    fn build_stdin(&mut self, opts: &RunOptions) -> Result<Option<Vec<u8>>, RunnerError> {
        if opts.images.is_empty() {
            return Ok(Some(opts.prompt.clone().into_bytes()));
        }

        let mut content: Vec<Value> = opts
            .images
            .iter()
            .map(|image| {
                serde_json::json!({
                    "type": "image",
                    "source": {
                        "type": "base64",
                        "media_type": image.media_type,
                        "data": image.data,
                    },
                })
            })
            .collect();
        content.push(serde_json::json!({"type": "text", "text": opts.prompt}));

        let payload = serde_json::json!({
            "type": "user",
            "message": {"role": "user", "content": content},
        });
        let mut bytes = payload.to_string().into_bytes();
        bytes.push(b'\n');
        Ok(Some(bytes))
    }

    fn extra_env(&self, opts: &RunOptions) -> Vec<(String, String)> {
        match opts.thinking_tokens {
            Some(tokens) => vec![("MAX_THINKING_TOKENS".to_string(), tokens.to_string())],
            None => Vec::new(),
        }
    }

    fn parse_line(&mut self, line: &str, request_id: &str, events: &EventSender) {
        let Ok(value) = serde_json::from_str::<Value>(line) else { return };
        handle_event(&value, request_id, events);
    }

    fn on_execution_end(&mut self, _opts: &RunOptions) {}
}

fn handle_event(value: &Value, request_id: &str, events: &EventSender) {
    match value.get("type").and_then(Value::as_str) {
        Some("content_block_delta") => {
            if let Some(delta) = value.get("delta") {
                match delta.get("type").and_then(Value::as_str) {
                    Some("text_delta") => {
                        if let Some(text) = delta.get("text").and_then(Value::as_str) {
                            send_chunk(events, request_id, text, false);
                        }
                    }
                    Some("thinking_delta") => {
                        if let Some(thinking) = delta.get("thinking").and_then(Value::as_str) {
                            send_chunk(events, request_id, thinking, true);
                        }
                    }
                    _ => {}
                }
            }
        }
        Some("stream_event") => {
            if let Some(inner) = value.get("event") {
                handle_event(inner, request_id, events);
            }
        }
        Some("assistant") => {
            if let Some(blocks) = value.pointer("/message/content").and_then(Value::as_array) {
                for block in blocks {
                    if let Some(text) = block.get("text").and_then(Value::as_str) {
                        send_chunk(events, request_id, text, false);
                    }
                    if let Some(thinking) = block.get("thinking").and_then(Value::as_str) {
                        send_chunk(events, request_id, thinking, true);
                    }
                }
            }
        }
        // Notably "result" and anything else: ignored. The exit code is
        // the terminal signal, not this event.
        _ => {}
    }
}
