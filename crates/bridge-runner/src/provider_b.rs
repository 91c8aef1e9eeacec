//! Provider B: the coding assistant, invoked as `<binary> exec --json
//! --full-auto --skip-git-repo-check ... -`, with thread resume and
//! inline image marshaling to temp files.

use std::path::{Path, PathBuf};

use base64::Engine;
use serde_json::Value;

use crate::adapter::SubprocessAdapter;
use crate::error::RunnerError;
use crate::runner::{send_chunk, send_error, EventSender, RunOptions};

const MAX_SANITIZED_ID_CHARS: usize = 64;
const MAX_EXTENSION_CHARS: usize = 10;
const DEFAULT_EXTENSION: &str = "png";

#[derive(Debug, Clone, Default)]
pub struct ProviderBConfig {
    pub binary: String,
    pub model: Option<String>,
    pub image_temp_dir: PathBuf,
}

pub struct ProviderBAdapter {
    config: ProviderBConfig,
    thread_id: Option<String>,
    pending_temp_files: Vec<PathBuf>,
}

impl ProviderBAdapter {
    pub fn new(config: ProviderBConfig) -> Self {
        Self {
            config,
            thread_id: None,
            pending_temp_files: Vec::new(),
        }
    }

    fn write_temp_image(&self, request_id: &str, index: usize, media_type: &str, data: &str) -> Result<PathBuf, RunnerError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| RunnerError::Provider(format!("invalid image data: {e}")))?;
        std::fs::create_dir_all(&self.config.image_temp_dir)?;
        let sanitized = sanitize_request_id(request_id);
        let ext = extension_for(media_type);
        let path = self.config.image_temp_dir.join(format!("{sanitized}-{index}.{ext}"));
        std::fs::write(&path, bytes)?;
        Ok(path)
    }
}

impl SubprocessAdapter for ProviderBAdapter {
    fn binary(&self) -> &str {
        &self.config.binary
    }

    fn build_argv(&mut self, opts: &RunOptions, _cwd: Option<&Path>) -> Result<Vec<String>, RunnerError> {
        let resuming = self.thread_id.is_some() && opts.project_id.is_some();

        let mut argv = vec!["exec".to_string()];
        if resuming {
            argv.push("resume".to_string());
            argv.push(self.thread_id.clone().expect("resuming implies thread_id"));
        }
        argv.push("--json".to_string());
        argv.push("--full-auto".to_string());
        argv.push("--skip-git-repo-check".to_string());

        if !resuming {
            if let Some(model) = &self.config.model {
                argv.push("--model".to_string());
                argv.push(model.clone());
            }
        }

        self.pending_temp_files.clear();
        for (i, image) in opts.images.iter().enumerate() {
            let path = self.write_temp_image(&opts.request_id, i, &image.media_type, &image.data)?;
            argv.push("-i".to_string());
            argv.push(path.to_string_lossy().into_owned());
            self.pending_temp_files.push(path);
        }

        argv.push("-".to_string());
        Ok(argv)
    }

    fn build_stdin(&mut self, opts: &RunOptions) -> Result<Option<Vec<u8>>, RunnerError> {
        let text = match &opts.system_prompt {
            Some(system_prompt) => format!("{system_prompt}\n\n---\n\n{}", opts.prompt),
            None => opts.prompt.clone(),
        };
        Ok(Some(text.into_bytes()))
    }

    fn extra_env(&self, _opts: &RunOptions) -> Vec<(String, String)> {
        Vec::new()
    }

    fn parse_line(&mut self, line: &str, request_id: &str, events: &EventSender) {
        let Ok(value) = serde_json::from_str::<Value>(line) else { return };
        match value.get("type").and_then(Value::as_str) {
            Some("thread.started") => {
                if let Some(id) = value.get("thread_id").and_then(Value::as_str) {
                    self.thread_id = Some(id.to_string());
                }
            }
            Some("item.completed") => {
                if let Some(item) = value.get("item") {
                    let item_type = item.get("type").and_then(Value::as_str);
                    let text = item.get("text").and_then(Value::as_str);
                    match (item_type, text) {
                        (Some("agent_message"), Some(text)) => send_chunk(events, request_id, text, false),
                        (Some("reasoning"), Some(text)) => send_chunk(events, request_id, text, true),
                        _ => {}
                    }
                }
            }
            Some("turn.failed") => {
                let message = value
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .unwrap_or("turn failed");
                send_error(events, request_id, message);
            }
            Some("error") => {
                let message = value
                    .get("message")
                    .and_then(Value::as_str)
                    .or_else(|| value.pointer("/error/message").and_then(Value::as_str))
                    .unwrap_or("unknown error");
                send_error(events, request_id, message);
            }
            _ => {}
        }
    }

    fn on_execution_end(&mut self, _opts: &RunOptions) {
        for path in self.pending_temp_files.drain(..) {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn sanitize_request_id(request_id: &str) -> String {
    let sanitized: String = request_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();
    sanitized.chars().take(MAX_SANITIZED_ID_CHARS).collect()
}

fn extension_for(media_type: &str) -> String {
    let subtype = media_type.split('/').nth(1).unwrap_or("");
    let cleaned: String = subtype.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    if cleaned.is_empty() {
        DEFAULT_EXTENSION.to_string()
    } else {
        cleaned.chars().take(MAX_EXTENSION_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_request_id() {
        assert_eq!(sanitize_request_id("r1/../escape"), "r1___escape");
        assert_eq!(sanitize_request_id(&"a".repeat(100)).len(), 64);
    }

    #[test]
    fn extension_defaults_to_png() {
        assert_eq!(extension_for("image/png"), "png");
        assert_eq!(extension_for("image/jpeg"), "jpeg");
        assert_eq!(extension_for("bogus"), "png");
    }

    #[test]
    fn new_thread_argv_has_no_resume() {
        let mut adapter = ProviderBAdapter::new(ProviderBConfig {
            binary: "codex".to_string(),
            model: Some("gpt-5".to_string()),
            image_temp_dir: std::env::temp_dir(),
        });
        let opts = RunOptions {
            request_id: "r1".to_string(),
            prompt: "hi".to_string(),
            model: None,
            system_prompt: None,
            project_id: None,
            thinking_tokens: None,
            images: Vec::new(),
        };
        let argv = adapter.build_argv(&opts, None).unwrap();
        assert_eq!(argv[0], "exec");
        assert!(!argv.contains(&"resume".to_string()));
        assert!(argv.contains(&"--model".to_string()));
    }

    #[test]
    fn resume_argv_omits_model() {
        let mut adapter = ProviderBAdapter::new(ProviderBConfig {
            binary: "codex".to_string(),
            model: Some("gpt-5".to_string()),
            image_temp_dir: std::env::temp_dir(),
        });
        adapter.thread_id = Some("thread-123".to_string());
        let opts = RunOptions {
            request_id: "r1".to_string(),
            prompt: "hi".to_string(),
            model: None,
            system_prompt: None,
            project_id: Some("proj1".to_string()),
            thinking_tokens: None,
            images: Vec::new(),
        };
        let argv = adapter.build_argv(&opts, None).unwrap();
        assert_eq!(argv[0], "exec");
        assert_eq!(argv[1], "resume");
        assert_eq!(argv[2], "thread-123");
        assert!(!argv.contains(&"--model".to_string()));
    }

    #[test]
    fn failed_image_decode_leaves_earlier_temp_files_tracked_for_cleanup() {
        use bridge_wire::ImageAttachment;

        let temp_dir = tempfile::tempdir().unwrap();
        let mut adapter = ProviderBAdapter::new(ProviderBConfig {
            binary: "codex".to_string(),
            model: None,
            image_temp_dir: temp_dir.path().to_path_buf(),
        });
        let opts = RunOptions {
            request_id: "r1".to_string(),
            prompt: "hi".to_string(),
            model: None,
            system_prompt: None,
            project_id: None,
            thinking_tokens: None,
            images: vec![
                ImageAttachment { media_type: "image/png".to_string(), data: base64::engine::general_purpose::STANDARD.encode("fake png bytes") },
                ImageAttachment { media_type: "image/png".to_string(), data: "not valid base64!!".to_string() },
            ],
        };

        let result = adapter.build_argv(&opts, None);
        assert!(result.is_err());
        // the first image was written and is still tracked for cleanup
        assert_eq!(adapter.pending_temp_files.len(), 1);
        let written_path = adapter.pending_temp_files[0].clone();
        assert!(written_path.exists());

        adapter.on_execution_end(&opts);
        assert!(!written_path.exists());
        assert!(adapter.pending_temp_files.is_empty());
    }

    #[test]
    fn system_prompt_concatenated_in_band() {
        let mut adapter = ProviderBAdapter::new(ProviderBConfig {
            binary: "codex".to_string(),
            model: None,
            image_temp_dir: std::env::temp_dir(),
        });
        let opts = RunOptions {
            request_id: "r1".to_string(),
            prompt: "do the thing".to_string(),
            model: None,
            system_prompt: Some("be terse".to_string()),
            project_id: None,
            thinking_tokens: None,
            images: Vec::new(),
        };
        let stdin = adapter.build_stdin(&opts).unwrap().unwrap();
        let text = String::from_utf8(stdin).unwrap();
        assert_eq!(text, "be terse\n\n---\n\ndo the thing");
    }
}
