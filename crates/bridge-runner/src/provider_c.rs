//! Provider C: the local HTTP-streamed model server. No subprocess — the
//! resource under management is an abortable HTTP request, so this
//! implements the `Runner` capability set directly over a `reqwest`
//! streaming body instead of sharing the subprocess base.

use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::RunnerError;
use crate::runner::{send_chunk, send_complete, send_error, EventSender, RunOptions, RunnerCommand, RunnerHandle};

const DEFAULT_MODEL: &str = "llama3.2";
const MAX_ERROR_BODY_CHARS: usize = 200;

pub fn spawn_http_runner(client: reqwest::Client, base_url: String, timeout: Duration) -> RunnerHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = Actor {
        client,
        base_url,
        timeout,
        disposed: false,
    };
    tokio::spawn(actor.run_loop(rx));
    RunnerHandle { tx }
}

/// What to do once the current request has been abandoned mid-flight.
enum Interrupt {
    /// A new `run` superseded this one; start over with its payload.
    Restart(RunOptions, EventSender),
    /// Killed, disposed, or the handle was dropped; stop entirely.
    Abort,
}

struct Actor {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    disposed: bool,
}

impl Actor {
    async fn run_loop(mut self, mut rx: mpsc::UnboundedReceiver<RunnerCommand>) {
        loop {
            let (opts, events) = match rx.recv().await {
                None => return,
                Some(RunnerCommand::Run(opts, events)) => {
                    if self.disposed {
                        send_error(&events, &opts.request_id, RunnerError::Disposed.to_string());
                        continue;
                    }
                    (opts, events)
                }
                Some(RunnerCommand::Kill) => continue,
                Some(RunnerCommand::Dispose) => {
                    self.disposed = true;
                    continue;
                }
            };

            self.drive_execution(opts, events, &mut rx).await;
        }
    }

    fn interrupt(&mut self, cmd: Option<RunnerCommand>) -> Interrupt {
        match cmd {
            None => Interrupt::Abort,
            Some(RunnerCommand::Kill) => Interrupt::Abort,
            Some(RunnerCommand::Dispose) => {
                self.disposed = true;
                Interrupt::Abort
            }
            Some(RunnerCommand::Run(new_opts, new_events)) => Interrupt::Restart(new_opts, new_events),
        }
    }

    async fn drive_execution(
        &mut self,
        mut opts: RunOptions,
        mut events: EventSender,
        rx: &mut mpsc::UnboundedReceiver<RunnerCommand>,
    ) {
        'request: loop {
            let request_id = opts.request_id.clone();
            let body = generate_request_body(&opts);

            let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
            let send_fut = self.client.post(&url).json(&body).send();

            let sleep = tokio::time::sleep(self.timeout);
            tokio::pin!(sleep);

            let response = tokio::select! {
                result = send_fut => result,
                _ = &mut sleep => {
                    send_error(&events, &request_id, RunnerError::HttpTimedOut.to_string());
                    return;
                }
                cmd = rx.recv() => {
                    match self.interrupt(cmd) {
                        Interrupt::Abort => return,
                        Interrupt::Restart(new_opts, new_events) => {
                            opts = new_opts;
                            events = new_events;
                            continue 'request;
                        }
                    }
                }
            };

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    if e.is_connect() {
                        send_error(&events, &request_id, RunnerError::HttpUnreachable(self.base_url.clone()).to_string());
                    } else {
                        send_error(&events, &request_id, e.to_string());
                    }
                    return;
                }
            };

            if !response.status().is_success() {
                let status = response.status().as_u16();
                let text = response.text().await.unwrap_or_default();
                let truncated: String = text.chars().take(MAX_ERROR_BODY_CHARS).collect();
                send_error(&events, &request_id, RunnerError::HttpStatus { status, body: truncated }.to_string());
                return;
            }

            let mut stream = response.bytes_stream();
            let mut buffer = String::new();

            loop {
                tokio::select! {
                    cmd = rx.recv() => {
                        match self.interrupt(cmd) {
                            Interrupt::Abort => return,
                            Interrupt::Restart(new_opts, new_events) => {
                                opts = new_opts;
                                events = new_events;
                                continue 'request;
                            }
                        }
                    }
                    _ = &mut sleep => {
                        send_error(&events, &request_id, RunnerError::HttpTimedOut.to_string());
                        return;
                    }
                    chunk = stream.next() => {
                        match chunk {
                            Some(Ok(bytes)) => {
                                if consume_chunk(bytes, &mut buffer, &request_id, &events) {
                                    return;
                                }
                            }
                            Some(Err(_)) => return,
                            None => {
                                // stream ended without an explicit done:true
                                send_complete(&events, &request_id);
                                return;
                            }
                        }
                    }
                }
            }
        }
    }
}

/// Builds the `/api/generate` request body, omitting `system` entirely
/// when no system prompt was supplied rather than sending it as `null`.
fn generate_request_body(opts: &RunOptions) -> serde_json::Map<String, Value> {
    let mut body = serde_json::Map::new();
    body.insert("model".to_string(), Value::String(opts.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string())));
    body.insert("prompt".to_string(), Value::String(opts.prompt.clone()));
    body.insert("stream".to_string(), Value::Bool(true));
    if let Some(system) = &opts.system_prompt {
        body.insert("system".to_string(), Value::String(system.clone()));
    }
    body
}

/// Feeds newly-received bytes into `buffer`, draining and interpreting
/// every complete line. Returns `true` once a terminal event (`complete`
/// or `error`) has been emitted for this request.
fn consume_chunk(bytes: Bytes, buffer: &mut String, request_id: &str, events: &EventSender) -> bool {
    buffer.push_str(&String::from_utf8_lossy(&bytes));

    loop {
        let Some(pos) = buffer.find('\n') else { break };
        let line: String = buffer.drain(..=pos).collect();
        let line = line.trim_end_matches(['\n', '\r']);
        if line.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<Value>(line) else { continue };

        if let Some(msg) = value.get("error").and_then(Value::as_str) {
            send_error(events, request_id, msg);
            return true;
        }
        if value.get("done").and_then(Value::as_bool) == Some(true) {
            send_complete(events, request_id);
            return true;
        }
        if let Some(text) = value.get("response").and_then(Value::as_str) {
            send_chunk(events, request_id, text, false);
        }
    }
    false
}
