use std::future::Future;
use std::pin::Pin;

use bridge_wire::ImageAttachment;
use tokio::sync::mpsc;

/// A boxed, `Send` future — the capability-set methods below return these
/// instead of being declared `async fn`, so `Runner` stays object-safe and
/// can live behind a `Box<dyn Runner>` in the connection's runner cache.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Everything a runner needs to execute one request, stripped of wire
/// concerns — this is the semantic payload of a validated prompt.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub request_id: String,
    pub prompt: String,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub project_id: Option<String>,
    pub thinking_tokens: Option<u64>,
    pub images: Vec<ImageAttachment>,
}

/// An event a runner reports back about one execution. The channel is the
/// Rust-idiomatic realization of the `onChunk`/`onComplete`/`onError`
/// handler triple: exactly one of `Complete`/`Error` is ever sent per
/// request id, optionally preceded by any number of `Chunk`s.
#[derive(Debug, Clone)]
pub enum RunnerEvent {
    Chunk {
        request_id: String,
        content: String,
        thinking: bool,
    },
    Complete {
        request_id: String,
    },
    Error {
        request_id: String,
        message: String,
    },
}

pub type EventSender = mpsc::UnboundedSender<RunnerEvent>;

pub(crate) fn send_chunk(events: &EventSender, request_id: &str, content: impl Into<String>, thinking: bool) {
    let _ = events.send(RunnerEvent::Chunk {
        request_id: request_id.to_string(),
        content: content.into(),
        thinking,
    });
}

pub(crate) fn send_complete(events: &EventSender, request_id: &str) {
    let _ = events.send(RunnerEvent::Complete {
        request_id: request_id.to_string(),
    });
}

pub(crate) fn send_error(events: &EventSender, request_id: &str, message: impl Into<String>) {
    let _ = events.send(RunnerEvent::Error {
        request_id: request_id.to_string(),
        message: message.into(),
    });
}

/// The capability set every provider implements: `run`, `kill`, `dispose`.
///
/// Subprocess-backed providers share [`crate::subprocess::SubprocessRunner`];
/// the HTTP streaming provider implements this directly since its resource
/// shape (an abortable request, not a child process) doesn't fit the same
/// base.
pub trait Runner: Send {
    fn run<'a>(&'a mut self, options: RunOptions, events: EventSender) -> BoxFuture<'a, ()>;
    fn kill<'a>(&'a mut self) -> BoxFuture<'a, ()>;
    fn dispose<'a>(&'a mut self) -> BoxFuture<'a, ()>;
}

/// Commands posted to a runner actor's inbox. Shared between the
/// subprocess and HTTP-streaming actors so both can hand out the same
/// lightweight [`RunnerHandle`].
pub(crate) enum RunnerCommand {
    Run(RunOptions, EventSender),
    Kill,
    Dispose,
}

/// A cheap, cloneable-by-construction handle to a runner actor task. All
/// three `Runner` methods just post to the actor's inbox and return
/// immediately — the actor's own select loop is the only place that
/// touches the underlying child process or HTTP call, so there is never a
/// race between an incoming cancel and the actor's own exit handling.
pub struct RunnerHandle {
    pub(crate) tx: mpsc::UnboundedSender<RunnerCommand>,
}

impl Runner for RunnerHandle {
    fn run<'a>(&'a mut self, options: RunOptions, events: EventSender) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let _ = self.tx.send(RunnerCommand::Run(options, events));
        })
    }

    fn kill<'a>(&'a mut self) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let _ = self.tx.send(RunnerCommand::Kill);
        })
    }

    fn dispose<'a>(&'a mut self) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let _ = self.tx.send(RunnerCommand::Dispose);
        })
    }
}
