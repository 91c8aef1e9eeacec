use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to spawn {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CLI exited with code {0}")]
    ExitedWithCode(i32),

    #[error("CLI killed by signal {0}")]
    KilledBySignal(i32),

    #[error("Process timed out")]
    TimedOut,

    #[error("Runner has been disposed")]
    Disposed,

    #[error("session path escapes the session root")]
    SessionPathEscapes,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Request timed out")]
    HttpTimedOut,

    #[error("server not reachable at {0}")]
    HttpUnreachable(String),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("{0}")]
    Provider(String),
}
