use std::path::Path;

use crate::error::RunnerError;
use crate::runner::{EventSender, RunOptions};

/// What a concrete provider supplies to [`crate::subprocess::SubprocessRunner`].
///
/// The base owns spawn/kill/timeout/exit-reconciliation/double-fire-guard
/// machinery; the adapter only knows how to build one invocation and how
/// to interpret its stdout lines.
pub trait SubprocessAdapter: Send + 'static {
    fn binary(&self) -> &str;

    fn build_argv(&mut self, opts: &RunOptions, cwd: Option<&Path>) -> Result<Vec<String>, RunnerError>;

    fn build_stdin(&mut self, opts: &RunOptions) -> Result<Option<Vec<u8>>, RunnerError>;

    fn extra_env(&self, opts: &RunOptions) -> Vec<(String, String)>;

    /// Called once per non-blank stdout line. Implementations decide for
    /// themselves which shapes to emit chunks for and which to ignore;
    /// unrecognized event types are silently dropped.
    fn parse_line(&mut self, line: &str, request_id: &str, events: &EventSender);

    /// Runs after the child has exited (or been killed), regardless of
    /// outcome — the hook for per-execution cleanup such as unlinking
    /// temp image files.
    fn on_execution_end(&mut self, opts: &RunOptions);
}
