//! Spawn retry: a binary copied onto disk moments earlier (e.g. by an
//! installer running concurrently) can transiently fail to exec with
//! `ETXTBSY` (os error 26). Retry a few times with capped backoff rather
//! than surfacing a spurious spawn failure.

use std::time::Duration;

use tokio::process::{Child, Command};

const MAX_ATTEMPTS: u32 = 5;
const INITIAL_BACKOFF: Duration = Duration::from_millis(20);
const MAX_BACKOFF: Duration = Duration::from_millis(320);

fn is_text_file_busy(err: &std::io::Error) -> bool {
    err.raw_os_error() == Some(26)
}

pub async fn spawn_with_retry(mut command: Command) -> std::io::Result<Child> {
    let mut backoff = INITIAL_BACKOFF;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(err) if is_text_file_busy(&err) && attempt < MAX_ATTEMPTS => {
                tracing::debug!(attempt, backoff_ms = backoff.as_millis() as u64, "spawn busy, retrying");
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
            Err(err) => return Err(err),
        }
    }
}
