//! Subprocess runner base (C3): spawn, line-read stdout/stderr, timeout,
//! exit reconciliation, and the implicit-kill-on-reuse rule, shared by
//! every subprocess-backed provider.
//!
//! The runner is modeled as an actor: [`SubprocessRunner::spawn`] starts a
//! task that owns the child process state and a command inbox. `run`/
//! `kill`/`dispose` on the returned [`RunnerHandle`] just post to that
//! inbox — the actor's own select loop is the only place allowed to touch
//! the child, so there is never a race between a cancel arriving and the
//! exit-reconciliation step.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use crate::adapter::SubprocessAdapter;
use crate::env::apply_env;
use crate::error::RunnerError;
use crate::runner::{send_complete, send_error, EventSender, RunOptions, RunnerCommand, RunnerHandle};
use crate::session::resolve_working_dir;
use crate::spawn::spawn_with_retry;

/// Spawns the actor task and returns a cheap handle to it.
pub fn spawn_subprocess_runner<A: SubprocessAdapter>(
    adapter: A,
    session_root: PathBuf,
    timeout: Duration,
) -> RunnerHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let actor = Actor {
        adapter,
        session_root,
        timeout,
        disposed: false,
    };
    tokio::spawn(actor.run_loop(rx));
    RunnerHandle { tx }
}

struct Actor<A: SubprocessAdapter> {
    adapter: A,
    session_root: PathBuf,
    timeout: Duration,
    disposed: bool,
}

impl<A: SubprocessAdapter> Actor<A> {
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

    /// Runs one execution to completion, watching the command inbox for a
    /// kill, a dispose, or a superseding `run` the whole time. A
    /// superseding `run` kills the current child (emitting nothing for
    /// it, per the `killed` suppression rule) and loops to start the new
    /// one without returning to the idle state.
    async fn drive_execution(
        &mut self,
        mut opts: RunOptions,
        mut events: EventSender,
        rx: &mut mpsc::UnboundedReceiver<RunnerCommand>,
    ) {
        loop {
            let request_id = opts.request_id.clone();

            let cwd = match resolve_working_dir(&self.session_root, opts.project_id.as_deref()) {
                Ok(cwd) => cwd,
                Err(e) => {
                    send_error(&events, &request_id, e.to_string());
                    return;
                }
            };

            let argv = match self.adapter.build_argv(&opts, cwd.as_deref()) {
                Ok(argv) => argv,
                Err(e) => {
                    // build_argv may have already written temp files (e.g. images)
                    // for earlier items before failing on a later one.
                    self.adapter.on_execution_end(&opts);
                    send_error(&events, &request_id, e.to_string());
                    return;
                }
            };

            let stdin_bytes = match self.adapter.build_stdin(&opts) {
                Ok(bytes) => bytes,
                Err(e) => {
                    self.adapter.on_execution_end(&opts);
                    send_error(&events, &request_id, e.to_string());
                    return;
                }
            };

            let mut command = Command::new(self.adapter.binary());
            command.args(&argv);
            if let Some(dir) = &cwd {
                command.current_dir(dir);
            }
            apply_env(&mut command, &self.adapter.extra_env(&opts));
            command
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let mut child = match spawn_with_retry(command).await {
                Ok(child) => child,
                Err(source) => {
                    self.adapter.on_execution_end(&opts);
                    send_error(
                        &events,
                        &request_id,
                        RunnerError::Spawn {
                            binary: self.adapter.binary().to_string(),
                            source,
                        }
                        .to_string(),
                    );
                    return;
                }
            };

            if let Some(bytes) = stdin_bytes {
                if let Some(mut stdin) = child.stdin.take() {
                    let _ = stdin.write_all(&bytes).await;
                    let _ = stdin.shutdown().await;
                }
            } else {
                drop(child.stdin.take());
            }

            let stdout = child.stdout.take().expect("stdout piped");
            let stderr = child.stderr.take().expect("stderr piped");
            let mut stdout_lines = BufReader::new(stdout).lines();
            let mut stderr_lines = BufReader::new(stderr).lines();

            let sleep = tokio::time::sleep(self.timeout);
            tokio::pin!(sleep);

            let mut stdout_done = false;
            let mut stderr_done = false;
            let mut wait_result: Option<std::io::Result<std::process::ExitStatus>> = None;
            let mut killed = false;
            let mut superseded: Option<(RunOptions, EventSender)> = None;

            loop {
                if stdout_done && stderr_done && wait_result.is_some() {
                    break;
                }
                tokio::select! {
                    cmd = rx.recv() => {
                        match cmd {
                            None => {
                                killed = true;
                                let _ = child.start_kill();
                            }
                            Some(RunnerCommand::Kill) => {
                                killed = true;
                                let _ = child.start_kill();
                            }
                            Some(RunnerCommand::Dispose) => {
                                self.disposed = true;
                                killed = true;
                                let _ = child.start_kill();
                            }
                            Some(RunnerCommand::Run(new_opts, new_events)) => {
                                killed = true;
                                let _ = child.start_kill();
                                superseded = Some((new_opts, new_events));
                            }
                        }
                    }
                    line = stdout_lines.next_line(), if !stdout_done => {
                        match line {
                            Ok(Some(l)) => {
                                if !l.trim().is_empty() {
                                    self.adapter.parse_line(&l, &request_id, &events);
                                }
                            }
                            _ => stdout_done = true,
                        }
                    }
                    line = stderr_lines.next_line(), if !stderr_done => {
                        match line {
                            Ok(Some(l)) => tracing::warn!(request_id = %request_id, "{l}"),
                            _ => stderr_done = true,
                        }
                    }
                    status = child.wait(), if wait_result.is_none() => {
                        wait_result = Some(status);
                    }
                    _ = &mut sleep, if wait_result.is_none() && !killed => {
                        killed = true;
                        let _ = child.start_kill();
                        send_error(&events, &request_id, RunnerError::TimedOut.to_string());
                    }
                }
            }

            self.adapter.on_execution_end(&opts);

            if !killed {
                match wait_result.expect("loop invariant: wait resolved") {
                    Ok(status) if status.success() => send_complete(&events, &request_id),
                    Ok(status) => {
                        let signal = unix_signal(&status);
                        match signal {
                            Some(sig) => send_error(&events, &request_id, RunnerError::KilledBySignal(sig).to_string()),
                            None => {
                                send_error(&events, &request_id, RunnerError::ExitedWithCode(status.code().unwrap_or(-1)).to_string())
                            }
                        }
                    }
                    Err(e) => send_error(&events, &request_id, e.to_string()),
                }
            }

            match superseded {
                Some((new_opts, new_events)) => {
                    opts = new_opts;
                    events = new_events;
                    continue;
                }
                None => return,
            }
        }
    }
}

#[cfg(unix)]
fn unix_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn unix_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::runner::{send_chunk, Runner, RunnerEvent};

    /// Writes an executable shell script standing in for a provider CLI,
    /// mirroring how the adapter tests in this crate fake a binary rather
    /// than shelling out to a real one.
    fn write_fixture_script(dir: &Path, script: &str) -> PathBuf {
        let path = dir.join("fixture.sh");
        std::fs::write(&path, script).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
        }
        path
    }

    /// Passes the request id as argv[0] of the underlying script, so a
    /// fixture can echo it back to let a test tell which invocation
    /// produced which output.
    struct FixtureAdapter {
        binary: String,
    }

    impl SubprocessAdapter for FixtureAdapter {
        fn binary(&self) -> &str {
            &self.binary
        }

        fn build_argv(&mut self, opts: &RunOptions, _cwd: Option<&Path>) -> Result<Vec<String>, RunnerError> {
            Ok(vec![opts.request_id.clone()])
        }

        fn build_stdin(&mut self, _opts: &RunOptions) -> Result<Option<Vec<u8>>, RunnerError> {
            Ok(None)
        }

        fn extra_env(&self, _opts: &RunOptions) -> Vec<(String, String)> {
            Vec::new()
        }

        fn parse_line(&mut self, line: &str, request_id: &str, events: &EventSender) {
            send_chunk(events, request_id, line.to_string(), false);
        }

        fn on_execution_end(&mut self, _opts: &RunOptions) {}
    }

    fn base_opts(request_id: &str) -> RunOptions {
        RunOptions {
            request_id: request_id.to_string(),
            prompt: "hi".to_string(),
            model: None,
            system_prompt: None,
            project_id: None,
            thinking_tokens: None,
            images: Vec::new(),
        }
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<RunnerEvent>) -> RunnerEvent {
        tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event within timeout")
            .expect("channel open")
    }

    #[tokio::test]
    async fn completes_and_emits_stdout_lines() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_fixture_script(
            &dir,
            "#!/usr/bin/env bash\necho \"$1\"\necho done\n",
        );
        let mut handle = spawn_subprocess_runner(FixtureAdapter { binary: script.to_string_lossy().into_owned() }, dir.path().to_path_buf(), Duration::from_secs(5));

        let (tx, mut rx) = mpsc::unbounded_channel();
        handle.run(base_opts("r1"), tx).await;

        assert!(matches!(next_event(&mut rx).await, RunnerEvent::Chunk { content, .. } if content == "r1"));
        assert!(matches!(next_event(&mut rx).await, RunnerEvent::Chunk { content, .. } if content == "done"));
        assert!(matches!(next_event(&mut rx).await, RunnerEvent::Complete { .. }));
    }

    #[tokio::test]
    async fn nonzero_exit_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_fixture_script(&dir, "#!/usr/bin/env bash\nexit 7\n");
        let mut handle = spawn_subprocess_runner(FixtureAdapter { binary: script.to_string_lossy().into_owned() }, dir.path().to_path_buf(), Duration::from_secs(5));

        let (tx, mut rx) = mpsc::unbounded_channel();
        handle.run(base_opts("r1"), tx).await;

        match next_event(&mut rx).await {
            RunnerEvent::Error { message, .. } => assert!(message.contains('7')),
            other => panic!("expected an exit-code error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_kills_child_and_reports_timed_out() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_fixture_script(&dir, "#!/usr/bin/env bash\nsleep 5\n");
        let mut handle = spawn_subprocess_runner(
            FixtureAdapter { binary: script.to_string_lossy().into_owned() },
            dir.path().to_path_buf(),
            Duration::from_millis(100),
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        handle.run(base_opts("r1"), tx).await;

        match next_event(&mut rx).await {
            RunnerEvent::Error { message, .. } => assert!(message.contains("timed out")),
            other => panic!("expected a timeout error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn kill_suppresses_terminal_event() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_fixture_script(&dir, "#!/usr/bin/env bash\nsleep 5\n");
        let mut handle = spawn_subprocess_runner(FixtureAdapter { binary: script.to_string_lossy().into_owned() }, dir.path().to_path_buf(), Duration::from_secs(5));

        let (tx, mut rx) = mpsc::unbounded_channel();
        handle.run(base_opts("r1"), tx).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.kill().await;

        let result = tokio::time::timeout(Duration::from_millis(300), rx.recv()).await;
        assert!(result.is_err(), "killed execution must not emit a terminal event");
    }

    #[tokio::test]
    async fn superseding_run_kills_current_and_starts_new_one() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_fixture_script(
            &dir,
            "#!/usr/bin/env bash\necho \"$1\"\nsleep 1\n",
        );
        let mut handle = spawn_subprocess_runner(FixtureAdapter { binary: script.to_string_lossy().into_owned() }, dir.path().to_path_buf(), Duration::from_secs(5));

        let (tx, mut rx) = mpsc::unbounded_channel();
        handle.run(base_opts("r1"), tx.clone()).await;
        assert!(matches!(next_event(&mut rx).await, RunnerEvent::Chunk { content, .. } if content == "r1"));

        handle.run(base_opts("r2"), tx).await;
        assert!(matches!(next_event(&mut rx).await, RunnerEvent::Chunk { content, .. } if content == "r2"));
        assert!(matches!(next_event(&mut rx).await, RunnerEvent::Complete { request_id } if request_id == "r2"));
    }
}
