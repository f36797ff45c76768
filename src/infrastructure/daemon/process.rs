//! Bounded external command execution
//!
//! Runs a command with captured output and kills it once the timeout
//! passes. Output is drained on reader threads so a chatty child never
//! blocks on a full pipe.

use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// stderr and stdout joined, trimmed; what a human needs to see on failure
    pub fn combined(&self) -> String {
        let mut out = String::new();
        for part in [self.stderr.trim(), self.stdout.trim()] {
            if part.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(part);
        }
        out
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("empty command")]
    Empty,

    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("'{program}' did not finish within {}s", .after.as_secs())]
    Timeout { program: String, after: Duration },

    #[error("failed waiting for '{program}': {source}")]
    Wait {
        program: String,
        source: std::io::Error,
    },
}

fn drain<R: Read + Send + 'static>(source: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut source) = source {
            let _ = source.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        warn!(error = %e, "failed to kill timed-out command");
    }
    let _ = child.wait();
}

/// Run `argv` (program plus arguments) with a deadline
pub fn run_with_timeout(argv: &[String], timeout: Duration) -> Result<CommandOutput, RunError> {
    let (program, args) = argv.split_first().ok_or(RunError::Empty)?;
    debug!(command = ?argv, timeout_secs = timeout.as_secs(), "running command");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| RunError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) if started.elapsed() >= timeout => {
                kill_and_reap(&mut child);
                return Err(RunError::Timeout {
                    program: program.clone(),
                    after: timeout,
                });
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(source) => {
                kill_and_reap(&mut child);
                return Err(RunError::Wait {
                    program: program.clone(),
                    source,
                });
            }
        }
    };

    let output = CommandOutput {
        status,
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    };
    debug!(command = ?argv, code = ?output.status.code(), "command finished");
    Ok(output)
}
