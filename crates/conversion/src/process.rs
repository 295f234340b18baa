//! Bounded subprocess execution
//!
//! The conversion engine is an external program that can hang on malformed
//! or encrypted inputs, so every invocation runs under a hard wall-clock
//! deadline. On expiry the child is killed and reaped; no zombie is left
//! behind on any path.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

/// Poll interval for the completion check
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Outcome of a deadline-bounded subprocess run
#[derive(Debug)]
pub enum ProcessOutcome {
    /// The process exited on its own before the deadline
    Exited {
        status: ExitStatus,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
    },
    /// The deadline expired; the process was killed and reaped
    TimedOut,
}

/// Run a command to completion or until `timeout` elapses.
///
/// Stdout and stderr are drained on dedicated threads into buffers capped
/// at `capture_limit` bytes (the most recent bytes are kept), so a verbose
/// child can neither fill the pipe buffer and stall nor grow memory
/// without bound.
///
/// # Errors
/// Returns an error only if the process cannot be spawned or waited on;
/// a non-zero exit or a timeout is reported through `ProcessOutcome`.
pub fn run_with_deadline(
    cmd: &mut Command,
    timeout: Duration,
    capture_limit: usize,
) -> std::io::Result<ProcessOutcome> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn()?;

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_reader = std::thread::spawn(move || {
        stdout_pipe
            .map(|pipe| drain_capped(pipe, capture_limit))
            .unwrap_or_default()
    });
    let stderr_reader = std::thread::spawn(move || {
        stderr_pipe
            .map(|pipe| drain_capped(pipe, capture_limit))
            .unwrap_or_default()
    });

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait()? {
            Some(status) => {
                let stdout = stdout_reader.join().unwrap_or_default();
                let stderr = stderr_reader.join().unwrap_or_default();
                return Ok(ProcessOutcome::Exited {
                    status,
                    stdout,
                    stderr,
                });
            }
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait(); // reap zombie
                    let _ = stdout_reader.join();
                    let _ = stderr_reader.join();
                    return Ok(ProcessOutcome::TimedOut);
                }
                std::thread::sleep(POLL_INTERVAL);
            }
        }
    }
}

/// Read a stream to EOF, keeping at most the last `limit` bytes
fn drain_capped<R: Read>(mut reader: R, limit: usize) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => {
                buf.extend_from_slice(&chunk[..n]);
                if buf.len() > limit {
                    let excess = buf.len() - limit;
                    buf.drain(..excess);
                }
            }
            Err(_) => break,
        }
    }
    buf
}
