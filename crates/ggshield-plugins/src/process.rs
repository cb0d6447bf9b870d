//! Subprocesses with a hard deadline.

use std::io::Read;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Captured result of a finished subprocess.
#[derive(Debug)]
pub(crate) struct ProcessOutput {
    pub(crate) status: ExitStatus,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

/// Run `cmd` to completion, killing it once `timeout` elapses.
///
/// Returns `Ok(None)` on timeout. Stdin is closed; stdout and stderr are
/// drained on background threads so a chatty child cannot block on a full
/// pipe.
pub(crate) fn run_with_timeout(
    cmd: &mut Command,
    timeout: Duration,
) -> std::io::Result<Option<ProcessOutput>> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now().checked_add(timeout);
    let status = loop {
        if let Some(status) = child.try_wait()? {
            break Some(status);
        }
        if deadline.is_none_or(|d| Instant::now() >= d) {
            let _ = child.kill();
            let _ = child.wait();
            break None;
        }
        thread::sleep(POLL_INTERVAL);
    };

    // On timeout a grandchild may still hold the pipes open; leave the
    // drain threads detached rather than joining them.
    let Some(status) = status else {
        return Ok(None);
    };

    Ok(Some(ProcessOutput {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    }))
}

fn drain(mut pipe: impl Read + Send + 'static) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn collect(handle: Option<thread::JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout() {
        let out = run_with_timeout(
            Command::new("sh").args(["-c", "echo token-123"]),
            Duration::from_secs(5),
        )
        .unwrap()
        .unwrap();
        assert!(out.status.success());
        assert_eq!(out.stdout.trim(), "token-123");
    }

    #[test]
    fn kills_on_timeout() {
        let started = Instant::now();
        let out = run_with_timeout(
            Command::new("sh").args(["-c", "sleep 10"]),
            Duration::from_millis(200),
        )
        .unwrap();
        assert!(out.is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn missing_binary_is_an_error() {
        assert!(
            run_with_timeout(
                &mut Command::new("definitely-not-a-real-binary-ggshield"),
                Duration::from_secs(1)
            )
            .is_err()
        );
    }
}
