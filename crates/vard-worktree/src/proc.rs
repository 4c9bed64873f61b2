//! Bounded subprocess execution.
//!
//! Every external call carries an explicit timeout. A timed-out call is
//! killed and reported as its own error variant: callers must treat it as
//! "unknown", never as a confirmed negative.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use thiserror::Error;
use wait_timeout::ChildExt;

#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {}s", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
    #[error("{program} exited with status {status}: {stderr}")]
    Failed {
        program: String,
        status: i32,
        stderr: String,
    },
    #[error("i/o failure running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

impl SubprocessError {
    /// True for outcomes that say nothing about the queried state
    /// (timeout, spawn failure, broken pipes). `Failed` is a real answer
    /// from the program and is not in this set.
    pub fn is_unknown(&self) -> bool {
        !matches!(self, SubprocessError::Failed { .. })
    }
}

/// Run a program to completion with a hard deadline. Returns stdout on
/// success; a non-zero exit becomes `Failed` with captured stderr. The
/// child is killed if the deadline passes.
pub fn run(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<String, SubprocessError> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|source| SubprocessError::Spawn {
        program: program.to_string(),
        source,
    })?;

    // Drain both pipes off-thread so a chatty child can't deadlock us.
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_thread = std::thread::spawn(move || read_all(stdout_handle));
    let stderr_thread = std::thread::spawn(move || read_all(stderr_handle));

    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            let _ = child.kill();
            let _ = child.wait();
            return Err(SubprocessError::Timeout {
                program: program.to_string(),
                timeout,
            });
        }
        Err(source) => {
            let _ = child.kill();
            return Err(SubprocessError::Io {
                program: program.to_string(),
                source,
            });
        }
    };

    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();

    if status.success() {
        Ok(stdout)
    } else {
        Err(SubprocessError::Failed {
            program: program.to_string(),
            status: status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        })
    }
}

fn read_all<R: Read>(handle: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut reader) = handle {
        let _ = reader.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}
