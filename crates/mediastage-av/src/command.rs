//! Bounded execution of external tool commands.

use std::ffi::OsString;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use crate::template::display_command;
use crate::{Error, Result};

/// Default deadline applied by the pipeline unless a request is unbounded.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Maximum stderr kept per run (64 KiB). Only the tail is kept; the pipe
/// is always drained to EOF so a chatty tool never hits a closed pipe.
const MAX_STDERR_BYTES: usize = 64 * 1024;

/// How long to keep draining stderr after exit. A grandchild holding the
/// pipe open must not stall the caller.
const STDERR_DRAIN_GRACE: Duration = Duration::from_millis(500);

/// How a bounded run ended.
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// The process exited (with any status).
    Completed {
        /// Process exit status.
        status: ExitStatus,
        /// Captured standard error (lossy UTF-8, truncated).
        stderr: String,
        /// Wall-clock time until exit.
        elapsed: Duration,
    },
    /// The deadline elapsed first.
    TimedOut {
        /// The deadline that was exceeded.
        after: Duration,
    },
}

impl ExecutionOutcome {
    /// Whether the deadline won the race.
    pub fn timed_out(&self) -> bool {
        matches!(self, ExecutionOutcome::TimedOut { .. })
    }
}

/// A resolved argument vector to be run as a child process.
///
/// The first argument is the program; the rest are passed verbatim, with
/// no shell in between.
///
/// # Example
///
/// ```no_run
/// use mediastage_av::{ExecutionOutcome, ToolCommand};
/// use std::time::Duration;
///
/// # async fn example() -> mediastage_av::Result<()> {
/// let outcome = ToolCommand::new(["ffmpeg", "-version"])
///     .deadline(Some(Duration::from_secs(5)))
///     .run()
///     .await?;
/// if let ExecutionOutcome::Completed { status, .. } = outcome {
///     println!("ffmpeg exited with {status}");
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ToolCommand {
    args: Vec<OsString>,
    deadline: Option<Duration>,
}

impl ToolCommand {
    /// Create a command from a resolved argument vector.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            deadline: None,
        }
    }

    /// Set the deadline. `None` waits for the process however long it takes.
    pub fn deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// The full argument vector, program first.
    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Human-readable rendering of the command, for logs.
    pub fn display(&self) -> String {
        display_command(&self.args)
    }

    /// Spawn the process and wait for it, racing the deadline if one is set.
    ///
    /// A non-zero exit status is reported as [`ExecutionOutcome::Completed`];
    /// deciding whether the run succeeded is up to the caller. When the
    /// deadline wins, the child is killed and reaped in the background and
    /// nothing about it is reported afterwards.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if the argument vector is empty.
    /// - [`Error::SpawnFailure`] if the process could not be started.
    /// - [`Error::Io`] if waiting on the process failed.
    pub async fn run(&self) -> Result<ExecutionOutcome> {
        let (program, rest) = self
            .args
            .split_first()
            .ok_or_else(|| Error::InvalidInput("empty command".to_string()))?;
        let program_name = program.to_string_lossy().to_string();

        let mut cmd = Command::new(program);
        cmd.args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            // Dropping the child after a lost race kills it.
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| Error::spawn_failure(program_name.clone(), e))?;

        let stderr_handle = child.stderr.take();
        let mut stderr_task = tokio::spawn(async move { read_tail(stderr_handle).await });

        let status = match self.deadline {
            None => child.wait().await?,
            Some(deadline) => {
                tokio::select! {
                    status = child.wait() => status?,
                    _ = tokio::time::sleep(deadline) => {
                        tracing::debug!(
                            "{} exceeded deadline of {:?}; abandoning",
                            program_name,
                            deadline
                        );
                        stderr_task.abort();
                        return Ok(ExecutionOutcome::TimedOut { after: deadline });
                    }
                }
            }
        };

        let elapsed = start.elapsed();
        let stderr_bytes = match tokio::time::timeout(STDERR_DRAIN_GRACE, &mut stderr_task).await {
            Ok(joined) => joined.unwrap_or_default(),
            Err(_) => {
                stderr_task.abort();
                Vec::new()
            }
        };
        let stderr = String::from_utf8_lossy(&stderr_bytes).into_owned();

        tracing::trace!("{} exited with {} after {:?}", program_name, status, elapsed);

        Ok(ExecutionOutcome::Completed {
            status,
            stderr,
            elapsed,
        })
    }
}

/// Read a stream to EOF, keeping at most the last [`MAX_STDERR_BYTES`].
async fn read_tail<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut tail = Vec::new();
    let Some(mut h) = handle else {
        return tail;
    };

    let mut chunk = [0u8; 8192];
    loop {
        match h.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&chunk[..n]);
                if tail.len() > MAX_STDERR_BYTES {
                    let excess = tail.len() - MAX_STDERR_BYTES;
                    tail.drain(..excess);
                }
            }
        }
    }
    tail
}
