//! End-to-end transcode invocation.
//!
//! [`TranscodePipeline::transcode`] stages the input, allocates an output
//! path, runs the external binary under a deadline, checks that the output
//! file was produced, and reads it back. Every staged file is released on
//! every exit path; cleanup problems are logged and never replace the
//! primary result.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::command::{ExecutionOutcome, ToolCommand, DEFAULT_DEADLINE};
use crate::scratch::{ScratchDir, StagedFile};
use crate::template::CommandTemplate;
use crate::{Error, Result};

/// Suffix used when staging raw input bytes without a name.
const DEFAULT_INPUT_SUFFIX: &str = "input";

/// Characters of stderr included in the non-zero exit warning.
const STDERR_TAIL_CHARS: usize = 2000;

/// Where the input of a run comes from.
#[derive(Debug, Clone)]
pub enum InputSource {
    /// Raw bytes, staged into the scratch directory for the run.
    Bytes {
        data: Bytes,
        /// File name hint for the staged copy; some tools look at the extension.
        file_name: Option<String>,
    },
    /// A file that already exists. It is never deleted by the pipeline.
    Path(PathBuf),
}

impl InputSource {
    /// Raw bytes without a name hint.
    pub fn bytes(data: impl Into<Bytes>) -> Self {
        InputSource::Bytes {
            data: data.into(),
            file_name: None,
        }
    }

    /// Raw bytes staged under a name ending in `file_name`.
    pub fn named(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        InputSource::Bytes {
            data: data.into(),
            file_name: Some(file_name.into()),
        }
    }

    /// An existing file.
    pub fn path(path: impl Into<PathBuf>) -> Self {
        InputSource::Path(path.into())
    }
}

/// Everything needed for one pipeline run.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub template: CommandTemplate,
    pub input: Option<InputSource>,
    pub output_file_name: String,
    /// Skip the deadline and wait for the process however long it takes.
    pub unbounded: bool,
}

/// Runs command templates against an external binary.
///
/// # Example
///
/// ```no_run
/// use mediastage_av::{presets, InputSource, ScratchDir, TranscodePipeline};
/// use std::sync::Arc;
///
/// # async fn example() -> mediastage_av::Result<()> {
/// let scratch = Arc::new(ScratchDir::new("/tmp/mediastage"));
/// let pipeline = TranscodePipeline::new(scratch, "/usr/bin/ffmpeg");
///
/// let mp4 = pipeline
///     .transcode(
///         &presets::convert_to_mp4(),
///         Some(InputSource::path("/videos/clip.mov")),
///         presets::CONVERT_TO_MP4_OUTPUT,
///         true,
///     )
///     .await?;
/// println!("{} bytes", mp4.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TranscodePipeline {
    scratch: Arc<ScratchDir>,
    binary: PathBuf,
    deadline: Duration,
}

impl TranscodePipeline {
    /// Create a pipeline using the default 30 second deadline.
    pub fn new(scratch: Arc<ScratchDir>, binary: impl Into<PathBuf>) -> Self {
        Self {
            scratch,
            binary: binary.into(),
            deadline: DEFAULT_DEADLINE,
        }
    }

    /// Override the deadline applied to bounded runs.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    /// The scratch directory used for staging.
    pub fn scratch(&self) -> &Arc<ScratchDir> {
        &self.scratch
    }

    /// Path substituted for the binary placeholder.
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Deadline applied to bounded runs.
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Run an [`ExecutionRequest`].
    pub async fn run(&self, request: ExecutionRequest) -> Result<Bytes> {
        self.transcode(
            &request.template,
            request.input,
            &request.output_file_name,
            request.unbounded,
        )
        .await
    }

    /// Run `template` and return the contents of the output file.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingInput`] if the template uses `INPUT` and `input` is `None`.
    /// - [`Error::SpawnFailure`] if the binary could not be started.
    /// - [`Error::WaitTimeExceeded`] if the deadline elapsed (bounded runs only).
    /// - [`Error::OutputMissing`] if the process did not create the output file.
    /// - [`Error::Io`] / [`Error::InvalidInput`] for staging problems.
    pub async fn transcode(
        &self,
        template: &CommandTemplate,
        input: Option<InputSource>,
        output_file_name: &str,
        unbounded: bool,
    ) -> Result<Bytes> {
        // Staged files are released by their guards if staging itself fails.
        let output = self.scratch.allocate(output_file_name).await?;
        let staged_input = match &input {
            Some(InputSource::Bytes { data, file_name }) => {
                let suffix = file_name.as_deref().unwrap_or(DEFAULT_INPUT_SUFFIX);
                Some(self.scratch.write(suffix, data).await?)
            }
            _ => None,
        };

        let input_path = match (&input, &staged_input) {
            (_, Some(staged)) => Some(staged.path()),
            (Some(InputSource::Path(path)), None) => Some(path.as_path()),
            _ => None,
        };

        let result = self
            .execute(template, input_path, output.path(), unbounded)
            .await;

        self.release(staged_input, output);

        if let Err(ref e) = result {
            tracing::error!("Transcode failed: {}", e);
        }
        result
    }

    async fn execute(
        &self,
        template: &CommandTemplate,
        input: Option<&Path>,
        output: &Path,
        unbounded: bool,
    ) -> Result<Bytes> {
        let args = template.resolve(&self.binary, input, output)?;
        let command = ToolCommand::new(args).deadline((!unbounded).then_some(self.deadline));
        let rendered = command.display();

        tracing::info!("Running command: {}", rendered);
        let start = Instant::now();

        match command.run().await? {
            ExecutionOutcome::TimedOut { after } => {
                tracing::warn!("Command exceeded {:?}: {}", after, rendered);
                return Err(Error::WaitTimeExceeded {
                    elapsed: start.elapsed(),
                });
            }
            ExecutionOutcome::Completed { status, stderr, .. } => {
                if !status.success() {
                    tracing::warn!(
                        "Command exited with {} (checking output anyway): {}\n{}",
                        status,
                        rendered,
                        stderr_tail(&stderr)
                    );
                }
            }
        }

        // A directory at OUTPUT is not an output file.
        let produced = match tokio::fs::metadata(output).await {
            Ok(meta) => meta.is_file(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        if !produced {
            return Err(Error::output_missing(output));
        }

        let data = tokio::fs::read(output).await?;
        tracing::info!(
            "Command finished in {}ms ({} bytes): {}",
            start.elapsed().as_millis(),
            data.len(),
            rendered
        );
        Ok(Bytes::from(data))
    }

    fn release(&self, staged_input: Option<StagedFile>, output: StagedFile) {
        if let Some(staged) = staged_input {
            self.scratch.release(staged);
        }
        self.scratch.release(output);
    }
}

fn stderr_tail(stderr: &str) -> &str {
    let trimmed = stderr.trim_end();
    if trimmed.len() <= STDERR_TAIL_CHARS {
        return trimmed;
    }
    let mut start = trimmed.len() - STDERR_TAIL_CHARS;
    while !trimmed.is_char_boundary(start) {
        start += 1;
    }
    &trimmed[start..]
}
