//! Request/response contract for callers across a process boundary.
//!
//! A caller (typically a UI process) sends one [`Request`] as JSON and gets
//! one [`Response`] back. Byte payloads travel as base64 strings. Failures
//! come back as [`Response::Error`] carrying the stable error kind from
//! [`mediastage_av::Error::kind`].

use std::path::PathBuf;
use std::sync::Arc;

use mediastage_av::{CommandTemplate, InputSource, ScratchDir, TranscodePipeline};
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// A single request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Request {
    /// Run a command template and return the output file's bytes.
    RunCommand {
        command: Vec<String>,
        #[serde(default)]
        input: Option<RequestInput>,
        output_file_name: String,
        #[serde(default)]
        unbounded: bool,
    },
    /// Allocate a fresh scratch path. The file is not created.
    GetTempFilePath {
        #[serde(default)]
        suffix: String,
    },
    /// Write bytes to a fresh scratch path.
    WriteTempFile {
        #[serde(default)]
        suffix: String,
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
    /// Delete a scratch path.
    RemoveTempFile { path: PathBuf },
}

/// Input of a [`Request::RunCommand`].
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestInput {
    Bytes(#[serde(with = "base64_bytes")] Vec<u8>),
    Path(PathBuf),
}

impl From<RequestInput> for InputSource {
    fn from(input: RequestInput) -> Self {
        match input {
            RequestInput::Bytes(data) => InputSource::bytes(data),
            RequestInput::Path(path) => InputSource::path(path),
        }
    }
}

/// The reply to a [`Request`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum Response {
    Bytes {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },
    Path {
        path: PathBuf,
    },
    Ok,
    Error {
        kind: String,
        message: String,
    },
}

impl From<&mediastage_av::Error> for Response {
    fn from(err: &mediastage_av::Error) -> Self {
        Response::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// Process-wide state shared by every request.
#[derive(Debug, Clone)]
pub struct Context {
    pipeline: TranscodePipeline,
}

impl Context {
    /// Wrap an existing pipeline.
    pub fn new(pipeline: TranscodePipeline) -> Self {
        Self { pipeline }
    }

    /// Build the scratch directory and pipeline described by `config`.
    ///
    /// A missing ffmpeg is not fatal here: temp-file requests still work,
    /// and run requests fail with `SpawnFailure`.
    pub fn from_config(config: &Config) -> Self {
        let binary = mediastage_av::get_tool_path(
            mediastage_av::tools::DEFAULT_BINARY,
            config.tools.ffmpeg_path.as_deref(),
        )
        .unwrap_or_else(|e| {
            tracing::warn!("{}; run requests will fail until it is installed", e);
            PathBuf::from(mediastage_av::tools::DEFAULT_BINARY)
        });

        let scratch = Arc::new(ScratchDir::new(&config.scratch.dir));
        let pipeline =
            TranscodePipeline::new(scratch, binary).with_deadline(config.pipeline.deadline());
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &TranscodePipeline {
        &self.pipeline
    }

    fn scratch(&self) -> &ScratchDir {
        self.pipeline.scratch()
    }
}

/// Handle one request. Never fails; errors become [`Response::Error`].
pub async fn handle(ctx: &Context, request: Request) -> Response {
    match dispatch(ctx, request).await {
        Ok(response) => response,
        Err(e) => Response::from(&e),
    }
}

async fn dispatch(ctx: &Context, request: Request) -> mediastage_av::Result<Response> {
    match request {
        Request::RunCommand {
            command,
            input,
            output_file_name,
            unbounded,
        } => {
            let template = CommandTemplate::parse(&command)?;
            let data = ctx
                .pipeline
                .transcode(&template, input.map(Into::into), &output_file_name, unbounded)
                .await?;
            Ok(Response::Bytes {
                data: data.to_vec(),
            })
        }
        Request::GetTempFilePath { suffix } => {
            let staged = ctx.scratch().allocate(&suffix).await?;
            Ok(Response::Path {
                path: staged.keep(),
            })
        }
        Request::WriteTempFile { suffix, data } => {
            let staged = ctx.scratch().write(&suffix, &data).await?;
            Ok(Response::Path {
                path: staged.keep(),
            })
        }
        Request::RemoveTempFile { path } => {
            ctx.scratch().remove(&path).await?;
            Ok(Response::Ok)
        }
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, T>(data: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: AsRef<[u8]>,
    {
        serializer.serialize_str(&STANDARD.encode(data.as_ref()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}
