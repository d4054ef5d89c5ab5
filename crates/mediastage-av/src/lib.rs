//! # mediastage-av
//!
//! Bounded execution of an external media binary (ffmpeg by default) with
//! inputs and outputs staged through a process-owned scratch directory.
//!
//! This crate provides:
//!
//! - **Scratch files** ([`ScratchDir`], [`StagedFile`]) -- collision-free
//!   paths under one root, with guaranteed and containment-checked removal.
//! - **Command templates** ([`CommandTemplate`]) -- `BINARY`/`INPUT`/`OUTPUT`
//!   placeholder substitution into an argument vector.
//! - **Command execution** ([`ToolCommand`]) -- direct process spawning that
//!   races the child against an optional deadline.
//! - **Pipeline** ([`TranscodePipeline`]) -- stage, run, verify, read back,
//!   clean up.
//! - **Tool discovery** ([`tools`]) and built-in templates ([`presets`]).
//!
//! ## Example
//!
//! ```no_run
//! use mediastage_av::{CommandTemplate, InputSource, ScratchDir, TranscodePipeline};
//! use std::sync::Arc;
//!
//! # async fn example() -> mediastage_av::Result<()> {
//! let scratch = Arc::new(ScratchDir::new(std::env::temp_dir().join("mediastage")));
//! let pipeline = TranscodePipeline::new(scratch, mediastage_av::require_tool("ffmpeg")?);
//!
//! let template = CommandTemplate::parse(["FFMPEG", "-i", "INPUT", "-vn", "OUTPUT"])?;
//! let audio = pipeline
//!     .transcode(&template, Some(InputSource::path("clip.mov")), "audio.m4a", false)
//!     .await?;
//! println!("{} bytes", audio.len());
//! # Ok(())
//! # }
//! ```

pub mod command;
mod error;
pub mod pipeline;
pub mod presets;
pub mod scratch;
pub mod template;
pub mod tools;

// Re-exports
pub use command::{ExecutionOutcome, ToolCommand, DEFAULT_DEADLINE};
pub use error::{Error, Result};
pub use pipeline::{ExecutionRequest, InputSource, TranscodePipeline};
pub use scratch::{ScratchDir, StagedFile};
pub use template::{CommandTemplate, Token};
pub use tools::{check_tool, get_tool_path, require_tool, ToolInfo};
