use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub scratch: ScratchConfig,

    #[serde(default)]
    pub tools: ToolsConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScratchConfig {
    /// Directory for staged inputs and outputs. Created on first use and
    /// never cleared; it may be shared with other running instances.
    #[serde(default = "default_scratch_dir")]
    pub dir: PathBuf,
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("mediastage")
}

impl Default for ScratchConfig {
    fn default() -> Self {
        Self {
            dir: default_scratch_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ToolsConfig {
    /// Binary substituted for the `BINARY` placeholder (default: `ffmpeg` on PATH)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Deadline for bounded runs, in seconds (default: 30)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl PipelineConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
