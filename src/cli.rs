use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mediastage")]
#[command(author, version, about = "Run media tools under a deadline with scratch-file staging")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a command template and write the produced output file
    ///
    /// Placeholders: BINARY (or FFMPEG), INPUT, OUTPUT.
    /// Example: mediastage run --input clip.mov --output-name out.mp4 -- FFMPEG -i INPUT OUTPUT
    Run {
        /// File whose contents are staged into the scratch directory as INPUT
        #[arg(long, conflicts_with = "input_path")]
        input: Option<PathBuf>,

        /// Existing file used as INPUT in place (never deleted)
        #[arg(long)]
        input_path: Option<PathBuf>,

        /// Name hint for the output file (its extension usually selects the format)
        #[arg(long, default_value = "output")]
        output_name: String,

        /// Wait for the tool however long it takes
        #[arg(long)]
        unbounded: bool,

        /// Where to write the result (defaults to stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Command template tokens
        #[arg(last = true, required = true)]
        command: Vec<String>,
    },

    /// Handle one JSON request and print the JSON response
    Exec {
        /// Request file (reads stdin if not specified)
        #[arg(long)]
        request: Option<PathBuf>,
    },

    /// Check that the external binary is available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
