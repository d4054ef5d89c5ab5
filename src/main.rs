mod cli;

use mediastage::{
    config,
    request::{self, Context, Request},
};
use mediastage_av::{CommandTemplate, InputSource};

use anyhow::{Context as _, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "mediastage=trace,mediastage_av=trace".to_string()
        } else {
            "mediastage=info,mediastage_av=info".to_string()
        }
    });

    // Logs go to stderr; stdout carries command output.
    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            input,
            input_path,
            output_name,
            unbounded,
            out,
            command,
        } => {
            let input = match (input, input_path) {
                (Some(file), _) => Some(read_staged_input(&file)?),
                (None, Some(path)) => Some(InputSource::path(path)),
                (None, None) => None,
            };
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_command(
                cli.config.as_deref(),
                &command,
                input,
                &output_name,
                unbounded,
                out,
            ))
        }
        Commands::Exec { request } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(exec_request(cli.config.as_deref(), request.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("mediastage {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn read_staged_input(file: &Path) -> Result<InputSource> {
    let data =
        std::fs::read(file).with_context(|| format!("Failed to read input file: {:?}", file))?;
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "input".to_string());
    Ok(InputSource::named(name, data))
}

async fn run_command(
    config_path: Option<&Path>,
    command: &[String],
    input: Option<InputSource>,
    output_name: &str,
    unbounded: bool,
    out: Option<PathBuf>,
) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let ctx = Context::from_config(&config);

    let template = CommandTemplate::parse(command)?;
    let data = ctx
        .pipeline()
        .transcode(&template, input, output_name, unbounded)
        .await?;

    match out {
        Some(path) => {
            std::fs::write(&path, &data)
                .with_context(|| format!("Failed to write output: {:?}", path))?;
            tracing::info!("Wrote {} bytes to {:?}", data.len(), path);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&data)?;
            stdout.flush()?;
        }
    }

    Ok(())
}

async fn exec_request(config_path: Option<&Path>, request_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let ctx = Context::from_config(&config);

    let raw = match request_path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file: {:?}", path))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            buf
        }
    };

    let request: Request = serde_json::from_str(&raw).context("Failed to parse request")?;
    let response = request::handle(&ctx, request).await;
    println!("{}", serde_json::to_string(&response)?);

    Ok(())
}

fn check_tools(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    println!("Checking external tools...\n");

    let program = config
        .tools
        .ffmpeg_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(mediastage_av::tools::DEFAULT_BINARY));
    let info = mediastage_av::check_tool(&program);

    let status = if info.available { "✓" } else { "✗" };
    let version = info.version.as_deref().unwrap_or("not found");
    println!("  {} {}: {}", status, info.name, version);
    if let Some(path) = &info.path {
        println!("      {}", path.display());
    }

    if !info.available {
        println!("\nThe binary is required for run requests.");
        println!("Install ffmpeg or set tools.ffmpeg_path in the config file.");
    } else {
        println!("\nAll required tools are available.");
    }

    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(path)?;

    println!("Configuration is valid");
    println!("  Scratch directory: {}", config.scratch.dir.display());
    println!(
        "  ffmpeg: {}",
        config
            .tools
            .ffmpeg_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(from PATH)".to_string())
    );
    println!("  Deadline: {}s", config.pipeline.timeout_secs);

    Ok(())
}
