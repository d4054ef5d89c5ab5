mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./mediastage.toml",
        "~/.config/mediastage/config.toml",
        "/etc/mediastage/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.pipeline.timeout_secs == 0 {
        anyhow::bail!("pipeline.timeout_secs must be greater than 0");
    }

    if config.scratch.dir.as_os_str().is_empty() {
        anyhow::bail!("scratch.dir cannot be empty");
    }

    if let Some(ref path) = config.tools.ffmpeg_path {
        if !path.exists() {
            tracing::warn!("Configured ffmpeg path does not exist: {:?}", path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.pipeline.deadline(), Duration::from_secs(30));
        assert!(config.tools.ffmpeg_path.is_none());
        assert!(config.scratch.dir.ends_with("mediastage"));
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse_config(
            r#"
            [scratch]
            dir = "/var/tmp/stage"

            [tools]
            ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"

            [pipeline]
            timeout_secs = 90
            "#,
        )
        .unwrap();

        assert_eq!(config.scratch.dir, Path::new("/var/tmp/stage"));
        assert_eq!(
            config.tools.ffmpeg_path.as_deref(),
            Some(Path::new("/opt/ffmpeg/bin/ffmpeg"))
        );
        assert_eq!(config.pipeline.timeout_secs, 90);
    }

    #[test]
    fn zero_timeout_rejected() {
        let err = parse_config("[pipeline]\ntimeout_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("timeout_secs"));
    }

    #[test]
    fn unreadable_path_is_an_error() {
        assert!(load_config(Path::new("/nonexistent/mediastage.toml")).is_err());
    }
}
