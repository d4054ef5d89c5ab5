//! External binary discovery.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::{Error, Result};

/// Default external binary.
pub const DEFAULT_BINARY: &str = "ffmpeg";

/// Information about an external tool.
#[derive(Debug, Clone)]
pub struct ToolInfo {
    /// Name of the tool.
    pub name: String,
    /// Whether the tool is available.
    pub available: bool,
    /// First line of the version output, if available.
    pub version: Option<String>,
    /// Path to the tool executable.
    pub path: Option<PathBuf>,
}

/// Check whether a tool can be run and report its version.
///
/// `program` may be a bare name (looked up on `PATH`) or a path. The
/// version is taken from `<program> -version`, which is what ffmpeg and
/// ffprobe understand.
///
/// # Example
///
/// ```no_run
/// use mediastage_av::check_tool;
///
/// let info = check_tool("ffmpeg");
/// if info.available {
///     println!("ffmpeg: {:?}", info.version);
/// }
/// ```
pub fn check_tool(program: impl AsRef<Path>) -> ToolInfo {
    check_tool_with_arg(program, "-version")
}

/// Check a tool using a custom version argument.
pub fn check_tool_with_arg(program: impl AsRef<Path>, version_arg: &str) -> ToolInfo {
    let program = program.as_ref();
    let name = program
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| program.display().to_string());

    match Command::new(program).arg(version_arg).output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .map(|s| s.to_string());

            ToolInfo {
                name,
                available: true,
                version,
                path: which::which(program).ok(),
            }
        }
        _ => ToolInfo {
            name,
            available: false,
            version: None,
            path: None,
        },
    }
}

/// Require that a tool is on `PATH`, returning its path.
///
/// # Errors
///
/// Returns [`Error::ToolNotFound`] if the tool is not found.
pub fn require_tool(name: &str) -> Result<PathBuf> {
    which::which(name).map_err(|_| Error::tool_not_found(name))
}

/// Resolve the binary to run, preferring a configured path over `PATH` lookup.
///
/// A configured path that does not exist is logged and ignored.
pub fn get_tool_path(name: &str, configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        tracing::warn!(
            "Configured {} path {} does not exist; falling back to PATH",
            name,
            path.display()
        );
    }

    require_tool(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_tool_not_found() {
        let info = check_tool("nonexistent_tool_12345");
        assert!(!info.available);
        assert!(info.version.is_none());
        assert!(info.path.is_none());
        assert_eq!(info.name, "nonexistent_tool_12345");
    }

    #[test]
    fn test_require_tool_not_found() {
        let result = require_tool("nonexistent_tool_12345");
        assert!(matches!(result, Err(Error::ToolNotFound { .. })));
    }

    #[test]
    fn test_configured_path_wins() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let path = get_tool_path("nonexistent_tool_12345", Some(tmp.path())).unwrap();
        assert_eq!(path, tmp.path());
    }

    #[test]
    fn test_missing_configured_path_falls_back() {
        let result = get_tool_path(
            "nonexistent_tool_12345",
            Some(Path::new("/nonexistent/dir/tool")),
        );
        assert!(matches!(result, Err(Error::ToolNotFound { .. })));
    }
}
