//! Placeholder substitution for command templates.

use std::ffi::OsString;
use std::fmt;
use std::path::Path;

use crate::{Error, Result};

/// Placeholder replaced with the external binary path.
pub const BINARY_PLACEHOLDER: &str = "BINARY";
/// Legacy spelling of [`BINARY_PLACEHOLDER`].
pub const FFMPEG_PLACEHOLDER: &str = "FFMPEG";
/// Placeholder replaced with the input file path.
pub const INPUT_PLACEHOLDER: &str = "INPUT";
/// Placeholder replaced with the output file path.
pub const OUTPUT_PLACEHOLDER: &str = "OUTPUT";

/// One entry of a [`CommandTemplate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// The external binary.
    Binary,
    /// The input file.
    Input,
    /// The output file.
    Output,
    /// Passed through unchanged.
    Literal(String),
}

impl Token {
    /// Classify a raw template string.
    ///
    /// Placeholders must match exactly; `"-i INPUT"` is a literal.
    pub fn parse(raw: &str) -> Self {
        match raw {
            BINARY_PLACEHOLDER | FFMPEG_PLACEHOLDER => Token::Binary,
            INPUT_PLACEHOLDER => Token::Input,
            OUTPUT_PLACEHOLDER => Token::Output,
            other => Token::Literal(other.to_string()),
        }
    }

    /// Whether this token is a placeholder.
    pub fn is_placeholder(&self) -> bool {
        !matches!(self, Token::Literal(_))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Binary => f.write_str(BINARY_PLACEHOLDER),
            Token::Input => f.write_str(INPUT_PLACEHOLDER),
            Token::Output => f.write_str(OUTPUT_PLACEHOLDER),
            Token::Literal(s) => f.write_str(s),
        }
    }
}

/// An immutable argument list with placeholders.
///
/// A valid template has exactly one [`Token::Binary`] and exactly one
/// [`Token::Output`]. [`Token::Input`] is optional.
///
/// # Example
///
/// ```
/// use mediastage_av::CommandTemplate;
/// use std::path::Path;
///
/// let template = CommandTemplate::parse(["FFMPEG", "-i", "INPUT", "-an", "OUTPUT"])?;
/// let args = template.resolve(
///     Path::new("/usr/bin/ffmpeg"),
///     Some(Path::new("/tmp/in.mov")),
///     Path::new("/tmp/out.mp4"),
/// )?;
/// assert_eq!(args[0], "/usr/bin/ffmpeg");
/// assert_eq!(args[2], "/tmp/in.mov");
/// assert_eq!(args[4], "/tmp/out.mp4");
/// # Ok::<(), mediastage_av::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    tokens: Vec<Token>,
}

impl CommandTemplate {
    /// Build a template from already classified tokens.
    pub fn new(tokens: Vec<Token>) -> Result<Self> {
        let count = |wanted: &Token| tokens.iter().filter(|t| *t == wanted).count();

        match count(&Token::Binary) {
            1 => {}
            n => {
                return Err(Error::InvalidTemplate(format!(
                    "expected exactly one {BINARY_PLACEHOLDER} token, found {n}"
                )))
            }
        }
        match count(&Token::Output) {
            1 => {}
            n => {
                return Err(Error::InvalidTemplate(format!(
                    "expected exactly one {OUTPUT_PLACEHOLDER} token, found {n}"
                )))
            }
        }

        Ok(Self { tokens })
    }

    /// Build a template from a token list known to be valid.
    pub(crate) fn from_trusted(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    /// Build a template from raw strings.
    pub fn parse<I, S>(raw: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(raw.into_iter().map(|s| Token::parse(s.as_ref())).collect())
    }

    /// The template tokens.
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Whether any token refers to the input file.
    pub fn needs_input(&self) -> bool {
        self.tokens.contains(&Token::Input)
    }

    /// Substitute placeholders, producing a concrete argument vector.
    ///
    /// The result has the same length as the template. Arguments are
    /// opaque values meant for direct process spawning; no shell quoting
    /// is applied or needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingInput`] if the template uses `INPUT` and
    /// `input` is `None`.
    pub fn resolve(
        &self,
        binary: &Path,
        input: Option<&Path>,
        output: &Path,
    ) -> Result<Vec<OsString>> {
        self.tokens
            .iter()
            .map(|token| match token {
                Token::Binary => Ok(binary.as_os_str().to_owned()),
                Token::Input => input
                    .map(|p| p.as_os_str().to_owned())
                    .ok_or(Error::MissingInput),
                Token::Output => Ok(output.as_os_str().to_owned()),
                Token::Literal(s) => Ok(OsString::from(s)),
            })
            .collect()
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{token}")?;
        }
        Ok(())
    }
}

/// Render resolved arguments for log output.
///
/// Arguments containing whitespace or quotes are wrapped in single quotes.
/// The result is for humans only and is never executed.
pub fn display_command(args: &[OsString]) -> String {
    args.iter()
        .map(|arg| {
            let arg = arg.to_string_lossy();
            if arg.is_empty() || arg.contains(|c: char| c.is_whitespace() || c == '\'' || c == '"')
            {
                format!("'{}'", arg.replace('\'', "'\\''"))
            } else {
                arg.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
