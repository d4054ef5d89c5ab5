//! Built-in command templates.

use crate::template::{CommandTemplate, Token};

/// Suggested output name for [`convert_to_mp4`].
pub const CONVERT_TO_MP4_OUTPUT: &str = "output.mp4";

/// Suggested output name for [`extract_thumbnail`].
pub const THUMBNAIL_OUTPUT: &str = "thumb.jpeg";

fn lit(s: &str) -> Token {
    Token::Literal(s.to_string())
}

/// Re-encode a video to MP4 with the fastest x264 preset.
///
/// Conversions of long videos routinely exceed the default deadline, so
/// run this preset unbounded.
pub fn convert_to_mp4() -> CommandTemplate {
    build(vec![
        Token::Binary,
        lit("-i"),
        Token::Input,
        lit("-preset"),
        lit("ultrafast"),
        Token::Output,
    ])
}

/// Grab a single frame as a JPEG thumbnail.
pub fn extract_thumbnail(seek_seconds: u32) -> CommandTemplate {
    build(vec![
        Token::Binary,
        lit("-ss"),
        Token::Literal(seek_seconds.to_string()),
        lit("-i"),
        Token::Input,
        lit("-vframes"),
        lit("1"),
        Token::Output,
    ])
}

fn build(tokens: Vec<Token>) -> CommandTemplate {
    debug_assert!(CommandTemplate::new(tokens.clone()).is_ok());
    CommandTemplate::from_trusted(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn convert_to_mp4_shape() {
        let template = convert_to_mp4();
        assert!(template.needs_input());
        assert_eq!(
            template.to_string(),
            "BINARY -i INPUT -preset ultrafast OUTPUT"
        );
    }

    #[test]
    fn thumbnail_seek() {
        let template = extract_thumbnail(2);
        assert_eq!(
            template.to_string(),
            "BINARY -ss 2 -i INPUT -vframes 1 OUTPUT"
        );
    }
}
