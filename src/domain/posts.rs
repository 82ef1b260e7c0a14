//! Post text rules: input validation and description derivation.

use super::error::DomainError;
use super::files::{BodySegment, segments};

/// Maximum length, in characters, of a derived meta description.
pub const DESCRIPTION_MAX_CHARS: usize = 160;
const ELLIPSIS: &str = "...";

pub fn ensure_non_empty(value: &str, field: &'static str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        Err(DomainError::validation(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

/// Trim an optional free-text field, mapping blank input to `None`.
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value.and_then(|raw| {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Readable text of a body: markup tags and file references removed,
/// whitespace collapsed to single spaces.
pub fn plain_text(body: &str) -> String {
    let mut text = String::with_capacity(body.len());
    let mut last_was_space = true;

    for segment in segments(body) {
        let BodySegment::Text(chunk) = segment else {
            if !last_was_space {
                text.push(' ');
                last_was_space = true;
            }
            continue;
        };

        let mut in_tag = false;
        for (index, ch) in chunk.char_indices() {
            match ch {
                '<' if !in_tag && opens_tag(&chunk[index + 1..]) => in_tag = true,
                '>' if in_tag => {
                    in_tag = false;
                    if !last_was_space {
                        text.push(' ');
                        last_was_space = true;
                    }
                }
                _ if in_tag => {}
                c if c.is_whitespace() => {
                    if !last_was_space {
                        text.push(' ');
                        last_was_space = true;
                    }
                }
                c => {
                    text.push(c);
                    last_was_space = false;
                }
            }
        }
    }

    text.trim_end().to_string()
}

/// Whether the text after a `<` looks like an HTML tag rather than a
/// literal less-than sign.
fn opens_tag(rest: &str) -> bool {
    let starts = rest
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '/' || c == '!');
    starts && rest.contains('>')
}

/// Truncate to at most `max_chars` characters, ending in `...` only when
/// something was cut. Operates on characters, never splitting a code point.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    let trimmed_len = out.trim_end().len();
    out.truncate(trimmed_len);
    out.push_str(ELLIPSIS);
    out
}

/// Description used when a post has no explicit meta description.
pub fn derived_description(body: &str) -> String {
    truncate_with_ellipsis(&plain_text(body), DESCRIPTION_MAX_CHARS)
}
