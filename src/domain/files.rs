//! Inline file references embedded in post bodies.
//!
//! A reference is written `{{file:NAME}}`; NAME is resolved by the file
//! collaborator. Anything that does not parse as a reference stays text.

const OPEN: &str = "{{file:";
const CLOSE: &str = "}}";

/// A file the collaborator can serve, as referenced from a post body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAsset {
    /// Absolute public URL.
    pub url: String,
    pub alt: String,
    pub content_type: String,
}

impl FileAsset {
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// A piece of a post body: literal text or a file reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySegment<'a> {
    Text(&'a str),
    File(&'a str),
}

/// Split a body into text and file-reference segments, in order.
pub fn segments(body: &str) -> Vec<BodySegment<'_>> {
    let mut out = Vec::new();
    let mut rest = body;

    while let Some(start) = rest.find(OPEN) {
        let after_open = &rest[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };
        let name = after_open[..end].trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            // not a reference; keep the opening braces as text and move on
            out.push(BodySegment::Text(&rest[..start + OPEN.len()]));
            rest = after_open;
            continue;
        }

        if start > 0 {
            out.push(BodySegment::Text(&rest[..start]));
        }
        out.push(BodySegment::File(name));
        rest = &after_open[end + CLOSE.len()..];
    }

    if !rest.is_empty() {
        out.push(BodySegment::Text(rest));
    }
    out
}

/// File references in order of appearance.
pub fn references(body: &str) -> impl Iterator<Item = &str> {
    segments(body).into_iter().filter_map(|segment| match segment {
        BodySegment::File(name) => Some(name),
        BodySegment::Text(_) => None,
    })
}
