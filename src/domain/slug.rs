//! Deterministic, URL-safe slugs derived from post titles.
//!
//! Derivation bridges ASCII slugification (`slug` crate) with Chinese
//! transliteration (`pinyin` crate), so “基线对齐” becomes `ji-xian-dui-qi`.
//! Collision handling is pure as well: callers supply the set of slugs already
//! taken in a candidate's family and receive the first free value.

use std::collections::HashSet;

use pinyin::{Pinyin, ToPinyin};
use slug::slugify;
use thiserror::Error;

/// Slug used when a title has no representable characters at all.
pub const PLACEHOLDER_SLUG: &str = "post";

/// Highest numeric suffix tried is `MAX_SUFFIX_ATTEMPTS + 1` (`-2` is the first).
pub const MAX_SUFFIX_ATTEMPTS: u32 = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("exhausted attempts to find a unique slug for `{base}`")]
    Exhausted { base: String },
}

/// Derive a candidate slug from a post title.
///
/// Total: titles that slugify to nothing (empty, punctuation only, symbols)
/// yield [`PLACEHOLDER_SLUG`].
pub fn derive_slug(title: &str) -> String {
    let transliterated = transliterate_to_ascii(title);
    let candidate = slugify(&transliterated);

    if candidate.is_empty() {
        PLACEHOLDER_SLUG.to_string()
    } else {
        candidate
    }
}

/// Whether `slug` is `base` itself or `base` followed by `-<digits>`.
pub fn in_family(base: &str, slug: &str) -> bool {
    if slug == base {
        return true;
    }
    match slug.strip_prefix(base).and_then(|rest| rest.strip_prefix('-')) {
        Some(digits) => !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

/// Return `base` if free, otherwise the first of `base-2`, `base-3`, … that
/// is not in `taken`.
pub fn first_free(base: &str, taken: &HashSet<String>) -> Result<String, SlugError> {
    if !taken.contains(base) {
        return Ok(base.to_string());
    }

    for attempt in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
        let candidate = format!("{base}-{attempt}");
        if !taken.contains(&candidate) {
            return Ok(candidate);
        }
    }

    Err(SlugError::Exhausted {
        base: base.to_string(),
    })
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            // slugify transliterates the remaining characters itself
            None => output.push(ch),
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_lowercases_and_hyphenates() {
        assert_eq!(derive_slug("My Awesome New Post"), "my-awesome-new-post");
        assert_eq!(
            derive_slug("  Hello,   World!! -- again  "),
            "hello-world-again"
        );
    }

    #[test]
    fn derive_slug_transliterates() {
        assert_eq!(derive_slug("Rust 基础教程"), "rust-ji-chu-jiao-cheng");
        assert_eq!(derive_slug("Café Ünïcode"), "cafe-unicode");
    }

    #[test]
    fn derive_slug_never_returns_empty() {
        assert_eq!(derive_slug(""), PLACEHOLDER_SLUG);
        assert_eq!(derive_slug("   "), PLACEHOLDER_SLUG);
        assert_eq!(derive_slug("!!! ??? ..."), PLACEHOLDER_SLUG);
    }

    #[test]
    fn derived_slugs_only_use_safe_characters() {
        for title in ["<script>alert(1)</script>", "a/b\\c?d#e", "tab\tand\nnewline"] {
            let slug = derive_slug(title);
            assert!(!slug.is_empty());
            assert!(
                slug.bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-'),
                "unexpected characters in `{slug}`"
            );
            assert!(!slug.starts_with('-') && !slug.ends_with('-'));
            assert!(!slug.contains("--"));
        }
    }

    #[test]
    fn family_membership_requires_numeric_suffix() {
        assert!(in_family("post", "post"));
        assert!(in_family("post", "post-2"));
        assert!(in_family("post", "post-10"));
        assert!(!in_family("post", "post-"));
        assert!(!in_family("post", "post-two"));
        assert!(!in_family("post", "posts"));
        assert!(!in_family("post", "post-2-draft"));
    }

    #[test]
    fn first_free_skips_taken_suffixes() {
        let taken: HashSet<String> = ["pattern-library", "pattern-library-2", "pattern-library-4"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(
            first_free("pattern-library", &taken).expect("slug"),
            "pattern-library-3"
        );
        assert_eq!(
            first_free("fresh", &taken).expect("slug"),
            "fresh"
        );
    }

    #[test]
    fn first_free_is_bounded() {
        let mut taken: HashSet<String> = HashSet::from(["example".to_string()]);
        for n in 2..=MAX_SUFFIX_ATTEMPTS + 1 {
            taken.insert(format!("example-{n}"));
        }
        assert_eq!(
            first_free("example", &taken),
            Err(SlugError::Exhausted {
                base: "example".to_string()
            })
        );
    }
}
