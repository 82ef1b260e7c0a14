//! Per-post SEO metadata: description, canonical link, Open Graph, Twitter
//! Card and JSON-LD structured data.
//!
//! Values are kept raw until rendering; each output context applies its own
//! escaping, so truncation never splits an entity.

use std::fmt::Write as _;
use std::sync::Arc;

use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::warn;

use crate::application::repos::FileCatalog;
use crate::application::site::SiteIdentity;
use crate::domain::entities::PostRecord;
use crate::domain::files::{FileAsset, references};
use crate::domain::posts::derived_description;

#[derive(Debug, Clone)]
pub struct SeoBlock {
    pub title: String,
    pub description: String,
    pub keywords: Option<String>,
    pub canonical_url: String,
    pub site_name: String,
    pub author: String,
    pub image: Option<FileAsset>,
    pub published: Option<String>,
    pub modified: Option<String>,
}

impl SeoBlock {
    /// Value of the `Link` response header.
    pub fn link_header(&self) -> String {
        format!("<{}>; rel=\"canonical\"", self.canonical_url)
    }

    /// `<head>` markup: every user-controlled value is attribute-escaped or,
    /// inside the JSON-LD script, JSON-encoded with markup characters escaped.
    pub fn head_html(&self) -> String {
        let mut out = String::with_capacity(1024);
        meta_name(&mut out, "description", &self.description);
        if let Some(keywords) = &self.keywords {
            meta_name(&mut out, "keywords", keywords);
        }
        let _ = writeln!(
            out,
            "<link rel=\"canonical\" href=\"{}\">",
            escape_attribute(&self.canonical_url)
        );

        meta_property(&mut out, "og:type", "article");
        meta_property(&mut out, "og:title", &self.title);
        meta_property(&mut out, "og:url", &self.canonical_url);
        meta_property(&mut out, "og:site_name", &self.site_name);
        meta_property(&mut out, "og:description", &self.description);
        if let Some(image) = &self.image {
            meta_property(&mut out, "og:image", &image.url);
            if !image.alt.is_empty() {
                meta_property(&mut out, "og:image:alt", &image.alt);
            }
        }

        let card = if self.image.is_some() {
            "summary_large_image"
        } else {
            "summary"
        };
        meta_name(&mut out, "twitter:card", card);
        meta_name(&mut out, "twitter:title", &self.title);
        meta_name(&mut out, "twitter:description", &self.description);
        if let Some(image) = &self.image {
            meta_name(&mut out, "twitter:image", &image.url);
            if !image.alt.is_empty() {
                meta_name(&mut out, "twitter:image:alt", &image.alt);
            }
        }

        let _ = writeln!(
            out,
            "<script type=\"application/ld+json\">{}</script>",
            self.json_ld()
        );
        out
    }

    /// `BlogPosting` structured data, safe to embed in a `<script>` element.
    pub fn json_ld(&self) -> String {
        let mut object = Map::new();
        object.insert("@context".into(), json!("https://schema.org"));
        object.insert("@type".into(), json!("BlogPosting"));
        object.insert("headline".into(), json!(self.title));
        object.insert("description".into(), json!(self.description));
        object.insert(
            "author".into(),
            json!({ "@type": "Person", "name": self.author }),
        );
        object.insert(
            "publisher".into(),
            json!({ "@type": "Organization", "name": self.site_name }),
        );
        object.insert(
            "mainEntityOfPage".into(),
            json!({ "@type": "WebPage", "@id": self.canonical_url }),
        );
        if let Some(published) = &self.published {
            object.insert("datePublished".into(), json!(published));
        }
        if let Some(modified) = &self.modified {
            object.insert("dateModified".into(), json!(modified));
        }
        if let Some(image) = &self.image {
            object.insert("image".into(), json!(image.url));
        }
        if let Some(keywords) = &self.keywords {
            object.insert("keywords".into(), json!(keywords));
        }

        escape_script_json(&Value::Object(object).to_string())
    }
}

pub struct SeoBuilder {
    site: Arc<SiteIdentity>,
    files: Arc<dyn FileCatalog>,
}

impl SeoBuilder {
    pub fn new(site: Arc<SiteIdentity>, files: Arc<dyn FileCatalog>) -> Self {
        Self { site, files }
    }

    pub fn site(&self) -> &SiteIdentity {
        &self.site
    }

    /// Build the block for `post`, looking up its first inline image.
    pub async fn build(&self, post: &PostRecord, canonical_url: &str) -> SeoBlock {
        let image = self.first_image(&post.body).await;
        build_block(&self.site, post, canonical_url, image)
    }

    async fn first_image(&self, body: &str) -> Option<FileAsset> {
        let reference = references(body).next()?;
        match self.files.lookup(reference).await {
            Ok(asset) => asset.filter(FileAsset::is_image),
            Err(err) => {
                warn!(
                    target = "quillpress::seo",
                    reference,
                    error = %err,
                    "file lookup failed; omitting image metadata"
                );
                None
            }
        }
    }
}

/// Assemble a block from already-resolved inputs.
pub fn build_block(
    site: &SiteIdentity,
    post: &PostRecord,
    canonical_url: &str,
    image: Option<FileAsset>,
) -> SeoBlock {
    let description = match &post.meta_description {
        Some(explicit) if !explicit.trim().is_empty() => explicit.trim().to_string(),
        _ => derived_description(&post.body),
    };

    SeoBlock {
        title: post.title.clone(),
        description,
        keywords: post
            .keywords
            .as_ref()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty()),
        canonical_url: canonical_url.to_string(),
        site_name: site.name.clone(),
        author: site.author.clone(),
        image,
        published: format_timestamp(post.created_at),
        modified: format_timestamp(post.updated_at),
    }
}

fn format_timestamp(value: OffsetDateTime) -> Option<String> {
    value.format(&Rfc3339).ok()
}

fn meta_name(out: &mut String, name: &str, content: &str) {
    let _ = writeln!(
        out,
        "<meta name=\"{name}\" content=\"{}\">",
        escape_attribute(content)
    );
}

fn meta_property(out: &mut String, property: &str, content: &str) {
    let _ = writeln!(
        out,
        "<meta property=\"{property}\" content=\"{}\">",
        escape_attribute(content)
    );
}

/// Escape a value for a double- or single-quoted HTML attribute.
pub fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '\n' | '\r' | '\t' => escaped.push(' '),
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn escape_script_json(encoded: &str) -> String {
    let mut escaped = String::with_capacity(encoded.len());
    for ch in encoded.chars() {
        match ch {
            '<' => escaped.push_str("\\u003c"),
            '>' => escaped.push_str("\\u003e"),
            '&' => escaped.push_str("\\u0026"),
            '\u{2028}' => escaped.push_str("\\u2028"),
            '\u{2029}' => escaped.push_str("\\u2029"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
