//! Site-wide identity shared by canonical URLs, SEO output and the sitemap.

use url::Url;

/// Path prefix of slug-based post URLs.
pub const POST_PATH_PREFIX: &str = "/p/";

#[derive(Debug, Clone)]
pub struct SiteIdentity {
    base: String,
    pub name: String,
    pub author: String,
    pub description: String,
}

impl SiteIdentity {
    pub fn new(
        public_url: &Url,
        name: impl Into<String>,
        author: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            base: public_url.as_str().trim_end_matches('/').to_string(),
            name: name.into(),
            author: author.into(),
            description: description.into(),
        }
    }

    /// Absolute URL for a site-relative `path`.
    pub fn absolute(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{path}", self.base)
        } else {
            format!("{}/{path}", self.base)
        }
    }

    pub fn home_url(&self) -> String {
        self.absolute("/")
    }

    pub fn post_url(&self, slug: &str) -> String {
        self.absolute(&post_path(slug))
    }
}

pub fn post_path(slug: &str) -> String {
    format!("{POST_PATH_PREFIX}{slug}")
}
