//! sitemap.xml and robots.txt generation.
//!
//! The sitemap is built from one bulk read of live posts; no per-post
//! storage calls are made.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::application::repos::{PostsRepo, RepoError, with_deadline};
use crate::application::site::SiteIdentity;
use crate::domain::entities::PostRecord;

pub const SITEMAP_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
pub const SITEMAP_CACHE_CONTROL: &str = "public, max-age=3600";
pub const ROBOTS_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
pub const ROBOTS_CACHE_CONTROL: &str = "public, max-age=86400";

/// Administrative paths crawlers are asked to skip.
pub const DISALLOWED_PATHS: &[&str] = &[
    "/create",
    "/update",
    "/delete",
    "/create-comment",
    "/delete-comment",
    "/login",
    "/logout",
    "/_health",
];

#[derive(Clone)]
pub struct SitemapService {
    posts: Arc<dyn PostsRepo>,
    site: Arc<SiteIdentity>,
    storage_timeout: Duration,
}

impl SitemapService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        site: Arc<SiteIdentity>,
        storage_timeout: Duration,
    ) -> Self {
        Self {
            posts,
            site,
            storage_timeout,
        }
    }

    pub async fn sitemap_xml(&self) -> Result<String, RepoError> {
        let posts = with_deadline(self.storage_timeout, self.posts.list_live()).await?;
        Ok(build_sitemap(&self.site, &posts))
    }

    pub fn robots_txt(&self) -> String {
        build_robots(&self.site)
    }
}

pub fn build_sitemap(site: &SiteIdentity, posts: &[PostRecord]) -> String {
    let mut xml = String::with_capacity(128 + posts.len() * 160);
    xml.push_str(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    xml.push_str(&sitemap_entry(&site.home_url(), None, None, "1.0"));
    for post in posts {
        xml.push_str(&sitemap_entry(
            &site.post_url(&post.slug),
            Some(post.updated_at),
            Some("weekly"),
            "0.8",
        ));
    }
    xml.push_str("</urlset>\n");
    xml
}

pub fn build_robots(site: &SiteIdentity) -> String {
    let mut body = String::from("User-agent: *\n");
    for path in DISALLOWED_PATHS {
        body.push_str("Disallow: ");
        body.push_str(path);
        body.push('\n');
    }
    body.push_str("Allow: /\n\nSitemap: ");
    body.push_str(&site.absolute("/sitemap.xml"));
    body.push('\n');
    body
}

fn sitemap_entry(
    loc: &str,
    lastmod: Option<OffsetDateTime>,
    changefreq: Option<&str>,
    priority: &str,
) -> String {
    let mut entry = format!("  <url>\n    <loc>{}</loc>\n", xml_escape(loc));
    if let Some(lastmod) = lastmod.and_then(|dt| dt.format(&Rfc3339).ok()) {
        entry.push_str(&format!("    <lastmod>{lastmod}</lastmod>\n"));
    }
    if let Some(changefreq) = changefreq {
        entry.push_str(&format!("    <changefreq>{changefreq}</changefreq>\n"));
    }
    entry.push_str(&format!("    <priority>{priority}</priority>\n  </url>\n"));
    entry
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
