use std::collections::HashMap;

use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;
use time::{OffsetDateTime, macros::format_description};

use crate::application::error::{ErrorReport, HttpError};
use crate::application::posts::PostPage;
use crate::application::seo::escape_attribute;
use crate::application::site::{SiteIdentity, post_path};
use crate::domain::entities::{CommentRecord, PostRecord};
use crate::domain::files::{BodySegment, FileAsset, segments};
use crate::domain::posts::derived_description;
use crate::domain::types::Capability;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Render the error page and attach a report so the failure is logged.
pub fn render_error_response(
    layout: LayoutView,
    status: StatusCode,
    message: &'static str,
) -> Response {
    let view = ErrorPageView {
        status: status.as_u16(),
        message,
        offer_login: status == StatusCode::UNAUTHORIZED && !layout.viewer.signed_in,
    };
    let mut response = render_template_response(ErrorTemplate { layout, view }, status);
    ErrorReport::from_message("presentation::views::render_error_response", status, message)
        .attach(&mut response);
    response
}

/// Who is looking at the page, reduced to what the templates branch on.
#[derive(Debug, Clone, Default)]
pub struct ViewerView {
    pub signed_in: bool,
    pub name: String,
    pub can_comment: bool,
    pub is_admin: bool,
}

impl ViewerView {
    pub fn new(capability: Capability, name: Option<&str>) -> Self {
        Self {
            signed_in: capability > Capability::Anonymous,
            name: name.unwrap_or_default().to_string(),
            can_comment: capability >= Capability::User,
            is_admin: capability >= Capability::Admin,
        }
    }
}

/// Shared page frame: site name, title, `<head>` extras and viewer.
#[derive(Debug, Clone)]
pub struct LayoutView {
    pub site_name: String,
    pub title: String,
    /// Pre-escaped markup injected into `<head>`.
    pub head: String,
    pub viewer: ViewerView,
}

impl LayoutView {
    pub fn new(site: &SiteIdentity, title: impl Into<String>, viewer: ViewerView) -> Self {
        let title = title.into();
        let title = if title.is_empty() {
            site.name.clone()
        } else {
            format!("{title} · {}", site.name)
        };
        Self {
            site_name: site.name.clone(),
            title,
            head: String::new(),
            viewer,
        }
    }

    pub fn with_head(mut self, head: String) -> Self {
        self.head = head;
        self
    }
}

/// `<head>` markup for a listing page: description plus canonical link.
pub fn listing_head(site: &SiteIdentity, canonical_url: &str) -> String {
    let mut head = String::new();
    if !site.description.is_empty() {
        head.push_str(&format!(
            "<meta name=\"description\" content=\"{}\">\n",
            escape_attribute(&site.description)
        ));
    }
    head.push_str(&format!(
        "<link rel=\"canonical\" href=\"{}\">\n",
        escape_attribute(canonical_url)
    ));
    head
}

#[derive(Debug, Clone)]
pub struct PostCardView {
    pub title: String,
    pub path: String,
    pub excerpt: String,
    pub published: String,
}

impl From<&PostRecord> for PostCardView {
    fn from(post: &PostRecord) -> Self {
        Self {
            title: post.title.clone(),
            path: post_path(&post.slug),
            excerpt: post
                .meta_description
                .clone()
                .unwrap_or_else(|| derived_description(&post.body)),
            published: format_date(post.created_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexView {
    pub posts: Vec<PostCardView>,
    pub page: u32,
    pub previous_page: Option<u32>,
    pub next_page: Option<u32>,
}

impl From<&PostPage> for IndexView {
    fn from(page: &PostPage) -> Self {
        Self {
            posts: page.posts.iter().map(PostCardView::from).collect(),
            page: page.page,
            previous_page: page.has_previous.then(|| page.page - 1),
            next_page: page.has_next.then(|| page.page + 1),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub layout: LayoutView,
    pub view: IndexView,
}

/// One piece of a paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inline {
    Text(String),
    Link { url: String, label: String },
}

/// Rendered post body structure. Text stays raw here; templates escape it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyBlock {
    Paragraph(Vec<Inline>),
    Figure { url: String, alt: String },
}

/// Split a body into paragraphs on blank lines, lifting image references
/// into figures and turning other resolved files into links. Unresolved
/// references are shown by name.
pub fn body_blocks(body: &str, assets: &HashMap<String, FileAsset>) -> Vec<BodyBlock> {
    let mut blocks = Vec::new();

    for paragraph in split_paragraphs(body) {
        let mut inlines = Vec::new();
        for segment in segments(paragraph) {
            match segment {
                BodySegment::Text(text) => push_text(&mut inlines, text),
                BodySegment::File(name) => match assets.get(name) {
                    Some(asset) if asset.is_image() => {
                        flush_paragraph(&mut blocks, &mut inlines);
                        blocks.push(BodyBlock::Figure {
                            url: asset.url.clone(),
                            alt: asset.alt.clone(),
                        });
                    }
                    Some(asset) => inlines.push(Inline::Link {
                        url: asset.url.clone(),
                        label: name.to_string(),
                    }),
                    None => push_text(&mut inlines, name),
                },
            }
        }
        flush_paragraph(&mut blocks, &mut inlines);
    }

    blocks
}

fn split_paragraphs(body: &str) -> Vec<&str> {
    let normalized = body.trim();
    let mut out = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    // paragraphs end at a line that is empty after trimming
    for line in normalized.split_inclusive('\n') {
        if line.trim().is_empty() {
            let chunk = normalized[start..offset].trim();
            if !chunk.is_empty() {
                out.push(chunk);
            }
            start = offset + line.len();
        }
        offset += line.len();
    }
    let tail = normalized[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

fn push_text(inlines: &mut Vec<Inline>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Inline::Text(existing)) = inlines.last_mut() {
        existing.push_str(text);
    } else {
        inlines.push(Inline::Text(text.to_string()));
    }
}

fn flush_paragraph(blocks: &mut Vec<BodyBlock>, inlines: &mut Vec<Inline>) {
    let blank = inlines.iter().all(|inline| match inline {
        Inline::Text(text) => text.trim().is_empty(),
        Inline::Link { .. } => false,
    });
    if blank {
        inlines.clear();
    } else {
        blocks.push(BodyBlock::Paragraph(std::mem::take(inlines)));
    }
}

#[derive(Debug, Clone)]
pub struct CommentView {
    pub id: i64,
    pub author: String,
    pub body: String,
    pub posted: String,
}

impl From<&CommentRecord> for CommentView {
    fn from(comment: &CommentRecord) -> Self {
        Self {
            id: comment.id,
            author: comment.author.clone(),
            body: comment.body.clone(),
            posted: format_date(comment.created_at),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub published: String,
    pub updated: Option<String>,
    pub blocks: Vec<BodyBlock>,
    pub comments: Vec<CommentView>,
}

impl PostView {
    pub fn new(
        post: &PostRecord,
        assets: &HashMap<String, FileAsset>,
        comments: &[CommentRecord],
    ) -> Self {
        let published = format_date(post.created_at);
        let updated = format_date(post.updated_at);
        Self {
            id: post.id,
            title: post.title.clone(),
            updated: (updated != published).then_some(updated),
            published,
            blocks: body_blocks(&post.body, assets),
            comments: comments.iter().map(CommentView::from).collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "post.html")]
pub struct PostTemplate {
    pub layout: LayoutView,
    pub view: PostView,
}

/// Values echoed back into the authoring form.
#[derive(Debug, Clone, Default)]
pub struct PostFormView {
    pub heading: &'static str,
    pub action: &'static str,
    pub id: Option<i64>,
    pub title: String,
    pub body: String,
    pub meta_description: String,
    pub keywords: String,
    pub error: Option<String>,
}

impl PostFormView {
    pub fn create() -> Self {
        Self {
            heading: "New post",
            action: "/create",
            ..Self::default()
        }
    }

    pub fn update(post: &PostRecord) -> Self {
        Self {
            heading: "Edit post",
            action: "/update",
            id: Some(post.id),
            title: post.title.clone(),
            body: post.body.clone(),
            meta_description: post.meta_description.clone().unwrap_or_default(),
            keywords: post.keywords.clone().unwrap_or_default(),
            error: None,
        }
    }
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub layout: LayoutView,
    pub view: PostFormView,
}

#[derive(Debug, Clone)]
pub struct DeleteView {
    pub id: i64,
    pub title: String,
    pub path: String,
}

#[derive(Template)]
#[template(path = "delete_form.html")]
pub struct DeleteTemplate {
    pub layout: LayoutView,
    pub view: DeleteView,
}

#[derive(Debug, Clone, Default)]
pub struct LoginView {
    pub username: String,
    pub error: Option<&'static str>,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub layout: LayoutView,
    pub view: LoginView,
}

#[derive(Debug, Clone)]
pub struct ErrorPageView {
    pub status: u16,
    pub message: &'static str,
    pub offer_login: bool,
}

#[derive(Template)]
#[template(path = "error.html")]
pub struct ErrorTemplate {
    pub layout: LayoutView,
    pub view: ErrorPageView,
}

fn format_date(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;

    fn image(name: &str) -> FileAsset {
        FileAsset {
            url: format!("https://blog.example.com/uploads/{name}"),
            alt: "cover".to_string(),
            content_type: "image/png".to_string(),
        }
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let blocks = body_blocks("First line\nstill first\n\n  \nSecond", &HashMap::new());
        assert_eq!(
            blocks,
            vec![
                BodyBlock::Paragraph(vec![Inline::Text("First line\nstill first".to_string())]),
                BodyBlock::Paragraph(vec![Inline::Text("Second".to_string())]),
            ]
        );
    }

    #[test]
    fn image_references_become_figures() {
        let mut assets = HashMap::new();
        assets.insert("cover.png".to_string(), image("cover.png"));

        let blocks = body_blocks("Before {{file:cover.png}} after", &assets);
        assert_eq!(
            blocks,
            vec![
                BodyBlock::Paragraph(vec![Inline::Text("Before ".to_string())]),
                BodyBlock::Figure {
                    url: "https://blog.example.com/uploads/cover.png".to_string(),
                    alt: "cover".to_string(),
                },
                BodyBlock::Paragraph(vec![Inline::Text(" after".to_string())]),
            ]
        );
    }

    #[test]
    fn other_files_link_and_unknown_files_show_their_name() {
        let mut assets = HashMap::new();
        assets.insert(
            "notes.pdf".to_string(),
            FileAsset {
                url: "https://blog.example.com/uploads/notes.pdf".to_string(),
                alt: "notes".to_string(),
                content_type: "application/pdf".to_string(),
            },
        );

        let blocks = body_blocks("See {{file:notes.pdf}} and {{file:gone.png}}", &assets);
        assert_eq!(
            blocks,
            vec![BodyBlock::Paragraph(vec![
                Inline::Text("See ".to_string()),
                Inline::Link {
                    url: "https://blog.example.com/uploads/notes.pdf".to_string(),
                    label: "notes.pdf".to_string(),
                },
                Inline::Text(" and gone.png".to_string()),
            ])]
        );
    }

    #[test]
    fn post_template_escapes_title_and_body() {
        let post = PostRecord {
            id: 1,
            slug: "x".to_string(),
            title: "<script>alert(1)</script>".to_string(),
            body: "<b>bold</b>".to_string(),
            meta_description: None,
            keywords: None,
            created_at: datetime!(2024-05-01 10:00 UTC),
            updated_at: datetime!(2024-05-01 10:00 UTC),
        };
        let site = SiteIdentity::new(
            &url::Url::parse("https://blog.example.com/").expect("url"),
            "Blog",
            "Author",
            "",
        );
        let template = PostTemplate {
            layout: LayoutView::new(&site, &post.title, ViewerView::default()),
            view: PostView::new(&post, &HashMap::new(), &[]),
        };

        let html = template.render().expect("render");
        assert!(!html.contains("<script>alert(1)</script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<b>bold</b>"));
        assert!(html.contains("2024-05-01"));
    }

    #[test]
    fn viewer_flags_follow_capability() {
        let anonymous = ViewerView::new(Capability::Anonymous, None);
        assert!(!anonymous.signed_in && !anonymous.can_comment && !anonymous.is_admin);

        let user = ViewerView::new(Capability::User, Some("reader"));
        assert!(user.signed_in && user.can_comment && !user.is_admin);

        let admin = ViewerView::new(Capability::Admin, Some("root"));
        assert!(admin.can_comment && admin.is_admin);
    }
}
