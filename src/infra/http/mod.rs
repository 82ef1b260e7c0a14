//! HTTP surface: public pages, authoring, comments and sessions.

mod admin;
mod auth;
mod comments;
mod middleware;
mod public;

pub use middleware::{RequestContext, SESSION_COOKIE, Viewer};

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Extension, Router,
    extract::State,
    http::{HeaderValue, StatusCode, header::LOCATION},
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
};

use crate::application::{
    auth::AuthService, comments::CommentService, content::ContentResolver, error::HttpError,
    posts::PostService, repos::FileCatalog, repos::PostsRepo, seo::SeoBuilder,
    site::SiteIdentity, sitemap::SitemapService,
};
use crate::domain::types::Capability;
use crate::infra::files::LocalFileCatalog;
use crate::presentation::views::{LayoutView, render_error_response};

use middleware::{Gate, attach_viewer, log_responses, require_capability, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub site: Arc<SiteIdentity>,
    pub content: Arc<ContentResolver>,
    pub seo: Arc<SeoBuilder>,
    pub files: Arc<dyn FileCatalog>,
    pub uploads: Arc<LocalFileCatalog>,
    pub sitemap: Arc<SitemapService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub auth: Arc<AuthService>,
    pub health: Arc<dyn PostsRepo>,
    pub storage_timeout: Duration,
    pub secure_cookie: bool,
}

impl HttpState {
    fn layout(&self, viewer: &Viewer, title: impl Into<String>) -> LayoutView {
        LayoutView::new(&self.site, title, viewer.view())
    }

    fn gate(&self, required: Capability) -> Gate {
        Gate::new(required, self.site.clone())
    }
}

pub fn build_router(state: HttpState) -> Router {
    let admin = admin::routes()
        .merge(comments::moderation_routes())
        .route_layer(from_fn_with_state(
            state.gate(Capability::Admin),
            require_capability,
        ));
    let commenting = comments::routes().route_layer(from_fn_with_state(
        state.gate(Capability::User),
        require_capability,
    ));

    Router::new()
        .merge(public::routes(state.uploads.public_prefix()))
        .merge(auth::routes())
        .merge(admin)
        .merge(commenting)
        .method_not_allowed_fallback(not_found)
        .fallback(not_found)
        .with_state(state.clone())
        .layer(from_fn(log_responses))
        .layer(from_fn_with_state(state, attach_viewer))
        .layer(from_fn(set_request_context))
}

async fn not_found(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
) -> Response {
    render_error_response(
        state.layout(&viewer, "Not found"),
        StatusCode::NOT_FOUND,
        "Nothing lives at this address.",
    )
}

/// `302 Found` to `location`.
fn found(location: &str) -> Response {
    redirect(StatusCode::FOUND, location)
}

/// `301 Moved Permanently` to `location`.
fn moved_permanently(location: &str) -> Response {
    redirect(StatusCode::MOVED_PERMANENTLY, location)
}

fn redirect(status: StatusCode, location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = status.into_response();
            response.headers_mut().insert(LOCATION, value);
            response
        }
        Err(err) => HttpError::internal(
            "infra::http::redirect",
            format!("invalid redirect target `{location}`: {err}"),
        )
        .into_response(),
    }
}

/// Parse a numeric id taken from a query string or form field.
fn parse_id(source: &'static str, raw: Option<&str>) -> Result<i64, HttpError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Err(HttpError::bad_request(source, "id is missing"));
    }
    raw.parse::<i64>()
        .map_err(|_| HttpError::bad_request(source, format!("id `{raw}` is not numeric")))
}
