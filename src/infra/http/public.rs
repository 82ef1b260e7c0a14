use std::collections::HashMap;

use axum::{
    Extension, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE, LINK},
    },
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::warn;

use crate::{
    application::{
        content::ContentError,
        error::{ErrorReport, HttpError},
        repos::{FileCatalog, with_deadline},
        site::post_path,
        sitemap::{
            ROBOTS_CACHE_CONTROL, ROBOTS_CONTENT_TYPE, SITEMAP_CACHE_CONTROL,
            SITEMAP_CONTENT_TYPE,
        },
    },
    domain::{entities::PostRecord, files::FileAsset, files::references},
    presentation::views::{
        IndexTemplate, IndexView, PostTemplate, PostView, listing_head, render_template_response,
    },
};

use super::{HttpState, Viewer, moved_permanently};

const UPLOAD_CACHE_CONTROL: &str = "public, max-age=86400";

pub(super) fn routes(upload_prefix: &str) -> Router<HttpState> {
    Router::new()
        .route("/", get(index))
        .route("/page", get(page))
        .route("/p", get(empty_slug))
        .route("/p/", get(empty_slug))
        .route("/p/{slug}", get(post_by_slug))
        .route("/post", get(post_by_id))
        .route("/sitemap.xml", get(sitemap))
        .route("/robots.txt", get(robots_txt))
        .route("/_health", get(health))
        .route(&format!("{upload_prefix}/{{*path}}"), get(serve_upload))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PageQuery {
    p: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct IdQuery {
    pub(super) id: Option<String>,
}

async fn index(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<Response, HttpError> {
    render_index(&state, &viewer, 1).await
}

async fn page(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<PageQuery>,
) -> Result<Response, HttpError> {
    let page = parse_page(query.p.as_deref())?;
    render_index(&state, &viewer, page).await
}

/// Missing or blank → page 1. Zero, negative and non-numeric values are
/// client errors.
fn parse_page(raw: Option<&str>) -> Result<u32, HttpError> {
    const SOURCE: &str = "infra::http::public::parse_page";

    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Ok(1);
    }
    match raw.parse::<u32>() {
        Ok(0) => Err(HttpError::bad_request(SOURCE, "page numbers start at 1")),
        Ok(page) => Ok(page),
        Err(_) => Err(HttpError::bad_request(
            SOURCE,
            format!("page `{raw}` is not a positive integer"),
        )),
    }
}

async fn render_index(
    state: &HttpState,
    viewer: &Viewer,
    page: u32,
) -> Result<Response, HttpError> {
    let listing = state.posts.list_page(page).await?;

    let (title, canonical) = if page == 1 {
        (String::new(), state.site.home_url())
    } else {
        (
            format!("Page {page}"),
            state.site.absolute(&format!("/page?p={page}")),
        )
    };
    let layout = state
        .layout(viewer, title)
        .with_head(listing_head(&state.site, &canonical));

    Ok(render_template_response(
        IndexTemplate {
            layout,
            view: IndexView::from(&listing),
        },
        StatusCode::OK,
    ))
}

async fn empty_slug() -> HttpError {
    HttpError::from(ContentError::EmptySlug)
}

async fn post_by_slug(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Path(slug): Path<String>,
) -> Result<Response, HttpError> {
    let resolved = state.content.resolve_by_slug(&slug).await?;
    render_post(&state, &viewer, &resolved.post, &resolved.canonical_url).await
}

async fn post_by_id(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<IdQuery>,
) -> Result<Response, HttpError> {
    let raw = query.id.unwrap_or_default();
    let resolved = state.content.resolve_by_id_param(&raw).await?;

    if !resolved.is_canonical {
        return Ok(moved_permanently(&post_path(&resolved.post.slug)));
    }
    render_post(&state, &viewer, &resolved.post, &resolved.canonical_url).await
}

async fn render_post(
    state: &HttpState,
    viewer: &Viewer,
    post: &PostRecord,
    canonical_url: &str,
) -> Result<Response, HttpError> {
    let comments = state.comments.for_post(post.id).await?;
    let assets = resolve_assets(state.files.as_ref(), &post.body).await;
    let seo = state.seo.build(post, canonical_url).await;

    let layout = state
        .layout(viewer, post.title.clone())
        .with_head(seo.head_html());
    let mut response = render_template_response(
        PostTemplate {
            layout,
            view: PostView::new(post, &assets, &comments),
        },
        StatusCode::OK,
    );

    if let Ok(value) = HeaderValue::from_str(&seo.link_header()) {
        response.headers_mut().insert(LINK, value);
    }
    Ok(response)
}

async fn resolve_assets(files: &dyn FileCatalog, body: &str) -> HashMap<String, FileAsset> {
    let mut assets = HashMap::new();
    for reference in references(body) {
        if assets.contains_key(reference) {
            continue;
        }
        match files.lookup(reference).await {
            Ok(Some(asset)) => {
                assets.insert(reference.to_string(), asset);
            }
            Ok(None) => {}
            Err(err) => warn!(
                target = "quillpress::http::public",
                reference,
                error = %err,
                "file lookup failed; rendering reference as text"
            ),
        }
    }
    assets
}

async fn sitemap(State(state): State<HttpState>) -> Result<Response, HttpError> {
    let body = state.sitemap.sitemap_xml().await?;
    Ok(text_response(body, SITEMAP_CONTENT_TYPE, SITEMAP_CACHE_CONTROL))
}

async fn robots_txt(State(state): State<HttpState>) -> Response {
    text_response(
        state.sitemap.robots_txt(),
        ROBOTS_CONTENT_TYPE,
        ROBOTS_CACHE_CONTROL,
    )
}

async fn health(State(state): State<HttpState>) -> Response {
    match with_deadline(state.storage_timeout, state.health.health_check()).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::public::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

async fn serve_upload(
    State(state): State<HttpState>,
    Path(path): Path<String>,
) -> Result<Response, HttpError> {
    const SOURCE: &str = "infra::http::public::serve_upload";

    let Some((bytes, content_type)) = state.uploads.read(&path).await? else {
        return Err(HttpError::not_found(
            SOURCE,
            format!("no upload at `{path}`"),
        ));
    };

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CACHE_CONTROL, UPLOAD_CACHE_CONTROL)
        .body(Body::from(bytes))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}

fn text_response(body: String, content_type: &'static str, cache_control: &'static str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CACHE_CONTROL, cache_control)
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_parameter_rules() {
        assert_eq!(parse_page(None).expect("missing"), 1);
        assert_eq!(parse_page(Some("  ")).expect("blank"), 1);
        assert_eq!(parse_page(Some("3")).expect("three"), 3);
        for bad in ["0", "-1", "two", "1.5"] {
            assert_eq!(
                parse_page(Some(bad)).expect_err(bad).status(),
                StatusCode::BAD_REQUEST
            );
        }
    }
}
