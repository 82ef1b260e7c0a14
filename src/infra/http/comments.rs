use axum::{
    Extension, Router,
    extract::{Form, Query, State},
    response::Response,
    routing::{get, post},
};
use serde::Deserialize;

use crate::application::{content::ContentError, error::HttpError, site::post_path};

use super::{HttpState, Viewer, found, parse_id, public::IdQuery};

/// Routes open to any signed-in account.
pub(super) fn routes() -> Router<HttpState> {
    Router::new().route("/create-comment", post(create_comment))
}

/// Routes reserved for administrators.
pub(super) fn moderation_routes() -> Router<HttpState> {
    Router::new().route("/delete-comment", get(delete_comment))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CommentForm {
    post_id: Option<String>,
    body: String,
}

async fn create_comment(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Form(form): Form<CommentForm>,
) -> Result<Response, HttpError> {
    const SOURCE: &str = "infra::http::comments::create_comment";

    let author = viewer
        .user()
        .ok_or_else(|| HttpError::unauthorized(SOURCE, "no session on a comment route"))?;
    let post_id = parse_id(SOURCE, form.post_id.as_deref())?;

    state.comments.create(post_id, author, &form.body).await?;
    let resolved = state.content.resolve_by_id(post_id).await?;
    Ok(found(&post_path(&resolved.post.slug)))
}

async fn delete_comment(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<IdQuery>,
) -> Result<Response, HttpError> {
    const SOURCE: &str = "infra::http::comments::delete_comment";

    let actor = viewer
        .user()
        .ok_or_else(|| HttpError::unauthorized(SOURCE, "no session on a moderation route"))?;
    let id = parse_id(SOURCE, query.id.as_deref())?;
    let comment = state.comments.delete(actor, id).await?;

    match state.content.resolve_by_id(comment.post_id).await {
        Ok(resolved) => Ok(found(&post_path(&resolved.post.slug))),
        Err(ContentError::NotFound) => Ok(found("/")),
        Err(err) => Err(err.into()),
    }
}
