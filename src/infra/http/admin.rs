use axum::{
    Extension, Router,
    extract::{Form, Query, State},
    http::StatusCode,
    response::Response,
    routing::get,
};
use serde::Deserialize;

use crate::{
    application::{
        error::{ErrorReport, HttpError},
        posts::{CreatePostCommand, PostServiceError, UpdatePostCommand},
        site::post_path,
    },
    domain::error::DomainError,
    presentation::views::{
        DeleteTemplate, DeleteView, PostFormTemplate, PostFormView, render_template_response,
    },
};

use super::{HttpState, Viewer, found, parse_id, public::IdQuery};

pub(super) fn routes() -> Router<HttpState> {
    Router::new()
        .route("/create", get(create_form).post(create_post))
        .route("/update", get(update_form).post(update_post))
        .route("/delete", get(delete_form).post(delete_post))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PostForm {
    id: Option<String>,
    title: String,
    body: String,
    meta_description: Option<String>,
    keywords: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DeleteForm {
    id: Option<String>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// The gate guarantees a session here; a missing one is still refused.
fn actor<'a>(viewer: &'a Viewer, source: &'static str) -> Result<&'a str, HttpError> {
    viewer
        .user()
        .ok_or_else(|| HttpError::unauthorized(source, "no session on an admin route"))
}

async fn create_form(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
) -> Response {
    render_form(&state, &viewer, PostFormView::create(), StatusCode::OK)
}

async fn create_post(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Form(form): Form<PostForm>,
) -> Result<Response, HttpError> {
    let actor = actor(&viewer, "infra::http::admin::create_post")?;
    let command = CreatePostCommand {
        title: form.title.clone(),
        body: form.body.clone(),
        meta_description: blank_to_none(form.meta_description.clone()),
        keywords: blank_to_none(form.keywords.clone()),
    };

    match state.posts.create(actor, command).await {
        Ok(post) => Ok(found(&post_path(&post.slug))),
        Err(err @ PostServiceError::Validation(_)) => {
            let view = echo_form(PostFormView::create(), form, &err);
            Ok(rejected_form(&state, &viewer, view, &err))
        }
        Err(err) => Err(err.into()),
    }
}

async fn update_form(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<IdQuery>,
) -> Result<Response, HttpError> {
    let id = parse_id("infra::http::admin::update_form", query.id.as_deref())?;
    let post = state.posts.find(id).await?;
    Ok(render_form(
        &state,
        &viewer,
        PostFormView::update(&post),
        StatusCode::OK,
    ))
}

async fn update_post(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Form(form): Form<PostForm>,
) -> Result<Response, HttpError> {
    const SOURCE: &str = "infra::http::admin::update_post";

    let actor = actor(&viewer, SOURCE)?;
    let id = parse_id(SOURCE, form.id.as_deref())?;
    let command = UpdatePostCommand {
        id,
        title: form.title.clone(),
        body: form.body.clone(),
        meta_description: blank_to_none(form.meta_description.clone()),
        keywords: blank_to_none(form.keywords.clone()),
    };

    match state.posts.update(actor, command).await {
        Ok(post) => Ok(found(&post_path(&post.slug))),
        Err(err @ PostServiceError::Validation(_)) => {
            let base = PostFormView {
                heading: "Edit post",
                action: "/update",
                id: Some(id),
                ..PostFormView::default()
            };
            let view = echo_form(base, form, &err);
            Ok(rejected_form(&state, &viewer, view, &err))
        }
        Err(err) => Err(err.into()),
    }
}

async fn delete_form(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<IdQuery>,
) -> Result<Response, HttpError> {
    let id = parse_id("infra::http::admin::delete_form", query.id.as_deref())?;
    let post = state.posts.find(id).await?;
    let layout = state.layout(&viewer, format!("Delete {}", post.title));

    Ok(render_template_response(
        DeleteTemplate {
            layout,
            view: DeleteView {
                id: post.id,
                path: post_path(&post.slug),
                title: post.title,
            },
        },
        StatusCode::OK,
    ))
}

async fn delete_post(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    Form(form): Form<DeleteForm>,
) -> Result<Response, HttpError> {
    const SOURCE: &str = "infra::http::admin::delete_post";

    let actor = actor(&viewer, SOURCE)?;
    let id = parse_id(SOURCE, form.id.as_deref())?;
    state.posts.delete(actor, id).await?;
    Ok(found("/"))
}

fn echo_form(base: PostFormView, form: PostForm, err: &PostServiceError) -> PostFormView {
    let message = match err {
        PostServiceError::Validation(DomainError::Validation { message }) => message.clone(),
        other => other.to_string(),
    };
    PostFormView {
        title: form.title,
        body: form.body,
        meta_description: form.meta_description.unwrap_or_default(),
        keywords: form.keywords.unwrap_or_default(),
        error: Some(message),
        ..base
    }
}

fn rejected_form(
    state: &HttpState,
    viewer: &Viewer,
    view: PostFormView,
    err: &PostServiceError,
) -> Response {
    let mut response = render_form(state, viewer, view, StatusCode::BAD_REQUEST);
    ErrorReport::from_error("infra::http::admin::rejected_form", StatusCode::BAD_REQUEST, err)
        .attach(&mut response);
    response
}

fn render_form(
    state: &HttpState,
    viewer: &Viewer,
    view: PostFormView,
    status: StatusCode,
) -> Response {
    let layout = state.layout(viewer, view.heading);
    render_template_response(PostFormTemplate { layout, view }, status)
}
