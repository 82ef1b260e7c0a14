use axum::{
    Extension, Router,
    extract::{Form, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;

use crate::{
    application::{
        auth::AuthError,
        error::{ErrorReport, HttpError},
    },
    presentation::views::{LoginTemplate, LoginView, render_template_response},
};

use super::{HttpState, SESSION_COOKIE, Viewer, found};

const INVALID_CREDENTIALS: &str = "Invalid username or password";

pub(super) fn routes() -> Router<HttpState> {
    Router::new()
        .route("/login", get(login_form).post(login))
        .route("/logout", get(logout))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginForm {
    username: String,
    password: String,
}

async fn login_form(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
) -> Response {
    render_login(&state, &viewer, LoginView::default(), StatusCode::OK)
}

/// Exchange credentials for a session cookie. Unknown users and wrong
/// passwords produce the same page.
async fn login(
    State(state): State<HttpState>,
    Extension(viewer): Extension<Viewer>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> Result<Response, HttpError> {
    match state.auth.login(&form.username, &form.password).await {
        Ok(issued) => {
            let cookie = Cookie::build((SESSION_COOKIE, issued.token))
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(state.secure_cookie)
                .max_age(state.auth.sessions().ttl());
            Ok((jar.add(cookie), found("/")).into_response())
        }
        Err(err @ AuthError::InvalidCredentials) => {
            let view = LoginView {
                username: form.username.trim().to_string(),
                error: Some(INVALID_CREDENTIALS),
            };
            let mut response = render_login(&state, &viewer, view, StatusCode::UNAUTHORIZED);
            ErrorReport::from_error("infra::http::auth::login", StatusCode::UNAUTHORIZED, &err)
                .attach(&mut response);
            Ok(response)
        }
        Err(err) => Err(err.into()),
    }
}

/// Revoke the presented session, if any, and always clear the cookie.
async fn logout(State(state): State<HttpState>, jar: CookieJar) -> Response {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.auth.logout(cookie.value());
    }
    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    (jar, found("/")).into_response()
}

fn render_login(
    state: &HttpState,
    viewer: &Viewer,
    view: LoginView,
    status: StatusCode,
) -> Response {
    let layout = state.layout(viewer, "Log in");
    render_template_response(LoginTemplate { layout, view }, status)
}
