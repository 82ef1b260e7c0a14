use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::application::gate::authorize;
use crate::application::session::Session;
use crate::application::site::SiteIdentity;
use crate::domain::types::Capability;
use crate::presentation::views::{LayoutView, ViewerView, render_error_response};

use super::HttpState;

/// Name of the cookie carrying the opaque session token.
pub const SESSION_COOKIE: &str = "session";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// The classified requester, resolved once per request from the session cookie.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub capability: Capability,
    pub session: Option<Session>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self {
            capability: Capability::Anonymous,
            session: None,
        }
    }

    pub fn from_session(session: Option<Session>) -> Self {
        let capability = session
            .as_ref()
            .map_or(Capability::Anonymous, |session| session.role.into());
        Self {
            capability,
            session,
        }
    }

    pub fn user(&self) -> Option<&str> {
        self.session.as_ref().map(|session| session.user.as_str())
    }

    pub fn view(&self) -> ViewerView {
        ViewerView::new(self.capability, self.user())
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Resolve the session cookie into a [`Viewer`] request extension. The role
/// always comes from the server-side table, never from the client.
pub async fn attach_viewer(
    State(state): State<HttpState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let session = jar
        .get(SESSION_COOKIE)
        .and_then(|cookie| state.auth.sessions().lookup(cookie.value()));
    request
        .extensions_mut()
        .insert(Viewer::from_session(session));
    next.run(request).await
}

/// Route-layer state for [`require_capability`].
#[derive(Clone)]
pub struct Gate {
    required: Capability,
    site: Arc<SiteIdentity>,
}

impl Gate {
    pub fn new(required: Capability, site: Arc<SiteIdentity>) -> Self {
        Self { required, site }
    }
}

pub async fn require_capability(
    State(gate): State<Gate>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let viewer = request
        .extensions()
        .get::<Viewer>()
        .cloned()
        .unwrap_or_else(Viewer::anonymous);

    match authorize(gate.required, viewer.capability) {
        Ok(()) => next.run(request).await,
        Err(denied) => {
            let layout = LayoutView::new(&gate.site, "Unauthorized", viewer.view());
            let mut response = render_error_response(
                layout,
                StatusCode::UNAUTHORIZED,
                "You are not allowed to do that.",
            );
            ErrorReport::from_error(
                "infra::http::middleware::require_capability",
                StatusCode::UNAUTHORIZED,
                &denied,
            )
            .attach(&mut response);
            response
        }
    }
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let viewer = request
        .extensions()
        .get::<Viewer>()
        .map_or(Capability::Anonymous, |viewer| viewer.capability);

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "quillpress::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                viewer = %viewer,
                "request failed",
            );
        } else {
            warn!(
                target = "quillpress::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                viewer = %viewer,
                "client request error",
            );
        }
    }

    response
}
