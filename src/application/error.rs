use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{
        auth::AuthError, comments::CommentServiceError, content::ContentError, gate::Denied,
        posts::PostServiceError, repos::RepoError, slugs::SlugResolveError,
    },
    infra::error::InfraError,
};

const INTERNAL: &str = "Internal server error";
const UNAVAILABLE: &str = "Service temporarily unavailable";

/// Diagnostic chain attached to error responses for the logging middleware.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = vec![error.to_string()];
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// An HTTP failure: a fixed public body plus an internal report that only
/// reaches the logs.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    public_message: &'static str,
    report: ErrorReport,
}

impl HttpError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        detail: impl Into<String>,
    ) -> Self {
        let report = ErrorReport::from_message(source, status, detail);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        public_message: &'static str,
        error: &dyn StdError,
    ) -> Self {
        let report = ErrorReport::from_error(source, status, error);
        Self {
            status,
            public_message,
            report,
        }
    }

    pub fn bad_request(source: &'static str, detail: impl Into<String>) -> Self {
        Self::new(source, StatusCode::BAD_REQUEST, "Bad request", detail)
    }

    pub fn not_found(source: &'static str, detail: impl Into<String>) -> Self {
        Self::new(source, StatusCode::NOT_FOUND, "Not found", detail)
    }

    pub fn unauthorized(source: &'static str, detail: impl Into<String>) -> Self {
        Self::new(source, StatusCode::UNAUTHORIZED, "Unauthorized", detail)
    }

    pub fn internal(source: &'static str, detail: impl Into<String>) -> Self {
        Self::new(source, StatusCode::INTERNAL_SERVER_ERROR, INTERNAL, detail)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn public_message(&self) -> &'static str {
        self.public_message
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.public_message).into_response();
        self.report.attach(&mut response);
        response
    }
}

fn repo_error(source: &'static str, error: &RepoError) -> HttpError {
    let status = match error {
        RepoError::Timeout | RepoError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        RepoError::NotFound => StatusCode::NOT_FOUND,
        RepoError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
        RepoError::Duplicate { .. } | RepoError::Integrity { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let public = match status {
        StatusCode::SERVICE_UNAVAILABLE => UNAVAILABLE,
        StatusCode::NOT_FOUND => "Not found",
        StatusCode::BAD_REQUEST => "Bad request",
        _ => INTERNAL,
    };
    HttpError::from_error(source, status, public, error)
}

fn slug_resolve_error(source: &'static str, error: &SlugResolveError) -> HttpError {
    match error {
        SlugResolveError::Repo(inner) => repo_error(source, inner),
        SlugResolveError::Slug(_) | SlugResolveError::Contention { .. } => {
            HttpError::from_error(source, StatusCode::INTERNAL_SERVER_ERROR, INTERNAL, error)
        }
    }
}

impl From<RepoError> for HttpError {
    fn from(error: RepoError) -> Self {
        repo_error("application::error::repo_error", &error)
    }
}

impl From<ContentError> for HttpError {
    fn from(error: ContentError) -> Self {
        const SOURCE: &str = "application::content::ContentError";
        match &error {
            ContentError::EmptySlug | ContentError::InvalidId { .. } => {
                HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Bad request", &error)
            }
            ContentError::NotFound => {
                HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Not found", &error)
            }
            ContentError::Repo(inner) => repo_error(SOURCE, inner),
        }
    }
}

impl From<PostServiceError> for HttpError {
    fn from(error: PostServiceError) -> Self {
        const SOURCE: &str = "application::posts::PostServiceError";
        match &error {
            PostServiceError::Validation(_) => {
                HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Bad request", &error)
            }
            PostServiceError::NotFound => {
                HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Not found", &error)
            }
            PostServiceError::Slug(inner) => slug_resolve_error(SOURCE, inner),
            PostServiceError::Repo(inner) => repo_error(SOURCE, inner),
        }
    }
}

impl From<CommentServiceError> for HttpError {
    fn from(error: CommentServiceError) -> Self {
        const SOURCE: &str = "application::comments::CommentServiceError";
        match &error {
            CommentServiceError::Validation(_) => {
                HttpError::from_error(SOURCE, StatusCode::BAD_REQUEST, "Bad request", &error)
            }
            CommentServiceError::PostNotFound | CommentServiceError::NotFound => {
                HttpError::from_error(SOURCE, StatusCode::NOT_FOUND, "Not found", &error)
            }
            CommentServiceError::Repo(inner) => repo_error(SOURCE, inner),
        }
    }
}

impl From<AuthError> for HttpError {
    fn from(error: AuthError) -> Self {
        const SOURCE: &str = "application::auth::AuthError";
        match &error {
            AuthError::InvalidCredentials => HttpError::from_error(
                SOURCE,
                StatusCode::UNAUTHORIZED,
                "Invalid username or password",
                &error,
            ),
            AuthError::Repo(inner) => repo_error(SOURCE, inner),
            AuthError::Hashing(_) => {
                HttpError::from_error(SOURCE, StatusCode::INTERNAL_SERVER_ERROR, INTERNAL, &error)
            }
        }
    }
}

impl From<Denied> for HttpError {
    fn from(denied: Denied) -> Self {
        HttpError::from_error(
            "application::gate::authorize",
            StatusCode::UNAUTHORIZED,
            "Unauthorized",
            &denied,
        )
    }
}

/// Failures that abort the process before or outside request handling.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Capability;

    #[test]
    fn report_collects_source_chain() {
        let error = PostServiceError::Repo(RepoError::Timeout);
        let report = ErrorReport::from_error("test", StatusCode::SERVICE_UNAVAILABLE, &error);
        assert!(report.messages.len() >= 2);
        assert!(report.messages.iter().any(|m| m.contains("timed out")));
    }

    #[test]
    fn content_errors_follow_client_taxonomy() {
        assert_eq!(
            HttpError::from(ContentError::EmptySlug).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HttpError::from(ContentError::InvalidId {
                raw: "abc".to_string()
            })
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            HttpError::from(ContentError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn storage_failures_hide_detail() {
        let error = HttpError::from(ContentError::Repo(RepoError::from_persistence(
            "connection refused at 10.0.0.5:5432",
        )));
        assert_eq!(error.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(!error.public_message().contains("10.0.0.5"));
    }

    #[test]
    fn denial_and_bad_credentials_are_unauthorized() {
        let denied = Denied {
            required: Capability::Admin,
            actual: Capability::User,
        };
        assert_eq!(HttpError::from(denied).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            HttpError::from(AuthError::InvalidCredentials).status(),
            StatusCode::UNAUTHORIZED
        );
    }
}
