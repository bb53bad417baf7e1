//! Error classification for the HTTP boundary
//!
//! Every failure is reduced to an [`ErrorKind`] before it leaves the crate.
//! The response status is a pure function of the kind; the message is what
//! the client sees, and the source (driver text, I/O detail) only ever goes
//! to the log.

use std::error::Error as StdError;
use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use shelfctl_core::{CredentialError, ValidationError};

use crate::db::{DbError, PoolError};

/// Message for every failed login, whatever the reason.
const INVALID_CREDENTIALS: &str = "invalid email or password";

/// Message for every unclassified failure.
const OPAQUE_INTERNAL: &str = "an internal error occurred";

/// Closed error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    InvalidInput,
    Unauthorized,
    Unavailable,
    Internal,
}

impl ErrorKind {
    /// Fixed kind → status mapping.
    pub fn status(self) -> StatusCode {
        match self {
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict => StatusCode::CONFLICT,
            Self::InvalidInput => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Tag written to the `error` field of response bodies.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::InvalidInput => "invalid_input",
            Self::Unauthorized => "unauthorized",
            Self::Unavailable => "unavailable",
            Self::Internal => "internal_error",
        }
    }

    /// Whether a caller may reasonably retry the same request.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Source = Box<dyn StdError + Send + Sync + 'static>;

/// Classified error: kind, client-facing message, optional internal cause
#[derive(Debug)]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    source: Option<Source>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Attach an underlying cause. It is logged, never sent to the client.
    pub fn with_source(mut self, source: impl Into<Source>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// The single login failure, identical for unknown accounts and wrong
    /// secrets.
    pub fn unauthorized() -> Self {
        Self::new(ErrorKind::Unauthorized, INVALID_CREDENTIALS)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unavailable, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// Opaque internal failure with the cause kept for the log.
    pub fn internal(source: impl Into<Source>) -> Self {
        Self::new(ErrorKind::Internal, OPAQUE_INTERNAL).with_source(source)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn source_ref(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl StdError for ApiError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn StdError + 'static))
    }
}

/// Kind for a raw driver error.
pub fn classify_sqlx(err: &sqlx::Error) -> ErrorKind {
    match err {
        sqlx::Error::RowNotFound => ErrorKind::NotFound,
        sqlx::Error::Database(db) if db.is_unique_violation() => ErrorKind::Conflict,
        sqlx::Error::Database(db) if db.is_check_violation() => ErrorKind::InvalidInput,
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => ErrorKind::Unavailable,
        _ => ErrorKind::Internal,
    }
}

/// Kind for a repository error.
pub fn classify(err: &DbError) -> ErrorKind {
    match err {
        DbError::NotFound { .. } => ErrorKind::NotFound,
        DbError::Conflict { .. } => ErrorKind::Conflict,
        DbError::Sqlx(e) => classify_sqlx(e),
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound { resource, id } => {
                Self::new(ErrorKind::NotFound, format!("{} '{}' not found", resource, id))
            }
            DbError::Conflict { resource } => {
                Self::new(ErrorKind::Conflict, format!("{} already exists", resource))
            }
            DbError::Sqlx(err) => {
                let kind = classify_sqlx(&err);
                let message = match kind {
                    ErrorKind::NotFound => "resource not found",
                    ErrorKind::Conflict => "resource already exists",
                    ErrorKind::InvalidInput => "invalid input",
                    ErrorKind::Unavailable => "database unavailable",
                    _ => return Self::internal(err),
                };
                Self::new(kind, message).with_source(err)
            }
        }
    }
}

impl From<PoolError> for ApiError {
    fn from(e: PoolError) -> Self {
        Self::unavailable("database unavailable").with_source(e)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::invalid_input(e.to_string())
    }
}

impl From<CredentialError> for ApiError {
    fn from(e: CredentialError) -> Self {
        match e {
            CredentialError::EmptySecret | CredentialError::SecretTooLong { .. } => {
                Self::invalid_input(e.to_string())
            }
            _ => Self::internal(e),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::internal(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match (self.kind, &self.source) {
            (ErrorKind::Internal, Some(source)) => {
                tracing::error!(error = %source, "internal error");
            }
            (ErrorKind::Unavailable, Some(source)) => {
                tracing::warn!(error = %source, "dependency unavailable");
            }
            (_, Some(source)) => {
                tracing::debug!(kind = %self.kind, error = %source, "request failed");
            }
            (_, None) => {}
        }

        let status = self.kind.status();
        let body = Json(json!({
            "error": self.kind.as_str(),
            "message": self.message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn status_mapping_is_fixed() {
        assert_eq!(ErrorKind::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorKind::Conflict.status(), StatusCode::CONFLICT);
        assert_eq!(ErrorKind::InvalidInput.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorKind::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorKind::Unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ErrorKind::Internal.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn repository_errors_classify_deterministically() {
        for _ in 0..3 {
            assert_eq!(
                classify(&DbError::Conflict { resource: "user" }),
                ErrorKind::Conflict
            );
            assert_eq!(
                classify(&DbError::not_found("book", 7)),
                ErrorKind::NotFound
            );
            assert_eq!(
                classify(&DbError::Sqlx(sqlx::Error::PoolTimedOut)),
                ErrorKind::Unavailable
            );
            assert_eq!(
                classify(&DbError::Sqlx(sqlx::Error::RowNotFound)),
                ErrorKind::NotFound
            );
            assert_eq!(
                classify(&DbError::Sqlx(sqlx::Error::Protocol("garbled".into()))),
                ErrorKind::Internal
            );
        }
    }

    #[test]
    fn connectivity_failures_are_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(classify_sqlx(&sqlx::Error::Io(io)), ErrorKind::Unavailable);
        assert_eq!(classify_sqlx(&sqlx::Error::PoolClosed), ErrorKind::Unavailable);

        let err = ApiError::from(PoolError::Closed);
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert!(err.kind().is_retryable());
    }

    #[tokio::test]
    async fn internal_errors_hide_their_cause() {
        let err = ApiError::from(DbError::Sqlx(sqlx::Error::Protocol(
            "relation \"users\" does not exist".into(),
        )));
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.source_ref().is_some());

        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["message"], OPAQUE_INTERNAL);
        assert!(!body.to_string().contains("relation"));
    }

    #[tokio::test]
    async fn validation_error_is_400() {
        let err = ApiError::from(ValidationError::Empty { field: "title" });
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_input");
        assert_eq!(body["message"], "title cannot be empty");
    }

    #[tokio::test]
    async fn not_found_is_404() {
        let (status, body) = body_json(DbError::not_found("book", 42).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "book '42' not found");
    }

    #[tokio::test]
    async fn unauthorized_is_uniform() {
        let a = ApiError::unauthorized();
        let b = ApiError::unauthorized();
        assert_eq!(a.kind(), b.kind());
        assert_eq!(a.message(), b.message());

        let (status, body) = body_json(a).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], INVALID_CREDENTIALS);
    }

    #[test]
    fn credential_errors() {
        assert_eq!(
            ApiError::from(CredentialError::EmptySecret).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            ApiError::from(CredentialError::Randomness("no entropy".into())).kind(),
            ErrorKind::Internal
        );
    }
}
