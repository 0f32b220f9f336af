//! Unified error handling with Sentry integration.
//!
//! Route handlers return `Result<T, AppError>`. Server-class errors are
//! captured to Sentry before responding; clients only see a safe message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::fragments::FragmentError;
use crate::services::GateError;
use crate::services::validation::ValidationError;
use crate::supabase::SupabaseError;

/// Application-level error type for the site.
#[derive(Debug, Error)]
pub enum AppError {
    /// Hosted backend call failed.
    #[error("Provider error: {0}")]
    Provider(#[from] SupabaseError),

    /// Fragment could not be loaded.
    #[error("Fragment error: {0}")]
    Fragment(#[from] FragmentError),

    /// Form input rejected before any request was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Session/profile gate failed.
    #[error("Gate error: {0}")]
    Gate(#[from] GateError),

    /// Session store failed.
    #[error("Session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    /// Template rendering failed.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but missing a required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Provider(SupabaseError::Api { status: 401 | 403, .. }) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Provider(_) | Self::Gate(GateError::Provider(_)) => StatusCode::BAD_GATEWAY,
            Self::Fragment(FragmentError::NotFound(_) | FragmentError::InvalidPath(_))
            | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Fragment(_) => StatusCode::BAD_GATEWAY,
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Gate(_) | Self::Session(_) | Self::Template(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Provider and validation messages are shown verbatim; the rest stay generic
        let message = match &self {
            Self::Provider(err) => err.user_message(),
            Self::Gate(err) => err.user_message(),
            Self::Validation(err) => err.to_string(),
            Self::Fragment(_) => "Page not found.".to_string(),
            Self::Session(_) | Self::Template(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, message).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context after a successful sign-in.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context on logout.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for user actions.
///
/// ```rust,ignore
/// add_breadcrumb("admin", "Approved role request", Some(&[("role", "tester")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    for (key, value) in data.unwrap_or_default() {
        breadcrumb.data.insert(
            (*key).to_string(),
            serde_json::Value::String((*value).to_string()),
        );
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("docs/missing.html".to_string());
        assert_eq!(err.to_string(), "Not found: docs/missing.html");

        let err = AppError::Validation(ValidationError::PasswordMismatch);
        assert_eq!(err.to_string(), "Passwords do not match.");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            status_of(AppError::Forbidden("admin".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(AppError::Validation(ValidationError::EmptyEmail)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::Fragment(FragmentError::NotFound("x.html".into()))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(AppError::Provider(SupabaseError::Api {
                status: 401,
                message: "JWT expired".into(),
            })),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            status_of(AppError::Provider(SupabaseError::Parse("bad json".into()))),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
