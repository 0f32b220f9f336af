//! Authentication extractors.
//!
//! The login lives in the session as a `CurrentUser`. Extracting it renews
//! the provider token when it is about to expire and lets the gate re-enter
//! the authenticated state with the fresh session.

use axum::{
    extract::FromRequestParts,
    http::{HeaderValue, StatusCode, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use tower_sessions::Session;

use tyxar_core::Role;

use crate::models::{CurrentUser, session_keys};
use crate::services::gate::AuthEvent;
use crate::state::AppState;

/// Where unauthenticated visitors are sent; the gate renders the login forms.
pub const LOGIN_PATH: &str = "/account";

/// Extractor that requires a signed-in user.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.display_name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Error returned when a request lacks the required login or role.
#[derive(Debug)]
pub enum AuthRejection {
    /// Redirect to the login page (for full page requests).
    RedirectToLogin,
    /// HTMX request: ask the client to redirect.
    HxRedirect,
    /// Unauthorized response (for API requests).
    Unauthorized,
    /// Signed in without the required role.
    Forbidden,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin => Redirect::to(LOGIN_PATH).into_response(),
            Self::HxRedirect => (
                StatusCode::UNAUTHORIZED,
                [("HX-Redirect", HeaderValue::from_static(LOGIN_PATH))],
            )
                .into_response(),
            Self::Unauthorized => StatusCode::UNAUTHORIZED.into_response(),
            Self::Forbidden => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

impl AuthRejection {
    fn for_request(parts: &Parts) -> Self {
        if parts.uri.path().starts_with("/api/") {
            Self::Unauthorized
        } else if parts.headers.contains_key("HX-Request") {
            Self::HxRedirect
        } else {
            Self::RedirectToLogin
        }
    }
}

impl FromRequestParts<AppState> for RequireAuth {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Set by SessionManagerLayer
        let session = parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(AuthRejection::Unauthorized)?;

        current_user(state, &session)
            .await
            .map(Self)
            .ok_or_else(|| AuthRejection::for_request(parts))
    }
}

/// The stored login, renewed first when its token is about to expire.
///
/// A rejected refresh signs the visitor out and yields `None`.
pub async fn current_user(state: &AppState, session: &Session) -> Option<CurrentUser> {
    let user: CurrentUser = session
        .get(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()?;

    let now = Utc::now();
    if !user.needs_refresh(now) {
        return Some(user);
    }

    match state.identity().refresh(&user.refresh_token).await {
        Ok(renewed) => {
            let refreshed = user.refreshed(&renewed, now);
            if let Err(e) = set_current_user(session, &refreshed).await {
                tracing::error!(error = %e, "Failed to store refreshed session");
            }
            if let Err(e) = state
                .gate()
                .handle(AuthEvent::TokenRefreshed(Box::new(renewed)), refreshed.view_key)
                .await
            {
                tracing::warn!(error = %e, "Could not re-enter dashboard after refresh");
            }
            tracing::debug!(user = %refreshed.id, "Access token refreshed");
            Some(refreshed)
        }
        Err(e) => {
            tracing::info!(error = %e, user = %user.id, "Session refresh rejected");
            sign_out(state, session, &user).await;
            None
        }
    }
}

/// Forget a login locally: roles, admin view, and the session entry.
pub async fn sign_out(state: &AppState, session: &Session, user: &CurrentUser) {
    if let Err(e) = state
        .gate()
        .handle(AuthEvent::SignedOut(user.id), user.view_key)
        .await
    {
        tracing::warn!(error = %e, "Sign-out handling failed");
    }
    if let Err(e) = clear_current_user(session).await {
        tracing::error!(error = %e, "Failed to clear session");
    }
}

/// Extractor that requires the `admin` role.
///
/// Reads the published role list; after a restart the directory is empty,
/// so the profile is fetched and its roles republished.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        let is_admin = match state.roles().get(user.id).await {
            Some(roles) => roles.contains(&Role::Admin),
            None => match state.store().fetch_profile(&user.access_token, user.id).await {
                Ok(Some(profile)) => {
                    let roles = profile.roles.roles();
                    state.roles().publish(user.id, &roles).await;
                    roles.contains(&Role::Admin)
                }
                Ok(None) => false,
                Err(e) => {
                    tracing::warn!(error = %e, "Could not load roles for admin check");
                    false
                }
            },
        };

        if is_admin {
            Ok(Self(user))
        } else {
            tracing::info!(user = %user.id, path = %parts.uri.path(), "Admin route refused");
            Err(AuthRejection::Forbidden)
        }
    }
}

/// Helper to set the current user in the session.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Helper to clear the current user from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(uri: &str, htmx: bool) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if htmx {
            builder = builder.header("HX-Request", "true");
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_rejection_per_request_kind() {
        assert!(matches!(
            AuthRejection::for_request(&parts("/api/preferences", true)),
            AuthRejection::Unauthorized
        ));
        assert!(matches!(
            AuthRejection::for_request(&parts("/account/section/settings", true)),
            AuthRejection::HxRedirect
        ));
        assert!(matches!(
            AuthRejection::for_request(&parts("/account/projects", false)),
            AuthRejection::RedirectToLogin
        ));
    }

    #[test]
    fn test_hx_redirect_points_at_gate() {
        let response = AuthRejection::HxRedirect.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()["HX-Redirect"], LOGIN_PATH);
    }
}
