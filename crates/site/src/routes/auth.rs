//! Authentication route handlers.
//!
//! Password sign-in and sign-up post from the gate's forms and answer with a
//! fresh `#gate`: the forms with a status line, or the dashboard. OAuth goes
//! through the provider's PKCE flow and lands back on `/account`.

use axum::{
    Form,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{IntoResponse, Redirect, Response},
};
use askama::Template;
use chrono::Utc;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{clear_current_user, current_user, set_current_user, sign_out};
use crate::models::{CurrentUser, session_keys};
use crate::services::gate::{AuthEvent, GateState, LoginOutcome};
use crate::state::AppState;
use crate::supabase::{AuthSession, OAuthProvider, Pkce};

use super::account::{AuthFormsTemplate, gate_html, gate_response, wrap_gate};
use super::is_htmx;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Sign-up form data.
#[derive(Debug, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Query parameters on the OAuth callback.
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

// =============================================================================
// Session Transitions
// =============================================================================

/// Enter the authenticated state for a new login, then store it.
///
/// The login is only stored once the profile is ready. If the gate fails,
/// the provider session is ended and the visitor stays signed out with the
/// failure as status.
async fn begin_session(
    state: &AppState,
    session: &Session,
    auth: AuthSession,
) -> Result<GateState> {
    let user = CurrentUser::from_session(&auth, Utc::now());

    let gate = match state
        .gate()
        .handle(AuthEvent::SignedIn(Box::new(auth)), user.view_key)
        .await
    {
        Ok(gate) => gate,
        Err(e) => {
            tracing::error!(error = %e, user = %user.id, "Could not prepare profile after sign-in");
            if let Err(e) = state.identity().sign_out(&user.access_token).await {
                tracing::warn!(error = %e, "Provider sign-out failed");
            }
            clear_current_user(session).await?;
            return Ok(GateState::signed_out(Some(e.user_message())));
        }
    };

    // A fresh session id for the new login
    session.cycle_id().await?;
    set_current_user(session, &user).await?;
    set_sentry_user(&user.id, Some(&user.email));
    add_breadcrumb("auth", "Signed in", None);
    tracing::info!(user = %user.id, "Signed in");
    Ok(gate)
}

/// Sign out on the provider, then locally, and send the visitor to the gate.
///
/// # Errors
///
/// Never fails today; the `Result` matches the handlers that call it.
pub async fn end_session(
    state: &AppState,
    session: &Session,
    headers: &HeaderMap,
    user: &CurrentUser,
) -> Result<Response> {
    // Best effort: the local session ends either way
    if let Err(e) = state.identity().sign_out(&user.access_token).await {
        tracing::warn!(error = %e, "Provider sign-out failed");
    }
    sign_out(state, session, user).await;
    clear_sentry_user();
    tracing::info!(user = %user.id, "Signed out");

    if is_htmx(headers) {
        Ok(([("HX-Redirect", "/account")], "").into_response())
    } else {
        Ok(Redirect::to("/account").into_response())
    }
}

/// Answer a login or sign-up submission.
async fn respond(
    state: &AppState,
    session: &Session,
    headers: &HeaderMap,
    outcome: LoginOutcome,
    forms: impl FnOnce(String) -> AuthFormsTemplate,
) -> Result<Response> {
    let html = match outcome {
        LoginOutcome::Status(message) => wrap_gate(&forms(message).render()?),
        LoginOutcome::Authenticated(auth) => match begin_session(state, session, *auth).await? {
            GateState::Unauthenticated {
                status: Some(message),
                ..
            } => wrap_gate(&forms(message).render()?),
            gate => gate_html(state, &gate).await?,
        },
    };
    gate_response(state, session, headers, html).await
}

// =============================================================================
// Password Routes
// =============================================================================

/// Handle the login form.
#[instrument(skip(state, session, headers, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    let outcome = state.gate().log_in(&form.email, form.password).await;
    respond(&state, &session, &headers, outcome, |status| {
        AuthFormsTemplate::new(Some(status), None)
    })
    .await
}

/// Handle the sign-up form.
#[instrument(skip(state, session, headers, form), fields(email = %form.email))]
pub async fn signup(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Form(form): Form<SignupForm>,
) -> Result<Response> {
    let outcome = state
        .gate()
        .sign_up(&form.full_name, &form.email, form.password)
        .await;
    respond(&state, &session, &headers, outcome, |status| {
        AuthFormsTemplate::new(None, Some(status))
    })
    .await
}

/// Handle logout.
#[instrument(skip_all)]
pub async fn logout(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Result<Response> {
    match current_user(&state, &session).await {
        Some(user) => end_session(&state, &session, &headers, &user).await,
        None => Ok(Redirect::to("/account").into_response()),
    }
}

// =============================================================================
// OAuth Routes
// =============================================================================

/// Start OAuth sign-in: remember the PKCE verifier and redirect to the provider.
///
/// # Route
///
/// `GET /auth/oauth/{provider}`
#[instrument(skip(state, session))]
pub async fn oauth(
    State(state): State<AppState>,
    session: Session,
    Path(provider): Path<String>,
) -> Result<Response> {
    let Some(provider) = OAuthProvider::parse(&provider) else {
        return Ok(Redirect::to("/account").into_response());
    };

    let pkce = Pkce::generate();
    session
        .insert(session_keys::OAUTH_VERIFIER, pkce.verifier())
        .await?;

    let url = state
        .identity()
        .authorize_url(provider, &state.config().oauth_callback_url(), &pkce);
    tracing::info!(provider = provider.as_str(), "Redirecting to OAuth provider");
    Ok(Redirect::to(&url).into_response())
}

/// Finish OAuth sign-in.
///
/// # Route
///
/// `GET /auth/callback?code=...`
#[instrument(skip(state, session, headers, query))]
pub async fn callback(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> Result<Response> {
    let verifier = session
        .remove::<String>(session_keys::OAUTH_VERIFIER)
        .await?;

    let status = match (query.code, verifier) {
        (Some(code), Some(verifier)) => {
            match state.identity().exchange_code(&code, &verifier).await {
                Ok(auth) => match begin_session(&state, &session, auth).await? {
                    GateState::Unauthenticated {
                        status: Some(message),
                        ..
                    } => message,
                    _ => return Ok(Redirect::to("/account").into_response()),
                },
                Err(e) => {
                    tracing::warn!(error = %e, "OAuth code exchange failed");
                    e.user_message()
                }
            }
        }
        (Some(_), None) => {
            tracing::warn!("OAuth callback without a pending sign-in");
            "Sign-in expired, please try again.".to_string()
        }
        (None, _) => {
            let message = query
                .error_description
                .or(query.error)
                .unwrap_or_else(|| "Sign-in was cancelled.".to_string());
            tracing::info!(%message, "OAuth sign-in not completed");
            message
        }
    };

    let html = wrap_gate(&AuthFormsTemplate::new(Some(status), None).render()?);
    gate_response(&state, &session, &headers, html).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use tyxar_core::RoleFlags;

    use crate::routes::testing::{PASSWORD, TestApp, get, text};
    use crate::services::ports::fakes::FakeStore;

    const EMAIL: &str = "ada@tyxar.dev";

    fn app() -> TestApp {
        TestApp::new(&[(EMAIL, RoleFlags::default())], FakeStore::default())
    }

    #[tokio::test]
    async fn test_wrong_password_renders_status() {
        let app = app();
        let (response, _) = app.log_in(EMAIL, "not-the-password").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = text(response).await;
        assert!(body.starts_with(r#"<div id="gate">"#));
        assert!(body.contains("Invalid login credentials"));
        assert!(!body.contains(r#"id="profile-content""#));
    }

    #[tokio::test]
    async fn test_login_renders_dashboard_and_keeps_session() {
        let app = app();
        let (response, cookie) = app.log_in(EMAIL, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = text(response).await;
        assert!(body.starts_with(r#"<div id="gate">"#));
        assert!(body.contains(r#"id="profile-content""#));
        assert!(body.contains("Ada Lovelace"));
        assert!(!body.contains(r#"id="login-status""#));

        let account = app.send(get("/account", cookie.as_deref(), true)).await;
        let body = text(account).await;
        assert!(body.contains(r#"id="profile-content""#));
    }

    #[tokio::test]
    async fn test_profile_failure_after_login_shows_forms_with_status() {
        let app = app();
        *app.store.fail_profile_reads.lock().unwrap() = true;

        let (response, cookie) = app.log_in(EMAIL, PASSWORD).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = text(response).await;
        assert!(body.starts_with(r#"<div id="gate">"#));
        assert!(body.contains("Profile service unavailable"));
        assert!(body.contains(r#"name="password""#));
        assert!(!body.contains(r#"id="profile-content""#));

        // No signed-in user was stored
        *app.store.fail_profile_reads.lock().unwrap() = false;
        let account = app.send(get("/account", cookie.as_deref(), true)).await;
        let body = text(account).await;
        assert!(body.contains(r#"name="password""#));
        assert!(!body.contains(r#"id="profile-content""#));
    }
}
