//! Account routes: the session/profile gate and the dashboard sections.
//!
//! `/account` shows the login and sign-up forms or, once signed in, the
//! dashboard. Dashboard sections are swapped into `#profile-content` by the
//! profile sidebar.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    http::HeaderMap,
    response::{Html, IntoResponse, Redirect, Response},
};
use secrecy::SecretString;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;
use uuid::Uuid;

use tyxar_core::Role;

use crate::error::Result;
use crate::fragments::{
    Chrome, Document, FailurePolicy, PROFILE_SIDEBAR_PATH, bind_text, containers, load_chrome,
    load_into,
};
use crate::middleware::{RequireAuth, current_user, sign_out};
use crate::models::CurrentUser;
use crate::navigation::{ContentRouter, ProfileSection, SectionLink};
use crate::services::gate::{Dashboard, GateState};
use crate::services::preferences::{
    PASSWORD_CHANGED_MESSAGE, Preferences, RESET_MESSAGE, SAVE_FAILED_MESSAGE, SAVED_MESSAGE,
    TWO_FACTOR_MESSAGE, Theme,
};
use crate::services::validation;
use crate::state::AppState;
use crate::supabase::{AuthUser, ProfileSettings};

use super::is_htmx;
use super::pages::PageTemplate;

/// A status line under a form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub is_error: bool,
}

impl Notice {
    #[must_use]
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: false,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            is_error: true,
        }
    }
}

/// Login and sign-up forms.
#[derive(Template)]
#[template(path = "account/forms.html")]
pub struct AuthFormsTemplate {
    pub login_status: Option<String>,
    pub signup_status: Option<String>,
    pub providers: [(&'static str, &'static str); 2],
}

impl AuthFormsTemplate {
    #[must_use]
    pub const fn new(login_status: Option<String>, signup_status: Option<String>) -> Self {
        Self {
            login_status,
            signup_status,
            providers: [("github", "GitHub"), ("google", "Google")],
        }
    }
}

/// The authenticated dashboard.
#[derive(Template)]
#[template(path = "account/dashboard.html")]
pub struct DashboardTemplate {
    pub display_name: String,
    pub email: String,
    pub headline: &'static str,
    pub role_names: String,
    pub member_since: String,
    pub sidebar: String,
    pub section: String,
    pub admin: Option<String>,
}

/// Settings section.
#[derive(Template, WebTemplate)]
#[template(path = "account/settings.html")]
pub struct SettingsTemplate {
    pub settings: ProfileSettings,
    pub theme: Theme,
    pub themes: [Theme; 3],
    pub language: String,
    pub notice: Option<Notice>,
}

impl SettingsTemplate {
    fn new(settings: ProfileSettings, preferences: Preferences, notice: Option<Notice>) -> Self {
        Self {
            settings,
            theme: preferences.theme,
            themes: [Theme::Auto, Theme::Light, Theme::Dark],
            language: preferences.language,
            notice,
        }
    }
}

/// Security section.
#[derive(Template, WebTemplate)]
#[template(path = "account/security.html")]
pub struct SecurityTemplate {
    pub password_changed: String,
    pub session_started: String,
    pub password_notice: Option<Notice>,
    pub code_notice: Option<Notice>,
}

impl SecurityTemplate {
    fn new(user: &AuthUser) -> Self {
        Self {
            password_changed: user
                .password_last_changed()
                .unwrap_or("Never")
                .to_string(),
            session_started: user.session_started().format("%-m/%-d/%Y %H:%M").to_string(),
            password_notice: None,
            code_notice: None,
        }
    }
}

/// Values the static section fragments bind with `data-bind`.
fn bind_values(user: &AuthUser, display_name: &str, roles: &[Role]) -> Vec<(&'static str, String)> {
    let headline = if roles.contains(&Role::Admin) { "Admin" } else { "User" };
    vec![
        ("displayName", display_name.to_string()),
        ("email", user.email_or_empty().to_string()),
        ("headline", headline.to_string()),
        (
            "roles",
            roles.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", "),
        ),
        ("memberSince", user.created_at.format("%-m/%-d/%Y").to_string()),
        (
            "lastSignIn",
            user.last_sign_in_at
                .map_or_else(|| "Never".to_string(), |t| t.format("%-m/%-d/%Y").to_string()),
        ),
    ]
}

/// Load a static section fragment and fill in the user's details.
async fn static_section(
    state: &AppState,
    section: ProfileSection,
    values: &[(&'static str, String)],
) -> String {
    let mut document = Document::with_containers(&[containers::CONTENT]);
    ContentRouter::new(state.fragments())
        .load_section(&mut document, section)
        .await;
    let pairs: Vec<(&str, &str)> = values.iter().map(|(k, v)| (*k, v.as_str())).collect();
    bind_text(document.markup(containers::CONTENT), &pairs)
}

/// Markup for one dashboard section.
async fn section_html(
    state: &AppState,
    session: &Session,
    user: &CurrentUser,
    section: ProfileSection,
) -> Result<String> {
    match section {
        ProfileSection::Overview | ProfileSection::Account | ProfileSection::Activity => {
            let auth_user = state.identity().get_user(&user.access_token).await?;
            let roles = state
                .roles()
                .get(user.id)
                .await
                .map(|r| r.to_vec())
                .unwrap_or_default();
            let values = bind_values(&auth_user, &user.display_name, &roles);
            Ok(static_section(state, section, &values).await)
        }
        ProfileSection::Settings => {
            let settings = load_settings(state, user).await?;
            let preferences = Preferences::load(session).await?;
            Ok(SettingsTemplate::new(settings, preferences, None).render()?)
        }
        ProfileSection::Security => {
            let auth_user = state.identity().get_user(&user.access_token).await?;
            Ok(SecurityTemplate::new(&auth_user).render()?)
        }
        ProfileSection::Projects => {
            super::projects::board_html(session, &super::projects::BoardQuery::default(), None).await
        }
    }
}

async fn load_settings(state: &AppState, user: &CurrentUser) -> Result<ProfileSettings> {
    let profile = state
        .store()
        .fetch_profile(&user.access_token, user.id)
        .await?;
    Ok(profile.map_or_else(
        || ProfileSettings {
            display_name: user.display_name.clone(),
            ..ProfileSettings::default()
        },
        |p| ProfileSettings {
            display_name: p.name().to_string(),
            bio: p.bio.unwrap_or_default(),
            website: p.website.unwrap_or_default(),
        },
    ))
}

/// Render the dashboard for an authenticated gate state.
async fn dashboard_html(state: &AppState, dashboard: &Dashboard) -> Result<String> {
    let mut document = Document::with_containers(&[containers::SIDEBAR]);
    let _ = load_into(
        state.fragments(),
        &mut document,
        PROFILE_SIDEBAR_PATH,
        containers::SIDEBAR,
        FailurePolicy::KeepExisting,
    )
    .await;

    let values = bind_values(&dashboard.user, &dashboard.display_name, &dashboard.roles);
    let section = static_section(state, ProfileSection::Overview, &values).await;

    let admin = match &dashboard.admin {
        Some(snapshot) => Some(super::admin::panel_html(snapshot, None)?),
        None => None,
    };

    Ok(DashboardTemplate {
        display_name: dashboard.display_name.clone(),
        email: dashboard.user.email_or_empty().to_string(),
        headline: dashboard.headline(),
        role_names: dashboard.role_names(),
        member_since: dashboard.member_since(),
        sidebar: document.markup(containers::SIDEBAR).to_string(),
        section,
        admin,
    }
    .render()?)
}

/// Markup of the `#gate` element for a gate state.
///
/// # Errors
///
/// Returns an error if a template fails to render.
pub async fn gate_html(state: &AppState, gate: &GateState) -> Result<String> {
    let inner = match gate {
        GateState::Unauthenticated { status, .. } => {
            AuthFormsTemplate::new(status.clone(), None).render()?
        }
        GateState::Authenticated(dashboard) => dashboard_html(state, dashboard).await?,
    };
    Ok(wrap_gate(&inner))
}

/// Wrap markup in the element login/sign-up responses replace.
#[must_use]
pub fn wrap_gate(inner: &str) -> String {
    format!(r#"<div id="gate">{inner}</div>"#)
}

/// Respond with the gate: bare for HTMX, inside the site shell otherwise.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn gate_response(
    state: &AppState,
    session: &Session,
    headers: &HeaderMap,
    gate: String,
) -> Result<Response> {
    if is_htmx(headers) {
        return Ok(Html(gate).into_response());
    }

    let preferences = Preferences::load(session).await?;
    let mut document =
        Document::with_containers(&[containers::HEADER, containers::FOOTER, containers::CONTENT]);
    load_chrome(state.fragments(), &mut document, Chrome::Site).await;
    document.set(containers::CONTENT, gate);
    Ok(PageTemplate::from_document("Account - Tyxar", &document, &preferences).into_response())
}

/// Current gate state; a stored session the provider rejects is dropped.
async fn resolve(state: &AppState, session: &Session, user: Option<&CurrentUser>) -> Result<GateState> {
    let view = user.map_or_else(Uuid::new_v4, |u| u.view_key);
    let gate = state
        .gate()
        .resolve(user.map(|u| &u.access_token), view)
        .await?;

    if let (Some(user), GateState::Unauthenticated { .. }) = (user, &gate) {
        sign_out(state, session, user).await;
    }
    Ok(gate)
}

/// Gate page: login forms or dashboard.
#[instrument(skip(state, session, headers))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
) -> Result<Response> {
    let user = current_user(&state, &session).await;
    let gate = resolve(&state, &session, user.as_ref()).await?;
    let html = gate_html(&state, &gate).await?;
    gate_response(&state, &session, &headers, html).await
}

/// One dashboard section (HTMX). `logout` signs out instead.
#[instrument(skip(state, session, headers, user))]
pub async fn section(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    RequireAuth(user): RequireAuth,
    Path(name): Path<String>,
) -> Result<Response> {
    match ProfileSection::link(&name) {
        SectionLink::Logout => super::auth::end_session(&state, &session, &headers, &user).await,
        SectionLink::Show(section) => {
            if !is_htmx(&headers) {
                return Ok(Redirect::to("/account").into_response());
            }
            let html = section_html(&state, &session, &user, section).await?;
            Ok(Html(html).into_response())
        }
    }
}

/// Settings form.
#[derive(Debug, Deserialize)]
pub struct SettingsForm {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub language: Option<String>,
}

/// Save profile fields remotely and display preferences in the session.
#[instrument(skip(state, session, user, form))]
pub async fn save_settings(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    Form(form): Form<SettingsForm>,
) -> Result<impl IntoResponse> {
    let settings = ProfileSettings {
        display_name: form.display_name.trim().to_string(),
        bio: form.bio.trim().to_string(),
        website: form.website.trim().to_string(),
    };
    let preferences = Preferences {
        theme: form.theme,
        language: form
            .language
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| Preferences::default().language),
    };

    let remote = state
        .store()
        .save_settings(&user.access_token, user.id, &settings)
        .await;
    let local = preferences.save(&session).await;

    let notice = match (remote, local) {
        (Ok(()), Ok(())) => Notice::ok(SAVED_MESSAGE),
        (Err(e), _) => {
            tracing::error!(error = %e, "Failed to save profile settings");
            Notice::error(SAVE_FAILED_MESSAGE)
        }
        (_, Err(e)) => {
            tracing::error!(error = %e, "Failed to save preferences");
            Notice::error(SAVE_FAILED_MESSAGE)
        }
    };

    Ok(SettingsTemplate::new(settings, preferences, Some(notice)))
}

/// Show default settings again. Nothing is persisted.
#[instrument(skip(user))]
pub async fn reset_settings(RequireAuth(user): RequireAuth) -> impl IntoResponse {
    SettingsTemplate::new(
        ProfileSettings {
            display_name: user.display_name,
            ..ProfileSettings::default()
        },
        Preferences::default(),
        Some(Notice::ok(RESET_MESSAGE)),
    )
}

/// Change-password form.
#[derive(Deserialize)]
pub struct PasswordForm {
    #[serde(default)]
    pub new_password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// Change the password through the provider.
#[instrument(skip(state, user, form))]
pub async fn change_password(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<PasswordForm>,
) -> Result<impl IntoResponse> {
    let password = SecretString::from(form.new_password);
    let confirm = SecretString::from(form.confirm_password);
    let notice = match validation::new_password(&password, &confirm) {
        Err(e) => Notice::error(e.to_string()),
        Ok(()) => match state
            .identity()
            .update_password(&user.access_token, &password)
            .await
        {
            Ok(_) => Notice::ok(PASSWORD_CHANGED_MESSAGE),
            Err(e) => {
                tracing::warn!(error = %e, "Password change rejected");
                Notice::error(e.user_message())
            }
        },
    };

    let auth_user = state.identity().get_user(&user.access_token).await?;
    Ok(SecurityTemplate {
        password_notice: Some(notice),
        ..SecurityTemplate::new(&auth_user)
    })
}

/// Two-factor setup form.
#[derive(Debug, Deserialize)]
pub struct TwoFactorForm {
    #[serde(default)]
    pub code: String,
}

/// Confirm a two-factor code. Only the code format is checked.
#[instrument(skip(state, user, form))]
pub async fn enable_two_factor(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    Form(form): Form<TwoFactorForm>,
) -> Result<impl IntoResponse> {
    let notice = match validation::one_time_code(form.code.trim()) {
        Ok(()) => Notice::ok(TWO_FACTOR_MESSAGE),
        Err(e) => Notice::error(e.to_string()),
    };

    let auth_user = state.identity().get_user(&user.access_token).await?;
    Ok(SecurityTemplate {
        code_notice: Some(notice),
        ..SecurityTemplate::new(&auth_user)
    })
}
