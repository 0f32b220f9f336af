//! Display preferences API handlers.
//!
//! The site script reads these on load to apply the theme before HTMX swaps
//! begin, and writes them when the theme toggle is used.

use axum::{Json, Router, routing::get};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;

use crate::error::Result;
use crate::services::preferences::{Preferences, Theme};
use crate::state::AppState;

/// Build the preferences router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/preferences", get(get_preferences).post(save_preferences))
}

/// Partial update; omitted fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
pub struct PreferencesRequest {
    pub theme: Option<Theme>,
    pub language: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PreferencesResponse {
    pub success: bool,
    pub preferences: Preferences,
}

/// Current preferences, defaults when none are stored.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn get_preferences(session: Session) -> Result<Json<Preferences>> {
    Ok(Json(Preferences::load(&session).await?))
}

/// Merge and store preferences.
///
/// # Errors
///
/// Returns an error if the session cannot be read or written.
pub async fn save_preferences(
    session: Session,
    Json(body): Json<PreferencesRequest>,
) -> Result<Json<PreferencesResponse>> {
    let mut preferences = Preferences::load(&session).await?;
    if let Some(theme) = body.theme {
        preferences.theme = theme;
    }
    if let Some(language) = body.language.filter(|l| !l.trim().is_empty()) {
        preferences.language = language.trim().to_string();
    }
    preferences.save(&session).await?;
    tracing::debug!(theme = preferences.theme.as_str(), "Preferences saved");

    Ok(Json(PreferencesResponse {
        success: true,
        preferences,
    }))
}
