//! Visitor display preferences.
//!
//! Stored as a JSON string under `userPreferences` in the visitor's session,
//! the server-side stand-in for browser local storage.

use serde::{Deserialize, Serialize};
use tower_sessions::Session;

/// Session key holding the JSON string.
pub const SESSION_KEY: &str = "userPreferences";

pub const SAVED_MESSAGE: &str = "Settings saved successfully!";
pub const SAVE_FAILED_MESSAGE: &str = "Error saving settings. Please try again.";
pub const RESET_MESSAGE: &str = "Settings reset to defaults.";
pub const TWO_FACTOR_MESSAGE: &str = "Two-factor authentication enabled successfully!";
pub const PASSWORD_CHANGED_MESSAGE: &str = "Password changed successfully!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    /// Follows the OS colour scheme via CSS media queries.
    #[default]
    Auto,
    Light,
    Dark,
}

impl Theme {
    /// Class put on `<body>`; `auto` adds none.
    #[must_use]
    pub const fn body_class(self) -> &'static str {
        match self {
            Self::Auto => "",
            Self::Light => "light-theme",
            Self::Dark => "dark-theme",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub theme: Theme,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            language: default_language(),
        }
    }
}

impl Preferences {
    /// Parse the stored JSON string; anything unreadable yields defaults.
    #[must_use]
    pub fn from_json(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Ignoring unreadable preferences");
            Self::default()
        })
    }

    /// # Errors
    ///
    /// Returns the session store error.
    pub async fn load(session: &Session) -> Result<Self, tower_sessions::session::Error> {
        Ok(session
            .get::<String>(SESSION_KEY)
            .await?
            .map(|raw| Self::from_json(&raw))
            .unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns the session store error.
    pub async fn save(&self, session: &Session) -> Result<(), tower_sessions::session::Error> {
        let raw = serde_json::to_string(self).map_err(tower_sessions::session::Error::SerdeJson)?;
        session.insert(SESSION_KEY, raw).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_and_broken_json() {
        assert_eq!(Preferences::from_json("{}"), Preferences::default());
        assert_eq!(Preferences::from_json("not json"), Preferences::default());
        assert_eq!(
            Preferences::from_json(r#"{"theme":"dark"}"#),
            Preferences {
                theme: Theme::Dark,
                language: "en".into()
            }
        );
    }

    #[test]
    fn test_stored_shape() {
        let raw = serde_json::to_string(&Preferences {
            theme: Theme::Light,
            language: "de".into(),
        })
        .unwrap();
        assert_eq!(raw, r#"{"theme":"light","language":"de"}"#);
        assert_eq!(Theme::Light.body_class(), "light-theme");
        assert_eq!(Theme::Auto.body_class(), "");
    }
}
