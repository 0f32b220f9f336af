//! Session-related types.
//!
//! Types stored in the visitor's server-side session.

use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use uuid::Uuid;

use tyxar_core::UserId;

use crate::supabase::AuthSession;

/// Refresh the access token once it is this close to expiry.
pub const REFRESH_MARGIN: Duration = Duration::seconds(60);

/// Session-stored login.
///
/// Holds the provider's token pair so handlers can act as the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    pub email: String,
    pub display_name: String,
    #[serde(with = "secret_string")]
    pub access_token: SecretString,
    #[serde(with = "secret_string")]
    pub refresh_token: SecretString,
    pub expires_at: DateTime<Utc>,
    /// Key of this login's admin view; a new login opens a new view.
    pub view_key: Uuid,
}

impl CurrentUser {
    /// Login record for a fresh session.
    #[must_use]
    pub fn from_session(session: &AuthSession, now: DateTime<Utc>) -> Self {
        Self {
            id: session.user.id,
            email: session.user.email_or_empty().to_string(),
            display_name: session.user.display_name(),
            access_token: session.access_token.clone(),
            refresh_token: session.refresh_token.clone(),
            expires_at: session.expires_at(now),
            view_key: Uuid::new_v4(),
        }
    }

    /// Same login with a renewed token pair.
    #[must_use]
    pub fn refreshed(&self, session: &AuthSession, now: DateTime<Utc>) -> Self {
        Self {
            view_key: self.view_key,
            ..Self::from_session(session, now)
        }
    }

    #[must_use]
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now <= REFRESH_MARGIN
    }
}

/// Session keys.
pub mod keys {
    /// Key for storing the current logged-in user.
    pub const CURRENT_USER: &str = "current_user";

    /// Key for the PKCE verifier of an OAuth sign-in in flight.
    pub const OAUTH_VERIFIER: &str = "oauth_verifier";

    /// Key for the anonymous per-visitor id (search debounce).
    pub const VISITOR_KEY: &str = "visitor_key";
}

/// Anonymous id for this visitor, created on first use.
///
/// # Errors
///
/// Returns the session store error.
pub async fn visitor_key(session: &Session) -> Result<Uuid, tower_sessions::session::Error> {
    if let Some(key) = session.get::<Uuid>(keys::VISITOR_KEY).await? {
        return Ok(key);
    }
    let key = Uuid::new_v4();
    session.insert(keys::VISITOR_KEY, key).await?;
    Ok(key)
}

/// Serde for `SecretString` fields that must round-trip through storage.
pub mod secret_string {
    use secrecy::{ExposeSecret, SecretString};
    use serde::{Deserialize, Deserializer, Serializer};

    /// # Errors
    ///
    /// Propagates the serializer's error.
    pub fn serialize<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(secret.expose_secret())
    }

    /// # Errors
    ///
    /// Fails when the value is not a string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
        String::deserialize(deserializer).map(SecretString::from)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use secrecy::ExposeSecret;

    use super::*;
    use crate::services::ports::fakes::{session_for, user};

    #[test]
    fn test_tokens_survive_storage() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let auth = session_for(user(UserId::new(Uuid::new_v4()), "ada@tyxar.dev", Some("Ada")));
        let current = CurrentUser::from_session(&auth, now);

        let json = serde_json::to_string(&current).unwrap();
        let back: CurrentUser = serde_json::from_str(&json).unwrap();
        assert_eq!(back.access_token.expose_secret(), auth.access_token.expose_secret());
        assert_eq!(back.refresh_token.expose_secret(), auth.refresh_token.expose_secret());
        assert_eq!(back.display_name, "Ada");
        assert_eq!(back.expires_at, now + Duration::hours(1));
    }

    #[test]
    fn test_refresh_window_keeps_view() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let auth = session_for(user(UserId::new(Uuid::new_v4()), "ada@tyxar.dev", None));
        let current = CurrentUser::from_session(&auth, now);

        assert!(!current.needs_refresh(now));
        assert!(current.needs_refresh(now + Duration::minutes(59)));

        let renewed = current.refreshed(&auth, now + Duration::minutes(59));
        assert_eq!(renewed.view_key, current.view_key);
        assert!(!renewed.needs_refresh(now + Duration::minutes(59)));
    }
}
