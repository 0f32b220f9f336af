//! Auth endpoints (`/auth/v1`).
//!
//! Password sign-up/sign-in, OAuth with PKCE, token refresh, user lookup and
//! update, sign-out.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use tracing::instrument;

use tyxar_core::{Email, UserId};

use super::{SupabaseClient, SupabaseError, api_error};

/// Display name used when the user metadata carries none.
pub const FALLBACK_DISPLAY_NAME: &str = "User";

/// User record returned by the auth provider.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl AuthUser {
    /// Name shown in the dashboard: `full_name`, then `user_name`, then
    /// `name`, then "User".
    #[must_use]
    pub fn display_name(&self) -> String {
        ["full_name", "user_name", "name"]
            .iter()
            .find_map(|key| {
                self.user_metadata
                    .get(*key)
                    .and_then(Value::as_str)
                    .filter(|v| !v.is_empty())
            })
            .unwrap_or(FALLBACK_DISPLAY_NAME)
            .to_string()
    }

    /// Email or an empty string for accounts without one (some OAuth users).
    #[must_use]
    pub fn email_or_empty(&self) -> &str {
        self.email.as_deref().unwrap_or_default()
    }

    /// `password_last_changed` from metadata, if the account recorded one.
    #[must_use]
    pub fn password_last_changed(&self) -> Option<&str> {
        self.user_metadata
            .get("password_last_changed")
            .and_then(Value::as_str)
    }

    /// Start of the current session: last sign-in, else account creation.
    #[must_use]
    pub fn session_started(&self) -> DateTime<Utc> {
        self.last_sign_in_at.unwrap_or(self.created_at)
    }
}

/// Token pair issued on sign-in, OAuth completion or refresh.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSession {
    #[serde(with = "crate::models::session::secret_string")]
    pub access_token: SecretString,
    #[serde(with = "crate::models::session::secret_string")]
    pub refresh_token: SecretString,
    #[serde(default)]
    pub expires_in: i64,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: AuthUser,
}

impl AuthSession {
    /// Absolute expiry, preferring the provider's timestamp.
    #[must_use]
    pub fn expires_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .unwrap_or_else(|| now + chrono::Duration::seconds(self.expires_in))
    }
}

/// Result of a sign-up call.
#[derive(Debug)]
pub enum SignUpOutcome {
    /// Email confirmation is disabled; the user is signed in immediately.
    Session(Box<AuthSession>),
    /// Account created, confirmation email sent.
    ConfirmationSent(AuthUser),
}

/// OAuth providers enabled for the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    GitHub,
    Google,
}

impl OAuthProvider {
    /// Provider id used in the authorize URL.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GitHub => "github",
            Self::Google => "google",
        }
    }

    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::GitHub => "GitHub",
            Self::Google => "Google",
        }
    }

    /// Parse a provider id from the route.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "github" => Some(Self::GitHub),
            "google" => Some(Self::Google),
            _ => None,
        }
    }
}

/// PKCE verifier/challenge pair (RFC 7636, S256).
pub struct Pkce {
    verifier: String,
    challenge: String,
}

impl Pkce {
    /// Generate a fresh verifier from 32 random bytes.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Derive the challenge for a known verifier.
    #[must_use]
    pub fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }

    #[must_use]
    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    #[must_use]
    pub fn challenge(&self) -> &str {
        &self.challenge
    }
}

/// Sign-up response: either a full session or just the new user.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session(Box<AuthSession>),
    User(AuthUser),
}

impl SupabaseClient {
    /// Register a new account with a full name in its metadata.
    ///
    /// # Errors
    ///
    /// Returns `Api` with the provider's message (e.g. "User already registered").
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        full_name: &str,
    ) -> Result<SignUpOutcome, SupabaseError> {
        let body = json!({
            "email": email.as_str(),
            "password": password.expose_secret(),
            "data": { "full_name": full_name },
        });

        let response = self
            .http()
            .post(self.auth_url("signup"))
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let parsed: SignUpResponse = response
            .json()
            .await
            .map_err(|e| SupabaseError::Parse(e.to_string()))?;
        Ok(match parsed {
            SignUpResponse::Session(session) => SignUpOutcome::Session(session),
            SignUpResponse::User(user) => SignUpOutcome::ConfirmationSent(user),
        })
    }

    /// Sign in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `Api` with the provider's message (e.g. "Invalid login credentials").
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn sign_in_with_password(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, SupabaseError> {
        self.token_grant(
            "password",
            &json!({ "email": email.as_str(), "password": password.expose_secret() }),
        )
        .await
    }

    /// Exchange an OAuth authorization code for a session.
    ///
    /// # Errors
    ///
    /// Returns `Api` if the code or verifier is rejected.
    #[instrument(skip_all)]
    pub async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<AuthSession, SupabaseError> {
        self.token_grant(
            "pkce",
            &json!({ "auth_code": auth_code, "code_verifier": code_verifier }),
        )
        .await
    }

    /// Trade a refresh token for a new session.
    ///
    /// # Errors
    ///
    /// Returns `Api` if the refresh token was revoked or already used.
    #[instrument(skip_all)]
    pub async fn refresh_session(
        &self,
        refresh_token: &SecretString,
    ) -> Result<AuthSession, SupabaseError> {
        self.token_grant(
            "refresh_token",
            &json!({ "refresh_token": refresh_token.expose_secret() }),
        )
        .await
    }

    async fn token_grant(&self, grant: &str, body: &Value) -> Result<AuthSession, SupabaseError> {
        let response = self
            .http()
            .post(self.auth_url("token"))
            .query(&[("grant_type", grant)])
            .json(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| SupabaseError::Parse(e.to_string()))
    }

    /// URL the browser is sent to for OAuth sign-in.
    #[must_use]
    pub fn authorize_url(&self, provider: OAuthProvider, redirect_to: &str, pkce: &Pkce) -> String {
        format!(
            "{}?provider={}&redirect_to={}&code_challenge={}&code_challenge_method=s256",
            self.auth_url("authorize"),
            provider.as_str(),
            urlencoding::encode(redirect_to),
            pkce.challenge(),
        )
    }

    /// Fetch the user behind an access token.
    ///
    /// # Errors
    ///
    /// Returns `Api` with status 401/403 if the token is invalid or expired.
    #[instrument(skip_all)]
    pub async fn get_user(&self, access_token: &SecretString) -> Result<AuthUser, SupabaseError> {
        let response = self
            .http()
            .get(self.auth_url("user"))
            .bearer_auth(access_token.expose_secret())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| SupabaseError::Parse(e.to_string()))
    }

    /// Update the signed-in user (password and/or metadata).
    ///
    /// # Errors
    ///
    /// Returns `Api` if the provider rejects the change (e.g. weak password).
    #[instrument(skip_all)]
    pub async fn update_user(
        &self,
        access_token: &SecretString,
        body: &Value,
    ) -> Result<AuthUser, SupabaseError> {
        let response = self
            .http()
            .put(self.auth_url("user"))
            .bearer_auth(access_token.expose_secret())
            .json(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| SupabaseError::Parse(e.to_string()))
    }

    /// Revoke the session's refresh tokens.
    ///
    /// # Errors
    ///
    /// Returns error on transport failure or a non-success status.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, access_token: &SecretString) -> Result<(), SupabaseError> {
        let response = self
            .http()
            .post(self.auth_url("logout"))
            .bearer_auth(access_token.expose_secret())
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn user_with(metadata: Value) -> AuthUser {
        serde_json::from_value(json!({
            "id": "0b5f9a52-3a39-4d8c-9a3e-0f1f2b3c4d5e",
            "email": "ada@tyxar.dev",
            "created_at": "2024-01-01T10:00:00Z",
            "user_metadata": metadata,
        }))
        .unwrap()
    }

    #[test]
    fn test_display_name_fallback_chain() {
        assert_eq!(
            user_with(json!({"full_name": "Ada", "name": "ignored"})).display_name(),
            "Ada"
        );
        assert_eq!(user_with(json!({"user_name": "ada-l"})).display_name(), "ada-l");
        assert_eq!(user_with(json!({"name": "A. L."})).display_name(), "A. L.");
        assert_eq!(user_with(json!({})).display_name(), "User");
        assert_eq!(user_with(json!({"full_name": ""})).display_name(), "User");
    }

    #[test]
    fn test_session_started_prefers_last_sign_in() {
        let mut user = user_with(json!({}));
        assert_eq!(user.session_started(), user.created_at);
        let later = "2024-02-01T08:00:00Z".parse().unwrap();
        user.last_sign_in_at = Some(later);
        assert_eq!(user.session_started(), later);
    }

    #[test]
    fn test_sign_up_response_shapes() {
        let user_only: SignUpResponse = serde_json::from_value(json!({
            "id": "0b5f9a52-3a39-4d8c-9a3e-0f1f2b3c4d5e",
            "created_at": "2024-01-01T10:00:00Z",
        }))
        .unwrap();
        assert!(matches!(user_only, SignUpResponse::User(_)));

        let with_session: SignUpResponse = serde_json::from_value(json!({
            "access_token": "a",
            "refresh_token": "r",
            "expires_in": 3600,
            "user": {
                "id": "0b5f9a52-3a39-4d8c-9a3e-0f1f2b3c4d5e",
                "created_at": "2024-01-01T10:00:00Z",
            }
        }))
        .unwrap();
        assert!(matches!(with_session, SignUpResponse::Session(_)));
    }

    #[test]
    fn test_pkce_s256_known_vector() {
        // RFC 7636 appendix B
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string());
        assert_eq!(pkce.challenge(), "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");

        let fresh = Pkce::generate();
        assert_eq!(fresh.verifier().len(), 43);
    }

    #[test]
    fn test_oauth_provider_parse() {
        assert_eq!(OAuthProvider::parse("github"), Some(OAuthProvider::GitHub));
        assert_eq!(OAuthProvider::parse("google").unwrap().label(), "Google");
        assert_eq!(OAuthProvider::parse("gitlab"), None);
    }
}
