//! Hosted backend client (auth + row tables).
//!
//! Talks to a Supabase-style project over HTTP:
//! - `auth`: `GoTrue` endpoints under `/auth/v1` (sign-up, sign-in, OAuth PKCE, refresh, user)
//! - `rest`: `PostgREST` table endpoints under `/rest/v1` (select, insert, update, upsert, delete)
//! - `tables`: typed rows for `profiles` and `role_requests`

pub mod auth;
pub mod rest;
pub mod tables;

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use crate::config::SupabaseConfig;

pub use auth::{AuthSession, AuthUser, OAuthProvider, Pkce, SignUpOutcome};
pub use rest::TableQuery;
pub use tables::{NewProfile, ProfileRow, ProfileSettings, RoleRequest};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors returned by the hosted backend client.
#[derive(Debug, Error)]
pub enum SupabaseError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response body did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configured key cannot be sent as a header.
    #[error("Invalid API key: {0}")]
    InvalidKey(String),
}

impl SupabaseError {
    /// Text suitable for a status field or error banner.
    ///
    /// Provider errors are shown verbatim; transport failures get a generic line.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            Self::Http(_) => "Could not reach the authentication service.".to_string(),
            Self::Parse(_) | Self::InvalidKey(_) => "Unexpected response from the server.".to_string(),
        }
    }

    /// HTTP status of a provider error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Error body shapes used by the auth and table APIs.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    error: Option<String>,
}

/// Pull the human-readable message out of an error response body.
pub(crate) fn provider_message(body: &str) -> String {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .msg
        .or(parsed.error_description)
        .or(parsed.message)
        .or(parsed.error)
        .unwrap_or_else(|| body.trim().to_string())
}

/// Convert a non-success response into `SupabaseError::Api`.
pub(crate) async fn api_error(response: reqwest::Response) -> SupabaseError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    SupabaseError::Api {
        status,
        message: provider_message(&body),
    }
}

/// HTTP client for one hosted project.
///
/// Every request carries the project key as `apikey`. Calls made on behalf of
/// a signed-in user pass that user's access token as the bearer; otherwise the
/// project key is used.
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl SupabaseClient {
    /// Create a client using the public anon key.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &SupabaseConfig) -> Result<Self, SupabaseError> {
        Self::with_key(&config.url, config.anon_key.clone())
    }

    /// Create a client using the service-role key (operator tooling only).
    ///
    /// # Errors
    ///
    /// Returns `InvalidKey` if no service-role key is configured.
    pub fn service(config: &SupabaseConfig) -> Result<Self, SupabaseError> {
        let key = config
            .service_role_key
            .clone()
            .ok_or_else(|| SupabaseError::InvalidKey("SUPABASE_SERVICE_ROLE_KEY not set".into()))?;
        Self::with_key(&config.url, key)
    }

    fn with_key(base_url: &str, api_key: SecretString) -> Result<Self, SupabaseError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(api_key.expose_secret())
                .map_err(|e| SupabaseError::InvalidKey(e.to_string()))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Project key, used as the bearer when no user token is supplied.
    #[must_use]
    pub const fn api_key(&self) -> &SecretString {
        &self.api_key
    }

    /// Start a query against a table.
    #[must_use]
    pub fn from<'a>(&'a self, table: &'a str) -> TableQuery<'a> {
        TableQuery::new(self, table)
    }

    pub(crate) fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    pub(crate) fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    pub(crate) const fn http(&self) -> &reqwest::Client {
        &self.http
    }
}
