//! Table endpoints (`/rest/v1/{table}`).
//!
//! A small builder over the `PostgREST` query-string dialect:
//!
//! ```rust,ignore
//! let rows: Vec<ProfileRow> = client
//!     .from("profiles")
//!     .bearer(&token)
//!     .select("*")
//!     .order("created_at", false)
//!     .range(0, 49)
//!     .fetch()
//!     .await?;
//! ```

use std::fmt::Display;

use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{SupabaseClient, SupabaseError, api_error, provider_message};

/// Accept header asking for exactly one row as a bare object.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Pending request against one table.
pub struct TableQuery<'a> {
    client: &'a SupabaseClient,
    table: &'a str,
    params: Vec<(String, String)>,
    bearer: Option<&'a SecretString>,
}

impl<'a> TableQuery<'a> {
    pub(crate) const fn new(client: &'a SupabaseClient, table: &'a str) -> Self {
        Self {
            client,
            table,
            params: Vec::new(),
            bearer: None,
        }
    }

    /// Run the request as the given user (row-level security applies).
    #[must_use]
    pub fn bearer(mut self, token: &'a SecretString) -> Self {
        self.bearer = Some(token);
        self
    }

    /// Columns to return.
    #[must_use]
    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".into(), columns.into()));
        self
    }

    /// Filter `column = value`.
    #[must_use]
    pub fn eq(mut self, column: &str, value: impl Display) -> Self {
        self.params.push((column.into(), format!("eq.{value}")));
        self
    }

    /// Order by a column.
    #[must_use]
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .push(("order".into(), format!("{column}.{direction}")));
        self
    }

    /// Inclusive row range, as `offset`/`limit`.
    #[must_use]
    pub fn range(mut self, from: usize, to: usize) -> Self {
        self.params.push(("offset".into(), from.to_string()));
        self.params
            .push(("limit".into(), (to.saturating_sub(from) + 1).to_string()));
        self
    }

    /// Maximum number of rows.
    #[must_use]
    pub fn limit(mut self, count: usize) -> Self {
        self.params.push(("limit".into(), count.to_string()));
        self
    }

    /// Query-string pairs accumulated so far.
    #[must_use]
    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    fn request(&self, method: Method) -> RequestBuilder {
        let token = self.bearer.unwrap_or_else(|| self.client.api_key());
        self.client
            .http()
            .request(method, self.client.rest_url(self.table))
            .query(&self.params)
            .bearer_auth(token.expose_secret())
    }

    /// Fetch all matching rows.
    ///
    /// # Errors
    ///
    /// Returns `Api` on a non-success status, `Parse` if rows don't match `T`.
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>, SupabaseError> {
        let response = self.request(Method::GET).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        response
            .json()
            .await
            .map_err(|e| SupabaseError::Parse(e.to_string()))
    }

    /// Fetch exactly one row. Zero rows yields `None`.
    ///
    /// More than one row is reported as an `Api` error by the server.
    ///
    /// # Errors
    ///
    /// Returns `Api` on a non-success status other than "no rows".
    pub async fn single<T: DeserializeOwned>(self) -> Result<Option<T>, SupabaseError> {
        let response = self
            .request(Method::GET)
            .header(reqwest::header::ACCEPT, SINGLE_OBJECT)
            .send()
            .await?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_ACCEPTABLE {
            let body = response.text().await.unwrap_or_default();
            // PGRST116 with "The result contains 0 rows"
            if body.contains("contains 0 rows") {
                return Ok(None);
            }
            return Err(SupabaseError::Api {
                status: status.as_u16(),
                message: provider_message(&body),
            });
        }
        if !status.is_success() {
            return Err(api_error(response).await);
        }
        response
            .json()
            .await
            .map(Some)
            .map_err(|e| SupabaseError::Parse(e.to_string()))
    }

    /// Insert one row.
    ///
    /// # Errors
    ///
    /// Returns `Api` on a non-success status (e.g. duplicate key).
    pub async fn insert<B: Serialize + Sync>(self, row: &B) -> Result<(), SupabaseError> {
        let response = self
            .request(Method::POST)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;
        ensure_success(response).await
    }

    /// Insert or merge on primary key.
    ///
    /// # Errors
    ///
    /// Returns `Api` on a non-success status.
    pub async fn upsert<B: Serialize + Sync>(self, row: &B) -> Result<(), SupabaseError> {
        let response = self
            .request(Method::POST)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row)
            .send()
            .await?;
        ensure_success(response).await
    }

    /// Update matching rows with the given columns.
    ///
    /// # Errors
    ///
    /// Returns `Api` on a non-success status.
    pub async fn update<B: Serialize + Sync>(self, changes: &B) -> Result<(), SupabaseError> {
        let response = self
            .request(Method::PATCH)
            .header("Prefer", "return=minimal")
            .json(changes)
            .send()
            .await?;
        ensure_success(response).await
    }

    /// Delete matching rows.
    ///
    /// # Errors
    ///
    /// Returns `Api` on a non-success status.
    pub async fn delete(self) -> Result<(), SupabaseError> {
        let response = self.request(Method::DELETE).send().await?;
        ensure_success(response).await
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<(), SupabaseError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(api_error(response).await)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::config::SupabaseConfig;

    use super::*;

    fn client() -> SupabaseClient {
        SupabaseClient::new(&SupabaseConfig {
            url: "https://demo.supabase.co".to_string(),
            anon_key: SecretString::from("anon"),
            service_role_key: None,
        })
        .unwrap()
    }

    fn pairs<'q>(query: &'q TableQuery<'_>) -> Vec<(&'q str, &'q str)> {
        query
            .params()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    #[test]
    fn test_paged_select_params() {
        let client = client();
        let query = client
            .from("profiles")
            .select("*")
            .order("created_at", false)
            .range(50, 99);
        assert_eq!(
            pairs(&query),
            [
                ("select", "*"),
                ("order", "created_at.desc"),
                ("offset", "50"),
                ("limit", "50"),
            ]
        );
    }

    #[test]
    fn test_filter_params() {
        let client = client();
        let query = client
            .from("role_requests")
            .select("id,user_id,role,status,created_at")
            .eq("status", "pending")
            .limit(100);
        assert_eq!(
            pairs(&query),
            [
                ("select", "id,user_id,role,status,created_at"),
                ("status", "eq.pending"),
                ("limit", "100"),
            ]
        );
    }
}
