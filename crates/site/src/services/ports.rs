//! Port interfaces for the hosted backend.
//!
//! The gate and admin panel talk to these traits rather than to the HTTP
//! client, so they can run against in-memory fakes in tests.

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::json;

use tyxar_core::{Email, Role, RoleRequestId, UserId};

use crate::supabase::{
    AuthSession, AuthUser, NewProfile, OAuthProvider, Pkce, ProfileRow, ProfileSettings,
    RoleRequest, SignUpOutcome, SupabaseClient, SupabaseError,
};

/// Auth provider operations.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register with email/password and a full name.
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        full_name: &str,
    ) -> Result<SignUpOutcome, SupabaseError>;

    /// Password sign-in.
    async fn sign_in(&self, email: &Email, password: &SecretString)
    -> Result<AuthSession, SupabaseError>;

    /// Browser redirect target for OAuth sign-in.
    fn authorize_url(&self, provider: OAuthProvider, redirect_to: &str, pkce: &Pkce) -> String;

    /// Complete OAuth sign-in.
    async fn exchange_code(&self, code: &str, verifier: &str)
    -> Result<AuthSession, SupabaseError>;

    /// Renew an expiring session.
    async fn refresh(&self, refresh_token: &SecretString) -> Result<AuthSession, SupabaseError>;

    /// Current user for a session.
    async fn get_user(&self, access_token: &SecretString) -> Result<AuthUser, SupabaseError>;

    /// Change the signed-in user's password.
    async fn update_password(
        &self,
        access_token: &SecretString,
        new_password: &SecretString,
    ) -> Result<AuthUser, SupabaseError>;

    /// End the session on the provider side.
    async fn sign_out(&self, access_token: &SecretString) -> Result<(), SupabaseError>;
}

/// Profile and role-request tables.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Profile row for a user, if one exists.
    async fn fetch_profile(
        &self,
        auth: &SecretString,
        id: UserId,
    ) -> Result<Option<ProfileRow>, SupabaseError>;

    /// Create a profile row.
    async fn insert_profile(
        &self,
        auth: &SecretString,
        profile: &NewProfile,
    ) -> Result<(), SupabaseError>;

    /// Overwrite the stored display name.
    async fn set_display_name(
        &self,
        auth: &SecretString,
        id: UserId,
        display_name: &str,
    ) -> Result<(), SupabaseError>;

    /// Upsert the editable settings fields.
    async fn save_settings(
        &self,
        auth: &SecretString,
        id: UserId,
        settings: &ProfileSettings,
    ) -> Result<(), SupabaseError>;

    /// One page of profiles, newest first.
    async fn list_profiles(
        &self,
        auth: &SecretString,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ProfileRow>, SupabaseError>;

    /// Update a single role column.
    async fn set_role(
        &self,
        auth: &SecretString,
        id: UserId,
        role: Role,
        enabled: bool,
    ) -> Result<(), SupabaseError>;

    /// Pending role requests, newest first.
    async fn pending_requests(
        &self,
        auth: &SecretString,
        limit: usize,
    ) -> Result<Vec<RoleRequest>, SupabaseError>;

    /// Remove a role request.
    async fn delete_request(
        &self,
        auth: &SecretString,
        id: RoleRequestId,
    ) -> Result<(), SupabaseError>;
}

#[async_trait]
impl IdentityProvider for SupabaseClient {
    async fn sign_up(
        &self,
        email: &Email,
        password: &SecretString,
        full_name: &str,
    ) -> Result<SignUpOutcome, SupabaseError> {
        Self::sign_up(self, email, password, full_name).await
    }

    async fn sign_in(
        &self,
        email: &Email,
        password: &SecretString,
    ) -> Result<AuthSession, SupabaseError> {
        self.sign_in_with_password(email, password).await
    }

    fn authorize_url(&self, provider: OAuthProvider, redirect_to: &str, pkce: &Pkce) -> String {
        Self::authorize_url(self, provider, redirect_to, pkce)
    }

    async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<AuthSession, SupabaseError> {
        Self::exchange_code(self, code, verifier).await
    }

    async fn refresh(&self, refresh_token: &SecretString) -> Result<AuthSession, SupabaseError> {
        self.refresh_session(refresh_token).await
    }

    async fn get_user(&self, access_token: &SecretString) -> Result<AuthUser, SupabaseError> {
        Self::get_user(self, access_token).await
    }

    async fn update_password(
        &self,
        access_token: &SecretString,
        new_password: &SecretString,
    ) -> Result<AuthUser, SupabaseError> {
        use secrecy::ExposeSecret;

        let body = json!({
            "password": new_password.expose_secret(),
            "data": { "password_last_changed": chrono::Utc::now().to_rfc3339() },
        });
        self.update_user(access_token, &body).await
    }

    async fn sign_out(&self, access_token: &SecretString) -> Result<(), SupabaseError> {
        Self::sign_out(self, access_token).await
    }
}
