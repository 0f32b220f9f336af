//! Typed rows for the `profiles` and `role_requests` tables.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use tyxar_core::{RequestStatus, Role, RoleFlags, RoleParseError, RoleRequestId, UserId};

use super::{SupabaseClient, SupabaseError};
use crate::services::ports::ProfileStore;

pub const PROFILES: &str = "profiles";
pub const ROLE_REQUESTS: &str = "role_requests";

/// A row of `profiles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRow {
    pub id: UserId,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(flatten)]
    pub roles: RoleFlags,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProfileRow {
    /// Stored name, or an empty string.
    #[must_use]
    pub fn name(&self) -> &str {
        self.display_name.as_deref().unwrap_or_default()
    }
}

/// Body of the insert that lazily creates a profile on first login.
#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub id: UserId,
    pub display_name: String,
    #[serde(flatten)]
    pub roles: RoleFlags,
}

impl NewProfile {
    /// Default row: plain user, no elevated roles.
    #[must_use]
    pub fn for_user(id: UserId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            roles: RoleFlags::default(),
        }
    }
}

/// Editable profile fields on the settings page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSettings {
    pub display_name: String,
    pub bio: String,
    pub website: String,
}

/// A row of `role_requests`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRequest {
    pub id: RoleRequestId,
    pub user_id: UserId,
    pub role: Role,
    #[serde(default)]
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
}

/// `role_requests` row as stored, before the role name is checked.
#[derive(Debug, Clone, Deserialize)]
struct StoredRoleRequest {
    id: RoleRequestId,
    user_id: UserId,
    role: String,
    #[serde(default)]
    status: RequestStatus,
    created_at: DateTime<Utc>,
}

impl TryFrom<StoredRoleRequest> for RoleRequest {
    type Error = RoleParseError;

    fn try_from(row: StoredRoleRequest) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            role: row.role.parse()?,
            status: row.status,
            created_at: row.created_at,
        })
    }
}

/// Requests with a known role; the rest are logged and skipped.
fn known_requests(rows: Vec<StoredRoleRequest>) -> Vec<RoleRequest> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            RoleRequest::try_from(row)
                .map_err(|e| tracing::warn!(request = %id, error = %e, "Skipping role request"))
                .ok()
        })
        .collect()
}

#[async_trait]
impl ProfileStore for SupabaseClient {
    #[instrument(skip(self, auth))]
    async fn fetch_profile(
        &self,
        auth: &SecretString,
        id: UserId,
    ) -> Result<Option<ProfileRow>, SupabaseError> {
        self.from(PROFILES)
            .bearer(auth)
            .select("*")
            .eq("id", id)
            .single()
            .await
    }

    #[instrument(skip(self, auth, profile), fields(id = %profile.id))]
    async fn insert_profile(
        &self,
        auth: &SecretString,
        profile: &NewProfile,
    ) -> Result<(), SupabaseError> {
        self.from(PROFILES).bearer(auth).insert(profile).await
    }

    #[instrument(skip(self, auth))]
    async fn set_display_name(
        &self,
        auth: &SecretString,
        id: UserId,
        display_name: &str,
    ) -> Result<(), SupabaseError> {
        self.from(PROFILES)
            .bearer(auth)
            .eq("id", id)
            .update(&json!({ "display_name": display_name }))
            .await
    }

    #[instrument(skip(self, auth, settings))]
    async fn save_settings(
        &self,
        auth: &SecretString,
        id: UserId,
        settings: &ProfileSettings,
    ) -> Result<(), SupabaseError> {
        let row = json!({
            "id": id,
            "display_name": settings.display_name,
            "bio": settings.bio,
            "website": settings.website,
            "updated_at": Utc::now(),
        });
        self.from(PROFILES).bearer(auth).upsert(&row).await
    }

    #[instrument(skip(self, auth))]
    async fn list_profiles(
        &self,
        auth: &SecretString,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ProfileRow>, SupabaseError> {
        self.from(PROFILES)
            .bearer(auth)
            .select("*")
            .order("created_at", false)
            .range(offset, offset + limit.saturating_sub(1))
            .fetch()
            .await
    }

    #[instrument(skip(self, auth))]
    async fn set_role(
        &self,
        auth: &SecretString,
        id: UserId,
        role: Role,
        enabled: bool,
    ) -> Result<(), SupabaseError> {
        let mut changes = serde_json::Map::new();
        changes.insert(role.column().to_string(), enabled.into());
        self.from(PROFILES)
            .bearer(auth)
            .eq("id", id)
            .update(&changes)
            .await
    }

    #[instrument(skip(self, auth))]
    async fn pending_requests(
        &self,
        auth: &SecretString,
        limit: usize,
    ) -> Result<Vec<RoleRequest>, SupabaseError> {
        self.from(ROLE_REQUESTS)
            .bearer(auth)
            .select("*")
            .eq("status", RequestStatus::Pending)
            .order("created_at", false)
            .limit(limit)
            .fetch::<StoredRoleRequest>()
            .await
            .map(known_requests)
    }

    #[instrument(skip(self, auth))]
    async fn delete_request(
        &self,
        auth: &SecretString,
        id: RoleRequestId,
    ) -> Result<(), SupabaseError> {
        self.from(ROLE_REQUESTS)
            .bearer(auth)
            .eq("id", id)
            .delete()
            .await
    }
}
