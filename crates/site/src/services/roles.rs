//! Published role lists, keyed by user.
//!
//! The gate publishes a user's roles every time it enters the authenticated
//! state; admin gating reads them back without another profile fetch.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use tyxar_core::{Role, UserId};

/// Roles stay cached for as long as a login session might idle.
const ROLE_TTI: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Concurrent map of user id to derived role list.
#[derive(Clone)]
pub struct RoleDirectory {
    roles: Cache<UserId, Arc<[Role]>>,
}

impl Default for RoleDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl RoleDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            roles: Cache::builder()
                .max_capacity(100_000)
                .time_to_idle(ROLE_TTI)
                .build(),
        }
    }

    /// Replace the published roles for a user.
    pub async fn publish(&self, user: UserId, roles: &[Role]) {
        self.roles.insert(user, Arc::from(roles)).await;
    }

    /// Roles last published for a user.
    pub async fn get(&self, user: UserId) -> Option<Arc<[Role]>> {
        self.roles.get(&user).await
    }

    /// Whether the user's published roles include `role`.
    pub async fn has(&self, user: UserId, role: Role) -> bool {
        self.get(user)
            .await
            .is_some_and(|roles| roles.contains(&role))
    }

    /// Forget a user (sign-out).
    pub async fn forget(&self, user: UserId) {
        self.roles.invalidate(&user).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_replaces_previous_roles() {
        let directory = RoleDirectory::new();
        let user = UserId::new(uuid::Uuid::new_v4());

        directory.publish(user, &[Role::User, Role::Admin]).await;
        assert!(directory.has(user, Role::Admin).await);

        directory.publish(user, &[Role::User]).await;
        assert!(!directory.has(user, Role::Admin).await);
        assert_eq!(directory.get(user).await.as_deref(), Some(&[Role::User][..]));

        directory.forget(user).await;
        assert!(directory.get(user).await.is_none());
    }
}
