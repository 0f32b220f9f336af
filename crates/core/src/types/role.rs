//! Role flags stored on a profile row.
//!
//! A profile carries four boolean columns. The role list shown in the UI and
//! consulted for admin gating is derived from them in a fixed order,
//! independent of how the row was serialized.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named capability group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
    Developer,
    Tester,
}

/// Error returned when a role name or column is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid role: {0}")]
pub struct RoleParseError(pub String);

impl Role {
    /// All roles in display order.
    pub const ALL: [Self; 4] = [Self::User, Self::Admin, Self::Developer, Self::Tester];

    /// Roles an administrator may grant or revoke from the user table.
    pub const EDITABLE: [Self; 3] = [Self::Admin, Self::Developer, Self::Tester];

    /// Lowercase role name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
            Self::Developer => "developer",
            Self::Tester => "tester",
        }
    }

    /// Name of the boolean column holding this role on the profile row.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::User => "is_user",
            Self::Admin => "is_admin",
            Self::Developer => "is_developer",
            Self::Tester => "is_tester",
        }
    }

    /// Parse a column name such as `is_tester`.
    ///
    /// # Errors
    ///
    /// Returns [`RoleParseError`] for unknown columns.
    pub fn from_column(column: &str) -> Result<Self, RoleParseError> {
        Self::ALL
            .into_iter()
            .find(|role| role.column() == column)
            .ok_or_else(|| RoleParseError(column.to_owned()))
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            "developer" => Ok(Self::Developer),
            "tester" => Ok(Self::Tester),
            other => Err(RoleParseError(other.to_owned())),
        }
    }
}

/// The four role columns of a profile row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct RoleFlags {
    #[serde(default)]
    pub is_user: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_developer: bool,
    #[serde(default)]
    pub is_tester: bool,
}

impl Default for RoleFlags {
    /// Flags of a freshly created profile: a plain user.
    fn default() -> Self {
        Self {
            is_user: true,
            is_admin: false,
            is_developer: false,
            is_tester: false,
        }
    }
}

impl RoleFlags {
    /// Build flags from positional booleans `(user, admin, developer, tester)`.
    #[must_use]
    pub const fn new(is_user: bool, is_admin: bool, is_developer: bool, is_tester: bool) -> Self {
        Self {
            is_user,
            is_admin,
            is_developer,
            is_tester,
        }
    }

    /// Whether the given role flag is set.
    #[must_use]
    pub const fn has(&self, role: Role) -> bool {
        match role {
            Role::User => self.is_user,
            Role::Admin => self.is_admin,
            Role::Developer => self.is_developer,
            Role::Tester => self.is_tester,
        }
    }

    /// Set or clear a single role flag.
    pub const fn set(&mut self, role: Role, value: bool) {
        match role {
            Role::User => self.is_user = value,
            Role::Admin => self.is_admin = value,
            Role::Developer => self.is_developer = value,
            Role::Tester => self.is_tester = value,
        }
    }

    /// Role list in fixed order `user, admin, developer, tester`.
    #[must_use]
    pub fn roles(&self) -> Vec<Role> {
        Role::ALL.into_iter().filter(|role| self.has(*role)).collect()
    }

    /// Human label used on the dashboard ("Admin" wins over "User").
    #[must_use]
    pub const fn headline(&self) -> &'static str {
        if self.is_admin { "Admin" } else { "User" }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_roles_follow_fixed_order() {
        let flags = RoleFlags::new(true, false, true, false);
        assert_eq!(flags.roles(), vec![Role::User, Role::Developer]);

        let names: Vec<&str> = flags.roles().iter().map(|r| r.as_str()).collect();
        assert_eq!(names, ["user", "developer"]);
    }

    #[test]
    fn test_roles_ignore_serialized_field_order() {
        let flags: RoleFlags = serde_json::from_str(
            r#"{"is_tester":true,"is_admin":true,"is_developer":false,"is_user":true}"#,
        )
        .unwrap();
        assert_eq!(flags.roles(), vec![Role::User, Role::Admin, Role::Tester]);
    }

    #[test]
    fn test_default_is_plain_user() {
        assert_eq!(RoleFlags::default().roles(), vec![Role::User]);
        assert_eq!(RoleFlags::default().headline(), "User");
    }

    #[test]
    fn test_set_single_flag() {
        let mut flags = RoleFlags::default();
        flags.set(Role::Tester, true);
        assert!(flags.has(Role::Tester));
        assert!(!flags.has(Role::Admin));
    }

    #[test]
    fn test_column_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::from_column(role.column()).unwrap(), role);
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!(Role::from_column("is_owner").is_err());
        assert!("owner".parse::<Role>().is_err());
    }
}
