//! Subcommand implementations.

pub mod roles;
pub mod search;
pub mod users;

use std::sync::Arc;

use secrecy::SecretString;
use thiserror::Error;
use tyxar_core::Role;

use tyxar_site::config::{ConfigError, SupabaseConfig};
use tyxar_site::services::ProfileStore;
use tyxar_site::supabase::{SupabaseClient, SupabaseError};

/// Errors surfaced to the operator.
#[derive(Debug, Error)]
pub enum CliError {
    /// Backend settings missing or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Request to the hosted backend failed.
    #[error("Backend error: {0}")]
    Backend(#[from] SupabaseError),

    /// Role that cannot be granted from here.
    #[error("Role {0} is not editable. Editable roles: admin, developer, tester")]
    NotEditable(Role),

    /// One or more steps of a multi-step command failed.
    #[error("{0}")]
    Partial(String),
}

/// Service-role client plus the key it authenticates with.
pub fn service_store() -> Result<(Arc<dyn ProfileStore>, SecretString), CliError> {
    let config = SupabaseConfig::from_env()?;
    let client = SupabaseClient::service(&config)?;
    let auth = client.api_key().clone();
    Ok((Arc::new(client), auth))
}

/// Refuse the implicit `user` role.
pub fn editable(role: Role) -> Result<Role, CliError> {
    if Role::EDITABLE.contains(&role) {
        Ok(role)
    } else {
        Err(CliError::NotEditable(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editable_roles() {
        assert!(editable(Role::Developer).is_ok());
        assert!(matches!(editable(Role::User), Err(CliError::NotEditable(Role::User))));
    }
}
