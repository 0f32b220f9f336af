//! Application state shared across handlers.
//!
//! Published roles, cached search pages and admin table views live here and
//! are handed to the services explicitly.

use std::sync::Arc;

use crate::config::{FragmentOrigin, SiteConfig};
use crate::fragments::{DirectorySource, FragmentSource, HttpSource};
use crate::search::{SearchEngine, SuggestGate};
use crate::services::{AdminPanel, Gate, IdentityProvider, ProfileStore, RoleDirectory};
use crate::supabase::{SupabaseClient, SupabaseError};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("provider client: {0}")]
    Provider(#[from] SupabaseError),
    #[error("fragment client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: SiteConfig,
    identity: Arc<dyn IdentityProvider>,
    store: Arc<dyn ProfileStore>,
    fragments: Arc<dyn FragmentSource>,
    search: SearchEngine,
    suggest: SuggestGate,
    roles: RoleDirectory,
    admin: AdminPanel,
}

impl AppState {
    /// Create state backed by the hosted provider and the configured
    /// fragment origin.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built.
    pub fn new(config: SiteConfig) -> Result<Self, StateError> {
        let client = SupabaseClient::new(&config.supabase)?;
        let fragments: Arc<dyn FragmentSource> = match &config.fragments {
            FragmentOrigin::Directory(root) => Arc::new(DirectorySource::new(root.clone())),
            FragmentOrigin::Remote(base) => {
                Arc::new(HttpSource::new(reqwest::Client::builder().build()?, base.clone()))
            }
        };
        let client = Arc::new(client);
        Ok(Self::from_parts(config, client.clone(), client, fragments))
    }

    /// Assemble state from explicit ports.
    #[must_use]
    pub fn from_parts(
        config: SiteConfig,
        identity: Arc<dyn IdentityProvider>,
        store: Arc<dyn ProfileStore>,
        fragments: Arc<dyn FragmentSource>,
    ) -> Self {
        let roles = RoleDirectory::new();
        Self {
            inner: Arc::new(AppStateInner {
                search: SearchEngine::new(Arc::clone(&fragments)),
                suggest: SuggestGate::default(),
                admin: AdminPanel::new(Arc::clone(&store)).with_role_directory(roles.clone()),
                roles,
                config,
                identity,
                store,
                fragments,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &SiteConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn identity(&self) -> &dyn IdentityProvider {
        self.inner.identity.as_ref()
    }

    #[must_use]
    pub fn store(&self) -> &dyn ProfileStore {
        self.inner.store.as_ref()
    }

    #[must_use]
    pub fn fragments(&self) -> &dyn FragmentSource {
        self.inner.fragments.as_ref()
    }

    #[must_use]
    pub fn search(&self) -> &SearchEngine {
        &self.inner.search
    }

    #[must_use]
    pub fn suggest(&self) -> &SuggestGate {
        &self.inner.suggest
    }

    #[must_use]
    pub fn roles(&self) -> &RoleDirectory {
        &self.inner.roles
    }

    #[must_use]
    pub fn admin(&self) -> &AdminPanel {
        &self.inner.admin
    }

    /// Session/profile gate over this state's ports.
    #[must_use]
    pub fn gate(&self) -> Gate<'_> {
        Gate::new(
            self.identity(),
            self.store(),
            self.roles(),
            self.admin(),
        )
    }
}
