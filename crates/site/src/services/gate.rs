//! Session/profile gate.
//!
//! Decides between the login forms and the dashboard, and on every entry into
//! the authenticated state makes sure the visitor has a profile row whose
//! display name matches the auth record, then publishes their roles.

use secrecy::SecretString;
use thiserror::Error;
use tracing::instrument;

use tyxar_core::{Role, UserId};

use crate::services::admin::{AdminPanel, AdminSnapshot, ViewKey};
use crate::services::ports::{IdentityProvider, ProfileStore};
use crate::services::roles::RoleDirectory;
use crate::services::validation;
use crate::supabase::{AuthSession, AuthUser, NewProfile, ProfileRow, SignUpOutcome, SupabaseError};

/// Status shown after a sign-up that needs email confirmation.
pub const CONFIRM_SIGNUP: &str = "Check your email to confirm signup.";

#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Provider(#[from] SupabaseError),

    #[error("profile row for {0} still missing after insert")]
    ProfileMissing(UserId),
}

impl GateError {
    /// Message safe to show the visitor.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Provider(e) => e.user_message(),
            Self::ProfileMissing(_) => "Could not load your profile.".to_string(),
        }
    }
}

/// Result of a login or sign-up form: a status line, or a session.
#[derive(Debug)]
pub enum LoginOutcome {
    Status(String),
    Authenticated(Box<AuthSession>),
}

/// Session transitions the gate reacts to.
#[derive(Debug)]
pub enum AuthEvent {
    SignedIn(Box<AuthSession>),
    TokenRefreshed(Box<AuthSession>),
    SignedOut(UserId),
}

/// What the dashboard shows once authenticated.
#[derive(Debug)]
pub struct Dashboard {
    pub user: AuthUser,
    pub display_name: String,
    pub profile: ProfileRow,
    pub roles: Vec<Role>,
    /// Loaded eagerly for admins only.
    pub admin: Option<AdminSnapshot>,
}

impl Dashboard {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.roles.contains(&Role::Admin)
    }

    /// "Admin" or "User".
    #[must_use]
    pub const fn headline(&self) -> &'static str {
        self.profile.roles.headline()
    }

    /// Comma-separated role names, in fixed order.
    #[must_use]
    pub fn role_names(&self) -> String {
        self.roles
            .iter()
            .map(|r| r.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Account creation date as `M/D/YYYY`.
    #[must_use]
    pub fn member_since(&self) -> String {
        self.user.created_at.format("%-m/%-d/%Y").to_string()
    }
}

/// The two gate states.
#[derive(Debug)]
pub enum GateState {
    Unauthenticated {
        status: Option<String>,
        /// The dashboard's floating navigation control; torn down on sign-out.
        floating_nav: bool,
    },
    Authenticated(Box<Dashboard>),
}

impl GateState {
    #[must_use]
    pub const fn signed_out(status: Option<String>) -> Self {
        Self::Unauthenticated {
            status,
            floating_nav: false,
        }
    }
}

/// Gate over the provider ports.
pub struct Gate<'a> {
    identity: &'a dyn IdentityProvider,
    store: &'a dyn ProfileStore,
    roles: &'a RoleDirectory,
    admin: &'a AdminPanel,
}

impl<'a> Gate<'a> {
    #[must_use]
    pub const fn new(
        identity: &'a dyn IdentityProvider,
        store: &'a dyn ProfileStore,
        roles: &'a RoleDirectory,
        admin: &'a AdminPanel,
    ) -> Self {
        Self {
            identity,
            store,
            roles,
            admin,
        }
    }

    /// Password sign-in. Exactly one of status text or a session comes back.
    #[instrument(skip(self, password))]
    pub async fn log_in(&self, email: &str, password: String) -> LoginOutcome {
        let email = match validation::email(email) {
            Ok(email) => email,
            Err(e) => return LoginOutcome::Status(e.to_string()),
        };
        let password = match validation::password(password) {
            Ok(password) => password,
            Err(e) => return LoginOutcome::Status(e.to_string()),
        };

        match self.identity.sign_in(&email, &password).await {
            Ok(session) => LoginOutcome::Authenticated(Box::new(session)),
            Err(e) => {
                tracing::info!(error = %e, "Sign-in rejected");
                LoginOutcome::Status(e.user_message())
            }
        }
    }

    /// Email sign-up carrying the full name as user metadata.
    #[instrument(skip(self, password))]
    pub async fn sign_up(&self, full_name: &str, email: &str, password: String) -> LoginOutcome {
        let email = match validation::email(email) {
            Ok(email) => email,
            Err(e) => return LoginOutcome::Status(e.to_string()),
        };
        let password = match validation::password(password) {
            Ok(password) => password,
            Err(e) => return LoginOutcome::Status(e.to_string()),
        };

        match self
            .identity
            .sign_up(&email, &password, full_name.trim())
            .await
        {
            Ok(SignUpOutcome::Session(session)) => LoginOutcome::Authenticated(session),
            Ok(SignUpOutcome::ConfirmationSent(_)) => {
                LoginOutcome::Status(CONFIRM_SIGNUP.to_string())
            }
            Err(e) => {
                tracing::info!(error = %e, "Sign-up rejected");
                LoginOutcome::Status(e.user_message())
            }
        }
    }

    /// Resolve the start state from whatever access token the visitor holds.
    #[instrument(skip_all)]
    pub async fn resolve(
        &self,
        access_token: Option<&SecretString>,
        view: ViewKey,
    ) -> Result<GateState, GateError> {
        let Some(token) = access_token else {
            return Ok(GateState::signed_out(None));
        };
        match self.identity.get_user(token).await {
            Ok(user) => {
                let dashboard = self.enter_authenticated(user, token, view).await?;
                Ok(GateState::Authenticated(Box::new(dashboard)))
            }
            Err(e) => {
                tracing::info!(error = %e, "Stored session rejected by provider");
                Ok(GateState::signed_out(None))
            }
        }
    }

    /// React to a session transition.
    #[instrument(skip_all)]
    pub async fn handle(&self, event: AuthEvent, view: ViewKey) -> Result<GateState, GateError> {
        match event {
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
                let AuthSession {
                    access_token, user, ..
                } = *session;
                let dashboard = self.enter_authenticated(user, &access_token, view).await?;
                Ok(GateState::Authenticated(Box::new(dashboard)))
            }
            AuthEvent::SignedOut(user) => {
                self.roles.forget(user).await;
                self.admin.close(view).await;
                Ok(GateState::signed_out(None))
            }
        }
    }

    /// Ensure the profile row, sync its name, publish roles, and start the
    /// admin loads when the visitor is an administrator. Safe to repeat.
    ///
    /// # Errors
    ///
    /// Returns the provider error from any profile read or write.
    #[instrument(skip(self, user, access_token), fields(user = %user.id))]
    pub async fn enter_authenticated(
        &self,
        user: AuthUser,
        access_token: &SecretString,
        view: ViewKey,
    ) -> Result<Dashboard, GateError> {
        let display_name = user.display_name();

        let mut profile = match self.store.fetch_profile(access_token, user.id).await? {
            Some(profile) => profile,
            None => {
                tracing::info!("Creating default profile");
                self.store
                    .insert_profile(access_token, &NewProfile::for_user(user.id, &display_name))
                    .await?;
                self.store
                    .fetch_profile(access_token, user.id)
                    .await?
                    .ok_or(GateError::ProfileMissing(user.id))?
            }
        };

        if profile.name() != display_name {
            tracing::debug!(stored = profile.name(), "Syncing display name from auth record");
            self.store
                .set_display_name(access_token, user.id, &display_name)
                .await?;
            profile.display_name = Some(display_name.clone());
        }

        let roles = profile.roles.roles();
        self.roles.publish(user.id, &roles).await;

        let admin = if roles.contains(&Role::Admin) {
            Some(self.admin.snapshot(view, access_token).await)
        } else {
            None
        };

        Ok(Dashboard {
            user,
            display_name,
            profile,
            roles,
            admin,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use tyxar_core::RoleFlags;
    use uuid::Uuid;

    use super::*;
    use crate::services::ports::fakes::{FakeIdentity, FakeStore, session_for, user};

    struct Fixture {
        identity: FakeIdentity,
        store: Arc<FakeStore>,
        roles: RoleDirectory,
        admin: AdminPanel,
    }

    impl Fixture {
        fn new(identity: FakeIdentity, store: FakeStore) -> Self {
            let store = Arc::new(store);
            let admin = AdminPanel::new(Arc::clone(&store) as Arc<dyn ProfileStore>);
            Self {
                identity,
                store,
                roles: RoleDirectory::new(),
                admin,
            }
        }

        fn gate(&self) -> Gate<'_> {
            Gate::new(&self.identity, self.store.as_ref(), &self.roles, &self.admin)
        }
    }

    fn ada() -> AuthUser {
        user(UserId::new(Uuid::new_v4()), "ada@tyxar.dev", Some("Ada Lovelace"))
    }

    #[tokio::test]
    async fn test_login_yields_status_or_session() {
        let ada = ada();
        let fixture = Fixture::new(
            FakeIdentity::default().with_account(ada.clone(), "correct horse"),
            FakeStore::default(),
        );
        let gate = fixture.gate();

        match gate.log_in("ada@tyxar.dev", "wrong".into()).await {
            LoginOutcome::Status(status) => assert_eq!(status, "Invalid login credentials"),
            LoginOutcome::Authenticated(_) => panic!("wrong password must not authenticate"),
        }

        match gate.log_in("ada@tyxar.dev", "correct horse".into()).await {
            LoginOutcome::Authenticated(session) => assert_eq!(session.user.id, ada.id),
            LoginOutcome::Status(status) => panic!("unexpected status {status}"),
        }
    }

    #[tokio::test]
    async fn test_validation_runs_before_provider() {
        let fixture = Fixture::new(FakeIdentity::default(), FakeStore::default());
        let gate = fixture.gate();

        assert!(matches!(
            gate.log_in("", "secret".into()).await,
            LoginOutcome::Status(s) if s == "Please enter your email address."
        ));
        assert!(matches!(
            gate.log_in("ada@tyxar.dev", String::new()).await,
            LoginOutcome::Status(s) if s == "Please enter your password."
        ));
        assert_eq!(fixture.identity.sign_in_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sign_up_confirmation_and_duplicate() {
        let fixture = Fixture::new(
            FakeIdentity {
                confirm_signups: true,
                ..FakeIdentity::default()
            },
            FakeStore::default(),
        );
        let gate = fixture.gate();

        assert!(matches!(
            gate.sign_up("Grace", "grace@tyxar.dev", "password1".into()).await,
            LoginOutcome::Status(s) if s == CONFIRM_SIGNUP
        ));
        assert!(matches!(
            gate.sign_up("Grace", "grace@tyxar.dev", "password1".into()).await,
            LoginOutcome::Status(s) if s == "User already registered"
        ));
    }

    #[tokio::test]
    async fn test_first_login_creates_default_profile() {
        let ada = ada();
        let fixture = Fixture::new(FakeIdentity::default(), FakeStore::default());
        let session = session_for(ada.clone());

        let dashboard = fixture
            .gate()
            .enter_authenticated(ada.clone(), &session.access_token, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(dashboard.roles, vec![Role::User]);
        assert_eq!(dashboard.display_name, "Ada Lovelace");
        assert_eq!(dashboard.headline(), "User");
        assert!(dashboard.admin.is_none());
        assert_eq!(fixture.store.profile(ada.id).unwrap().name(), "Ada Lovelace");
        assert!(fixture.roles.has(ada.id, Role::User).await);

        // re-entering is idempotent
        fixture
            .gate()
            .enter_authenticated(ada, &session.access_token, Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(fixture.store.inserts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stored_name_follows_auth_record() {
        let ada = ada();
        let store = FakeStore::default();
        store.profiles.lock().unwrap().push(ProfileRow {
            id: ada.id,
            display_name: Some("Old Name".into()),
            roles: RoleFlags::new(true, false, true, false),
            bio: None,
            website: None,
            created_at: None,
            updated_at: None,
        });
        let fixture = Fixture::new(FakeIdentity::default(), store);
        let session = session_for(ada.clone());

        let dashboard = fixture
            .gate()
            .enter_authenticated(ada.clone(), &session.access_token, Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(fixture.store.profile(ada.id).unwrap().name(), "Ada Lovelace");
        assert_eq!(dashboard.role_names(), "user, developer");
    }

    #[tokio::test(start_paused = true)]
    async fn test_admin_entry_loads_admin_views() {
        let ada = ada();
        let store = FakeStore::with_profiles(3);
        store.profiles.lock().unwrap().push(ProfileRow {
            id: ada.id,
            display_name: Some("Ada Lovelace".into()),
            roles: RoleFlags::new(true, true, false, false),
            bio: None,
            website: None,
            created_at: None,
            updated_at: None,
        });
        let fixture = Fixture::new(FakeIdentity::default().with_account(ada.clone(), "pw"), store);
        let view = Uuid::new_v4();

        let state = fixture
            .gate()
            .handle(AuthEvent::SignedIn(Box::new(session_for(ada.clone()))), view)
            .await
            .unwrap();

        let GateState::Authenticated(dashboard) = state else {
            panic!("expected dashboard");
        };
        assert!(dashboard.is_admin());
        assert_eq!(dashboard.headline(), "Admin");
        let snapshot = dashboard.admin.unwrap();
        assert_eq!(snapshot.table.unwrap().loaded(), 4);
        assert!(snapshot.requests.unwrap().is_empty());
        assert!(fixture.roles.has(ada.id, Role::Admin).await);

        let state = fixture
            .gate()
            .handle(AuthEvent::SignedOut(ada.id), view)
            .await
            .unwrap();
        assert!(matches!(
            state,
            GateState::Unauthenticated {
                status: None,
                floating_nav: false
            }
        ));
        assert!(fixture.roles.get(ada.id).await.is_none());
        assert!(fixture.admin.user_table(view).await.is_none());
    }

    #[tokio::test]
    async fn test_resolve_without_valid_session() {
        let fixture = Fixture::new(FakeIdentity::default(), FakeStore::default());
        let gate = fixture.gate();

        assert!(matches!(
            gate.resolve(None, Uuid::new_v4()).await.unwrap(),
            GateState::Unauthenticated { .. }
        ));
        let stale = SecretString::from("access-expired");
        assert!(matches!(
            gate.resolve(Some(&stale), Uuid::new_v4()).await.unwrap(),
            GateState::Unauthenticated { .. }
        ));
    }
}
