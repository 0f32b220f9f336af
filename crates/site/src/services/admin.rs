//! Role-gated admin panel: the user table and pending role requests.
//!
//! The user table loads its first page before rendering, then a background
//! task keeps fetching pages (with a pause between them) until an empty page
//! comes back. The task belongs to the view: replacing or dropping the view
//! aborts it.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::future::join_all;
use moka::future::Cache;
use secrecy::SecretString;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument;
use uuid::Uuid;

use tyxar_core::{Role, RoleRequestId, UserId};

use crate::services::ports::ProfileStore;
use crate::services::roles::RoleDirectory;
use crate::supabase::{ProfileRow, RoleRequest, SupabaseError};

/// Rows per user-table page.
pub const PAGE_SIZE: usize = 50;
/// Pause between background page fetches.
pub const PAGE_DELAY: Duration = Duration::from_millis(150);
/// Maximum pending requests shown.
pub const PENDING_LIMIT: usize = 100;
/// Pause before reloading both views after an approval.
pub const RELOAD_DELAY: Duration = Duration::from_millis(500);
/// Name shown for a request whose requester has no profile.
pub const UNKNOWN_REQUESTER: &str = "Unknown user";

/// Identifies one admin's open view (one per login session).
pub type ViewKey = Uuid;

/// Background page loader. Aborted when dropped.
#[derive(Debug)]
pub struct PaginationTask(JoinHandle<()>);

impl PaginationTask {
    /// Stop fetching further pages.
    pub fn cancel(&self) {
        self.0.abort();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.0.is_finished()
    }
}

impl Drop for PaginationTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Where the background loader is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    Loading,
    Complete,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Progress {
    loaded: usize,
    status: LoadStatus,
}

/// Rows appended since a given offset.
#[derive(Debug)]
pub struct RowsChunk {
    pub rows: Vec<ProfileRow>,
    /// Offset to ask for next, while the loader is still running.
    pub next: Option<usize>,
    /// Set once if the loader stopped on an error.
    pub error: Option<String>,
}

/// All profile rows, newest first, filled in incrementally.
#[derive(Debug)]
pub struct UserTable {
    rows: Arc<RwLock<Vec<ProfileRow>>>,
    progress: watch::Receiver<Progress>,
    task: Option<PaginationTask>,
}

impl UserTable {
    /// Load page one, then spawn the loader for the rest.
    ///
    /// # Errors
    ///
    /// Returns the provider error if page one cannot be fetched.
    pub async fn open(
        store: Arc<dyn ProfileStore>,
        auth: SecretString,
        page_delay: Duration,
    ) -> Result<Self, SupabaseError> {
        let first = store.list_profiles(&auth, 0, PAGE_SIZE).await?;
        let loaded = first.len();
        let status = if loaded == 0 {
            LoadStatus::Complete
        } else {
            LoadStatus::Loading
        };
        let (tx, progress) = watch::channel(Progress { loaded, status });
        let rows = Arc::new(RwLock::new(first));

        let task = (loaded > 0).then(|| {
            PaginationTask(tokio::spawn(load_remaining(
                store,
                auth,
                Arc::clone(&rows),
                tx,
                page_delay,
            )))
        });

        Ok(Self {
            rows,
            progress,
            task,
        })
    }

    /// Snapshot of the rows loaded so far.
    #[must_use]
    pub fn rows(&self) -> Vec<ProfileRow> {
        self.rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of rows loaded so far.
    #[must_use]
    pub fn loaded(&self) -> usize {
        self.progress.borrow().loaded
    }

    #[must_use]
    pub fn status(&self) -> LoadStatus {
        self.progress.borrow().status.clone()
    }

    /// Wait until rows past `offset` exist or the loader stops, then return them.
    pub async fn rows_after(&self, offset: usize) -> RowsChunk {
        let mut progress = self.progress.clone();
        let settled = progress
            .wait_for(|p| p.loaded > offset || p.status != LoadStatus::Loading)
            .await
            .map(|p| p.clone())
            // Sender gone means the loader was aborted.
            .unwrap_or(Progress {
                loaded: offset,
                status: LoadStatus::Complete,
            });

        let rows = self
            .rows
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .skip(offset)
            .cloned()
            .collect::<Vec<_>>();
        let end = offset + rows.len();

        match settled.status {
            LoadStatus::Loading => RowsChunk {
                rows,
                next: Some(end),
                error: None,
            },
            LoadStatus::Complete => RowsChunk {
                rows,
                next: None,
                error: None,
            },
            LoadStatus::Failed(message) => RowsChunk {
                rows,
                next: None,
                error: Some(message),
            },
        }
    }

    /// Wait for the loader to stop.
    pub async fn wait_until_settled(&self) -> LoadStatus {
        let mut progress = self.progress.clone();
        progress
            .wait_for(|p| p.status != LoadStatus::Loading)
            .await
            .map_or(LoadStatus::Complete, |p| p.status.clone())
    }

    /// Abort the background loader.
    pub fn cancel(&self) {
        if let Some(task) = &self.task {
            task.cancel();
        }
    }

    #[must_use]
    pub const fn task(&self) -> Option<&PaginationTask> {
        self.task.as_ref()
    }
}

async fn load_remaining(
    store: Arc<dyn ProfileStore>,
    auth: SecretString,
    rows: Arc<RwLock<Vec<ProfileRow>>>,
    progress: watch::Sender<Progress>,
    page_delay: Duration,
) {
    let mut offset = progress.borrow().loaded;
    loop {
        tokio::time::sleep(page_delay).await;
        match store.list_profiles(&auth, offset, PAGE_SIZE).await {
            Ok(page) if page.is_empty() => {
                tracing::debug!(rows = offset, "User table fully loaded");
                progress.send_modify(|p| p.status = LoadStatus::Complete);
                return;
            }
            Ok(page) => {
                offset += page.len();
                rows.write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .extend(page);
                progress.send_modify(|p| p.loaded = offset);
            }
            Err(e) => {
                tracing::error!(error = %e, offset, "Failed to load user table page");
                progress.send_modify(|p| p.status = LoadStatus::Failed(e.user_message()));
                return;
            }
        }
    }
}

/// A pending request joined to its requester's name.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub request: RoleRequest,
    pub display_name: String,
}

/// Result of a single checkbox toggle.
#[derive(Debug)]
pub enum ToggleOutcome {
    /// The column was written.
    Updated,
    /// The write failed; the whole table was reloaded from the server.
    Reloaded { error: String },
}

/// Both admin views, each loaded independently.
#[derive(Debug)]
pub struct AdminSnapshot {
    pub table: Result<Arc<UserTable>, String>,
    pub requests: Result<Vec<PendingRequest>, String>,
}

/// Request being approved, as posted by the approve button.
#[derive(Debug, Clone, Copy)]
pub struct Approve {
    pub id: RoleRequestId,
    pub user_id: UserId,
    pub role: Role,
}

/// Outcome of an approval: each write reports on its own.
#[derive(Debug)]
pub struct Approval {
    pub flag_set: Result<(), String>,
    pub request_deleted: Result<(), String>,
    pub snapshot: AdminSnapshot,
}

impl Approval {
    /// Errors from either write, in order.
    #[must_use]
    pub fn errors(&self) -> Vec<String> {
        [&self.flag_set, &self.request_deleted]
            .into_iter()
            .filter_map(|r| r.as_ref().err().cloned())
            .collect()
    }
}

/// Admin operations plus the registry of open user-table views.
#[derive(Clone)]
pub struct AdminPanel {
    store: Arc<dyn ProfileStore>,
    /// Published roles; an entry is dropped whenever that user's flags change.
    roles: RoleDirectory,
    views: Cache<ViewKey, Arc<UserTable>>,
    page_delay: Duration,
    reload_delay: Duration,
}

impl AdminPanel {
    #[must_use]
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self::with_delays(store, PAGE_DELAY, RELOAD_DELAY)
    }

    #[must_use]
    pub fn with_delays(
        store: Arc<dyn ProfileStore>,
        page_delay: Duration,
        reload_delay: Duration,
    ) -> Self {
        Self {
            store,
            roles: RoleDirectory::new(),
            views: Cache::builder()
                .max_capacity(1_000)
                .time_to_idle(Duration::from_secs(30 * 60))
                .build(),
            page_delay,
            reload_delay,
        }
    }

    /// Share the directory the gate publishes roles to.
    #[must_use]
    pub fn with_role_directory(mut self, roles: RoleDirectory) -> Self {
        self.roles = roles;
        self
    }

    /// Open (or reopen) the user table for a view, aborting any previous loader.
    ///
    /// # Errors
    ///
    /// Returns the provider error if page one cannot be fetched; the previous
    /// view is closed either way.
    #[instrument(skip(self, auth))]
    pub async fn open_user_table(
        &self,
        view: ViewKey,
        auth: &SecretString,
    ) -> Result<Arc<UserTable>, SupabaseError> {
        self.close(view).await;
        let table = Arc::new(
            UserTable::open(Arc::clone(&self.store), auth.clone(), self.page_delay).await?,
        );
        self.views.insert(view, Arc::clone(&table)).await;
        Ok(table)
    }

    /// Currently open table for a view.
    pub async fn user_table(&self, view: ViewKey) -> Option<Arc<UserTable>> {
        self.views.get(&view).await
    }

    /// Drop a view and stop its loader.
    pub async fn close(&self, view: ViewKey) {
        if let Some(previous) = self.views.remove(&view).await {
            previous.cancel();
        }
    }

    /// Write one role column. On failure, reload the whole table.
    #[instrument(skip(self, auth))]
    pub async fn toggle_role(
        &self,
        view: ViewKey,
        auth: &SecretString,
        user: UserId,
        role: Role,
        enabled: bool,
    ) -> ToggleOutcome {
        match self.store.set_role(auth, user, role, enabled).await {
            Ok(()) => {
                // Next admin check re-reads the profile
                self.roles.forget(user).await;
                ToggleOutcome::Updated
            }
            Err(e) => {
                tracing::warn!(error = %e, %user, %role, "Role toggle rejected, reloading table");
                if let Err(reload) = self.open_user_table(view, auth).await {
                    tracing::error!(error = %reload, "User table reload failed");
                }
                ToggleOutcome::Reloaded {
                    error: e.user_message(),
                }
            }
        }
    }

    /// Pending requests with requester names looked up concurrently.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the request list cannot be fetched.
    /// Failed name lookups fall back to a placeholder.
    #[instrument(skip_all)]
    pub async fn pending_requests(
        &self,
        auth: &SecretString,
    ) -> Result<Vec<PendingRequest>, SupabaseError> {
        let requests = self.store.pending_requests(auth, PENDING_LIMIT).await?;

        let lookups = requests.iter().map(|request| async move {
            match self.store.fetch_profile(auth, request.user_id).await {
                Ok(Some(profile)) if !profile.name().is_empty() => profile.name().to_string(),
                Ok(_) => UNKNOWN_REQUESTER.to_string(),
                Err(e) => {
                    tracing::warn!(error = %e, user = %request.user_id, "Requester lookup failed");
                    UNKNOWN_REQUESTER.to_string()
                }
            }
        });
        let names = join_all(lookups).await;

        Ok(requests
            .into_iter()
            .zip(names)
            .map(|(request, display_name)| PendingRequest {
                request,
                display_name,
            })
            .collect())
    }

    /// Load both views concurrently.
    pub async fn snapshot(&self, view: ViewKey, auth: &SecretString) -> AdminSnapshot {
        let (table, requests) =
            tokio::join!(self.open_user_table(view, auth), self.pending_requests(auth));
        AdminSnapshot {
            table: table.map_err(|e| e.user_message()),
            requests: requests.map_err(|e| e.user_message()),
        }
    }

    /// Grant the requested role and delete the request, then reload both views.
    ///
    /// The two writes are independent: a failure in one does not stop or undo
    /// the other.
    #[instrument(skip(self, auth))]
    pub async fn approve(&self, view: ViewKey, auth: &SecretString, approve: Approve) -> Approval {
        let flag_set = self
            .store
            .set_role(auth, approve.user_id, approve.role, true)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, request = %approve.id, "Failed to set role flag");
                e.user_message()
            });
        if flag_set.is_ok() {
            self.roles.forget(approve.user_id).await;
        }

        let request_deleted = self
            .store
            .delete_request(auth, approve.id)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, request = %approve.id, "Failed to delete role request");
                e.user_message()
            });

        tokio::time::sleep(self.reload_delay).await;

        Approval {
            flag_set,
            request_deleted,
            snapshot: self.snapshot(view, auth).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::Ordering;

    use chrono::{TimeZone, Utc};
    use tyxar_core::RequestStatus;

    use super::*;
    use crate::services::ports::fakes::FakeStore;

    fn token() -> SecretString {
        SecretString::from("admin-token")
    }

    fn panel(store: &Arc<FakeStore>) -> AdminPanel {
        AdminPanel::new(Arc::clone(store) as Arc<dyn ProfileStore>)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_page_then_background_until_empty() {
        let store = Arc::new(FakeStore::with_profiles(120));
        let panel = panel(&store);
        let view = Uuid::new_v4();

        let table = panel.open_user_table(view, &token()).await.unwrap();
        assert_eq!(table.loaded(), PAGE_SIZE);
        assert_eq!(table.status(), LoadStatus::Loading);

        let chunk = table.rows_after(PAGE_SIZE).await;
        assert_eq!(chunk.rows.len(), PAGE_SIZE);
        assert_eq!(chunk.next, Some(100));

        assert_eq!(table.wait_until_settled().await, LoadStatus::Complete);
        assert_eq!(table.rows().len(), 120);
        // pages at 0, 50, 100 and the empty page at 120
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 4);

        let rows = table.rows();
        assert!(rows.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let tail = table.rows_after(120).await;
        assert!(tail.rows.is_empty());
        assert_eq!(tail.next, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopening_aborts_previous_loader() {
        let store = Arc::new(FakeStore::with_profiles(500));
        let panel = panel(&store);
        let view = Uuid::new_v4();

        let first = panel.open_user_table(view, &token()).await.unwrap();
        let second = panel.open_user_table(view, &token()).await.unwrap();

        assert_eq!(second.wait_until_settled().await, LoadStatus::Complete);
        assert_eq!(second.rows().len(), 500);
        assert!(first.task().unwrap().is_finished());
        assert_eq!(first.loaded(), PAGE_SIZE);
        // one page for the aborted view, ten pages plus the empty one for the new view
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 12);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closing_view_stops_loader() {
        let store = Arc::new(FakeStore::with_profiles(500));
        let panel = panel(&store);
        let view = Uuid::new_v4();

        let table = panel.open_user_table(view, &token()).await.unwrap();
        panel.close(view).await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert!(panel.user_table(view).await.is_none());
        assert_eq!(table.loaded(), PAGE_SIZE);
        assert_eq!(store.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_toggle_reloads_whole_table() {
        let store = Arc::new(FakeStore::with_profiles(3));
        let panel = panel(&store);
        let view = Uuid::new_v4();
        panel.open_user_table(view, &token()).await.unwrap();

        let target = store.profiles.lock().unwrap()[1].id;
        let outcome = panel
            .toggle_role(view, &token(), target, Role::Developer, true)
            .await;
        assert!(matches!(outcome, ToggleOutcome::Updated));
        assert!(store.profile(target).unwrap().roles.is_developer);

        let calls_before = store.list_calls.load(Ordering::SeqCst);
        store.fail_role_updates.lock().unwrap().insert(target);
        let outcome = panel
            .toggle_role(view, &token(), target, Role::Admin, true)
            .await;

        match outcome {
            ToggleOutcome::Reloaded { error } => {
                assert_eq!(error, "permission denied for table profiles");
            }
            ToggleOutcome::Updated => panic!("toggle should have been rejected"),
        }
        assert!(store.list_calls.load(Ordering::SeqCst) > calls_before);
        assert!(!store.profile(target).unwrap().roles.is_admin);
        assert!(panel.user_table(view).await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_role_change_drops_published_roles() {
        let store = Arc::new(FakeStore::with_profiles(2));
        let roles = RoleDirectory::new();
        let panel = panel(&store).with_role_directory(roles.clone());
        let view = Uuid::new_v4();
        let demoted = store.profiles.lock().unwrap()[0].id;

        roles.publish(demoted, &[Role::User, Role::Admin]).await;
        let outcome = panel
            .toggle_role(view, &token(), demoted, Role::Admin, false)
            .await;
        assert!(matches!(outcome, ToggleOutcome::Updated));
        assert!(roles.get(demoted).await.is_none());

        // A rejected write leaves the published list alone
        let kept = store.profiles.lock().unwrap()[1].id;
        roles.publish(kept, &[Role::User, Role::Admin]).await;
        store.fail_role_updates.lock().unwrap().insert(kept);
        panel.toggle_role(view, &token(), kept, Role::Admin, false).await;
        assert!(roles.has(kept, Role::Admin).await);

        request_for(&store, 3, demoted, Role::Tester);
        roles.publish(demoted, &[Role::User]).await;
        panel
            .approve(
                view,
                &token(),
                Approve {
                    id: RoleRequestId::new(3),
                    user_id: demoted,
                    role: Role::Tester,
                },
            )
            .await;
        assert!(roles.get(demoted).await.is_none());
    }

    fn request_for(store: &FakeStore, id: i64, user: UserId, role: Role) {
        store.requests.lock().unwrap().push(RoleRequest {
            id: RoleRequestId::new(id),
            user_id: user,
            role,
            status: RequestStatus::Pending,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
                + chrono::Duration::minutes(id),
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_requests_join_names() {
        let store = Arc::new(FakeStore::with_profiles(2));
        let known = store.profiles.lock().unwrap()[0].id;
        request_for(&store, 1, known, Role::Tester);
        request_for(&store, 2, UserId::new(Uuid::new_v4()), Role::Developer);

        let pending = panel(&store).pending_requests(&token()).await.unwrap();
        assert_eq!(pending.len(), 2);
        // newest first
        assert_eq!(pending[0].request.id, RoleRequestId::new(2));
        assert_eq!(pending[0].display_name, UNKNOWN_REQUESTER);
        assert_eq!(pending[1].display_name, "user-0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_approve_tester_request() {
        let store = Arc::new(FakeStore::with_profiles(2));
        let user = store.profiles.lock().unwrap()[0].id;
        request_for(&store, 9, user, Role::Tester);
        let panel = panel(&store);

        let approval = panel
            .approve(
                Uuid::new_v4(),
                &token(),
                Approve {
                    id: RoleRequestId::new(9),
                    user_id: user,
                    role: Role::Tester,
                },
            )
            .await;

        assert!(approval.errors().is_empty());
        assert!(store.profile(user).unwrap().roles.is_tester);
        assert!(approval.snapshot.requests.unwrap().is_empty());
        assert_eq!(approval.snapshot.table.unwrap().rows().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_approve_reports_each_write() {
        let store = Arc::new(FakeStore::with_profiles(1));
        let user = store.profiles.lock().unwrap()[0].id;
        request_for(&store, 4, user, Role::Developer);
        *store.fail_deletes.lock().unwrap() = true;

        let approval = panel(&store)
            .approve(
                Uuid::new_v4(),
                &token(),
                Approve {
                    id: RoleRequestId::new(4),
                    user_id: user,
                    role: Role::Developer,
                },
            )
            .await;

        assert!(approval.flag_set.is_ok());
        assert_eq!(
            approval.request_deleted,
            Err("permission denied for table role_requests".to_string())
        );
        assert!(store.profile(user).unwrap().roles.is_developer);
        assert_eq!(approval.snapshot.requests.unwrap().len(), 1);
    }
}
