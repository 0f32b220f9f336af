//! Admin panel routes (admin role only).
//!
//! The user table renders page one with a trailing sentinel row; the sentinel
//! asks `/admin/users/rows` for whatever the background loader appended and
//! replaces itself with those rows and, while loading continues, a new
//! sentinel.

use askama::Template;
use axum::{
    Form, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::instrument;

use tyxar_core::{Role, RoleRequestId, UserId};

use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::services::admin::{
    AdminSnapshot, Approve, LoadStatus, PendingRequest, RowsChunk, ToggleOutcome, UserTable,
};
use crate::state::AppState;
use crate::supabase::ProfileRow;

/// One user-table row.
#[derive(Debug)]
pub struct UserRow {
    pub id: UserId,
    pub name: String,
    pub created: String,
    /// Editable role columns with their current value.
    pub flags: Vec<(Role, bool)>,
}

impl From<&ProfileRow> for UserRow {
    fn from(row: &ProfileRow) -> Self {
        Self {
            id: row.id,
            name: row.name().to_string(),
            created: row
                .created_at
                .map(|t| t.format("%-m/%-d/%Y").to_string())
                .unwrap_or_default(),
            flags: Role::EDITABLE
                .into_iter()
                .map(|role| (role, row.roles.has(role)))
                .collect(),
        }
    }
}

/// Rows plus the sentinel that fetches the next batch.
#[derive(Template)]
#[template(path = "admin/rows.html")]
pub struct RowsTemplate {
    pub rows: Vec<UserRow>,
    /// Offset the sentinel asks for; `None` once loading stopped.
    pub next: Option<usize>,
    pub error: Option<String>,
}

impl From<RowsChunk> for RowsTemplate {
    fn from(chunk: RowsChunk) -> Self {
        Self {
            rows: chunk.rows.iter().map(UserRow::from).collect(),
            next: chunk.next,
            error: chunk.error,
        }
    }
}

/// The `#admin-users` block.
#[derive(Template)]
#[template(path = "admin/users.html")]
pub struct UsersTemplate {
    pub roles: [Role; 3],
    /// Error banner, e.g. from a rejected toggle.
    pub banner: Option<String>,
    /// Set when page one could not be loaded.
    pub failed: Option<String>,
    pub rows: Vec<UserRow>,
    pub next: Option<usize>,
    pub error: Option<String>,
}

impl UsersTemplate {
    fn new(table: std::result::Result<&UserTable, &str>, banner: Option<String>) -> Self {
        let empty = Self {
            roles: Role::EDITABLE,
            banner,
            failed: None,
            rows: Vec::new(),
            next: None,
            error: None,
        };
        match table {
            Err(message) => Self {
                failed: Some(message.to_string()),
                ..empty
            },
            Ok(table) => {
                let rows = table.rows();
                let (next, error) = match table.status() {
                    LoadStatus::Loading => (Some(rows.len()), None),
                    LoadStatus::Complete => (None, None),
                    LoadStatus::Failed(message) => (None, Some(message)),
                };
                Self {
                    rows: rows.iter().map(UserRow::from).collect(),
                    next,
                    error,
                    ..empty
                }
            }
        }
    }
}

/// One pending request.
#[derive(Debug)]
pub struct RequestRow {
    pub id: RoleRequestId,
    pub user_id: UserId,
    pub display_name: String,
    pub role: Role,
    pub requested: String,
}

impl From<&PendingRequest> for RequestRow {
    fn from(pending: &PendingRequest) -> Self {
        Self {
            id: pending.request.id,
            user_id: pending.request.user_id,
            display_name: pending.display_name.clone(),
            role: pending.request.role,
            requested: pending.request.created_at.format("%-m/%-d/%Y").to_string(),
        }
    }
}

/// The `#admin-requests` block.
#[derive(Template)]
#[template(path = "admin/requests.html")]
pub struct RequestsTemplate {
    pub requests: Vec<RequestRow>,
    pub failed: Option<String>,
}

impl RequestsTemplate {
    fn new(requests: std::result::Result<&[PendingRequest], &str>) -> Self {
        match requests {
            Ok(requests) => Self {
                requests: requests.iter().map(RequestRow::from).collect(),
                failed: None,
            },
            Err(message) => Self {
                requests: Vec::new(),
                failed: Some(message.to_string()),
            },
        }
    }
}

/// The whole `#admin-panel`.
#[derive(Template)]
#[template(path = "admin/panel.html")]
pub struct PanelTemplate {
    pub errors: Vec<String>,
    pub users: String,
    pub requests: String,
}

/// Render both admin views, with any errors shown above them.
///
/// # Errors
///
/// Returns an error if a template fails to render.
pub fn panel_html(snapshot: &AdminSnapshot, errors: Option<&[String]>) -> Result<String> {
    let users = UsersTemplate::new(
        snapshot.table.as_deref().map_err(String::as_str),
        None,
    )
    .render()?;
    let requests = RequestsTemplate::new(
        snapshot
            .requests
            .as_deref()
            .map_err(String::as_str),
    )
    .render()?;

    Ok(PanelTemplate {
        errors: errors.map(<[String]>::to_vec).unwrap_or_default(),
        users,
        requests,
    }
    .render()?)
}

/// Reload the user table for this login.
#[instrument(skip_all)]
pub async fn users(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
) -> Result<Html<String>> {
    let table = state
        .admin()
        .open_user_table(user.view_key, &user.access_token)
        .await;
    let html = match &table {
        Ok(table) => UsersTemplate::new(Ok(table.as_ref()), None).render()?,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load user table");
            UsersTemplate::new(Err(e.user_message().as_str()), None).render()?
        }
    };
    Ok(Html(html))
}

#[derive(Debug, Deserialize)]
pub struct RowsQuery {
    #[serde(default)]
    pub offset: usize,
}

/// Rows the background loader appended past `offset`.
///
/// Waits for the next page when none has arrived yet.
#[instrument(skip(state, user))]
pub async fn rows(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Query(query): Query<RowsQuery>,
) -> Result<Html<String>> {
    let Some(table) = state.admin().user_table(user.view_key).await else {
        // View closed or replaced: stop polling
        return Ok(Html(String::new()));
    };
    let chunk = table.rows_after(query.offset).await;
    Ok(Html(RowsTemplate::from(chunk).render()?))
}

/// Role checkbox. `enabled` is only sent when the box is ticked.
#[derive(Debug, Deserialize)]
pub struct ToggleForm {
    pub role: Role,
    pub enabled: Option<String>,
}

/// Write one role column.
///
/// A success leaves the checkbox as the admin set it. A failure reloads the
/// whole table and swaps it in with the error.
#[instrument(skip(state, user, form), fields(role = %form.role))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<UserId>,
    Form(form): Form<ToggleForm>,
) -> Result<Response> {
    if !Role::EDITABLE.contains(&form.role) {
        return Err(AppError::BadRequest(format!("{} cannot be toggled", form.role)));
    }
    let enabled = form.enabled.is_some();

    match state
        .admin()
        .toggle_role(user.view_key, &user.access_token, id, form.role, enabled)
        .await
    {
        ToggleOutcome::Updated => {
            Ok((StatusCode::NO_CONTENT, [("HX-Reswap", "none")]).into_response())
        }
        ToggleOutcome::Reloaded { error } => {
            let table = state.admin().user_table(user.view_key).await;
            let html = match table.as_deref() {
                Some(table) => UsersTemplate::new(Ok(table), Some(error)).render()?,
                None => UsersTemplate::new(Err("Could not reload users."), Some(error)).render()?,
            };
            Ok((
                [("HX-Retarget", "#admin-users"), ("HX-Reswap", "outerHTML")],
                Html(html),
            )
                .into_response())
        }
    }
}

/// Pending role requests.
#[instrument(skip_all)]
pub async fn requests(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
) -> Result<Html<String>> {
    let pending = state.admin().pending_requests(&user.access_token).await;
    let html = match &pending {
        Ok(pending) => RequestsTemplate::new(Ok(pending.as_slice())).render()?,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load role requests");
            RequestsTemplate::new(Err(e.user_message().as_str())).render()?
        }
    };
    Ok(Html(html))
}

/// Approve button payload.
#[derive(Debug, Deserialize)]
pub struct ApproveForm {
    pub user_id: UserId,
    pub role: Role,
}

/// Grant the role, delete the request, then re-render both views.
#[instrument(skip(state, user, form))]
pub async fn approve(
    State(state): State<AppState>,
    RequireAdmin(user): RequireAdmin,
    Path(id): Path<i64>,
    Form(form): Form<ApproveForm>,
) -> Result<Html<String>> {
    let approval = state
        .admin()
        .approve(
            user.view_key,
            &user.access_token,
            Approve {
                id: RoleRequestId::new(id),
                user_id: form.user_id,
                role: form.role,
            },
        )
        .await;

    let errors = approval.errors();
    if errors.is_empty() {
        tracing::info!(request = id, user = %form.user_id, role = %form.role, "Role request approved");
    }
    Ok(Html(panel_html(&approval.snapshot, Some(&errors))?))
}

/// Create the admin routes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(users))
        .route("/users/rows", get(rows))
        .route("/users/{id}/roles", post(toggle))
        .route("/requests", get(requests))
        .route("/requests/{id}/approve", post(approve))
}
