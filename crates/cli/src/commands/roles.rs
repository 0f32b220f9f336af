//! Role request and role flag commands.

use tracing::instrument;
use tyxar_core::{Role, RoleRequestId, UserId};

use tyxar_site::services::AdminPanel;

use super::{CliError, editable, service_store};

/// Print pending requests with requester names.
///
/// # Errors
///
/// Returns an error if the backend is unreachable or misconfigured.
pub async fn pending() -> Result<(), CliError> {
    let (store, auth) = service_store()?;
    let requests = AdminPanel::new(store).pending_requests(&auth).await?;

    if requests.is_empty() {
        tracing::info!("No pending role requests");
        return Ok(());
    }
    for pending in &requests {
        let request = &pending.request;
        tracing::info!(
            "#{} {} ({}) wants {} since {}",
            request.id,
            pending.display_name,
            request.user_id,
            request.role,
            request.created_at.format("%Y-%m-%d %H:%M")
        );
    }
    tracing::info!("{} pending", requests.len());
    Ok(())
}

/// Grant the requested role and delete the request.
///
/// Both writes are attempted even if the first fails; every failure is
/// reported.
///
/// # Errors
///
/// Returns `Partial` listing each failed write.
#[instrument]
pub async fn approve(id: RoleRequestId, user: UserId, role: Role) -> Result<(), CliError> {
    let role = editable(role)?;
    let (store, auth) = service_store()?;

    let mut failures = Vec::new();
    match store.set_role(&auth, user, role, true).await {
        Ok(()) => tracing::info!("Granted {role} to {user}"),
        Err(e) => failures.push(format!("granting {role}: {e}")),
    }
    match store.delete_request(&auth, id).await {
        Ok(()) => tracing::info!("Deleted request #{id}"),
        Err(e) => failures.push(format!("deleting request #{id}: {e}")),
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(CliError::Partial(format!("Approval incomplete: {}", failures.join("; "))))
    }
}

/// Set or clear one role flag.
///
/// # Errors
///
/// Returns an error if the role is not editable or the update fails.
#[instrument]
pub async fn grant(user: UserId, role: Role, enabled: bool) -> Result<(), CliError> {
    let role = editable(role)?;
    let (store, auth) = service_store()?;
    store.set_role(&auth, user, role, enabled).await?;
    tracing::info!(
        "{} {role} for {user}",
        if enabled { "Granted" } else { "Revoked" }
    );
    Ok(())
}
