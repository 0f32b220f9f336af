//! Profile listing.

use super::{CliError, service_store};

/// Print one page of profiles, newest first.
///
/// # Errors
///
/// Returns an error if the backend is unreachable or misconfigured.
pub async fn list(offset: usize, limit: usize) -> Result<(), CliError> {
    let (store, auth) = service_store()?;
    let rows = store.list_profiles(&auth, offset, limit).await?;

    for row in &rows {
        let roles: Vec<String> = row.roles.roles().iter().map(ToString::to_string).collect();
        tracing::info!(
            "{} {:<24} {:<10} [{}]",
            row.id,
            row.name(),
            row.created_at
                .map(|t| t.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            roles.join(", ")
        );
    }
    tracing::info!("{} profiles (offset {offset})", rows.len());
    Ok(())
}
