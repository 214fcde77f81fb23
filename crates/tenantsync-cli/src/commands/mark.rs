use tenantsync_core::config::SyncSettings;
use tenantsync_core::models::SyncStatus;

use crate::cli::StatusArg;
use crate::commands::common::{open_queue, parse_tenant, resolve_entry_id};
use crate::error::CliError;

pub async fn run_mark(
    settings: &SyncSettings,
    tenant: &str,
    id: &str,
    status: StatusArg,
    error: Option<&str>,
) -> Result<(), CliError> {
    let tenant = parse_tenant(tenant)?;
    let queue = open_queue(settings, &tenant).await?;
    let entry_id = resolve_entry_id(&queue, &tenant, id).await?;
    let status = SyncStatus::from(status);

    let error = error.map(str::trim).filter(|error| !error.is_empty());
    if !queue.update_status(&tenant, &entry_id, status, error).await? {
        return Err(CliError::EntryNotFound(entry_id.to_string()));
    }

    println!("{entry_id} -> {status}");
    Ok(())
}
