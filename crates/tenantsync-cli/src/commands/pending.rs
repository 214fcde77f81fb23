use tenantsync_core::config::SyncSettings;

use crate::cli::StatusArg;
use crate::commands::common::{format_entry_lines, open_queue, parse_tenant};
use crate::error::CliError;

pub async fn run_pending(
    settings: &SyncSettings,
    tenant: &str,
    status: StatusArg,
    as_json: bool,
) -> Result<(), CliError> {
    let tenant = parse_tenant(tenant)?;
    let queue = open_queue(settings, &tenant).await?;
    let entries = queue.list_by_status(&tenant, status.into()).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No entries.");
        return Ok(());
    }

    for line in format_entry_lines(&entries) {
        println!("{line}");
    }
    Ok(())
}
