use tenantsync_core::config::SyncSettings;

use crate::commands::common::{open_queue, parse_tenant};
use crate::error::CliError;

pub async fn run_retry(settings: &SyncSettings, tenant: &str) -> Result<(), CliError> {
    let tenant = parse_tenant(tenant)?;
    let queue = open_queue(settings, &tenant).await?;
    let requeued = queue.requeue_failed(&tenant).await?;
    println!("Requeued {requeued} failed entries");
    Ok(())
}

pub async fn run_purge(settings: &SyncSettings, tenant: &str) -> Result<(), CliError> {
    let tenant = parse_tenant(tenant)?;
    let queue = open_queue(settings, &tenant).await?;
    let purged = queue.purge_synced(&tenant).await?;
    println!("Purged {purged} synced entries");
    Ok(())
}
