use tenantsync_core::config::SyncSettings;
use tenantsync_core::models::{EntityType, NewSyncEntry};

use crate::cli::OperationArg;
use crate::commands::common::{open_queue, parse_payload, parse_tenant};
use crate::error::CliError;

pub async fn run_enqueue(
    settings: &SyncSettings,
    tenant: &str,
    entity_type: &str,
    entity_id: &str,
    operation: OperationArg,
    payload: Option<&str>,
) -> Result<(), CliError> {
    let tenant = parse_tenant(tenant)?;
    let payload = parse_payload(payload, entity_id)?;
    let queue = open_queue(settings, &tenant).await?;

    let entry = queue
        .enqueue(NewSyncEntry::new(
            EntityType::from(entity_type.trim().to_string()),
            entity_id.trim(),
            operation.into(),
            payload,
        ))
        .await?;

    println!("{}", entry.id);
    Ok(())
}
