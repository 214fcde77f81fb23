use serde::Serialize;
use tenantsync_core::config::SyncSettings;
use tenantsync_core::db::QueueCounts;
use tenantsync_core::models::TenantId;

use crate::commands::common::{open_queue, parse_tenant};
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatusItem {
    pub tenant_id: TenantId,
    #[serde(flatten)]
    pub counts: QueueCounts,
    pub total: usize,
}

pub async fn run_status(settings: &SyncSettings, tenant: &str, as_json: bool) -> Result<(), CliError> {
    let tenant = parse_tenant(tenant)?;
    let queue = open_queue(settings, &tenant).await?;
    let counts = queue.counts(&tenant).await?;

    let item = QueueStatusItem {
        tenant_id: tenant,
        counts,
        total: counts.total(),
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        for line in format_status_lines(&item) {
            println!("{line}");
        }
    }
    Ok(())
}

pub fn format_status_lines(item: &QueueStatusItem) -> Vec<String> {
    vec![
        format!("tenant      {}", item.tenant_id),
        format!("pending     {}", item.counts.pending),
        format!("processing  {}", item.counts.processing),
        format!("synced      {}", item.counts.synced),
        format!("failed      {}", item.counts.failed),
        format!("total       {}", item.total),
    ]
}
