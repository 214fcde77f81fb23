use std::collections::HashMap;
use std::env;
use std::path::Path;

use chrono::Utc;
use serde_json::{json, Value};
use tenantsync_core::config::{SyncSettings, DATA_DIR_VAR};
use tenantsync_core::db::TenantRegistry;
use tenantsync_core::models::{SyncEntryId, SyncQueueEntry, SyncStatus, TenantId};
use tenantsync_core::services::SyncQueue;

use crate::error::CliError;

/// Load settings from the environment, letting `--data-dir` win.
pub fn load_settings(data_dir: Option<&Path>) -> Result<SyncSettings, CliError> {
    let values: HashMap<String, String> = env::vars().collect();
    settings_from(&values, data_dir)
}

pub fn settings_from(
    values: &HashMap<String, String>,
    data_dir: Option<&Path>,
) -> Result<SyncSettings, CliError> {
    let data_dir = data_dir.map(|path| path.to_string_lossy().into_owned());
    let settings = SyncSettings::from_lookup(|name| {
        if name == DATA_DIR_VAR && data_dir.is_some() {
            return data_dir.clone();
        }
        values.get(name).cloned()
    })?;
    Ok(settings)
}

/// Open `tenant` and return a queue bound to it.
pub async fn open_queue(settings: &SyncSettings, tenant: &TenantId) -> Result<SyncQueue, CliError> {
    let registry = TenantRegistry::new(settings.storage_root());
    registry.open(tenant).await?;
    Ok(SyncQueue::new(registry))
}

pub fn parse_tenant(raw: &str) -> Result<TenantId, CliError> {
    Ok(TenantId::new(raw.trim())?)
}

/// Payload to queue: the given JSON object, or `{"id": entity_id}`.
pub fn parse_payload(raw: Option<&str>, entity_id: &str) -> Result<Value, CliError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(json!({ "id": entity_id.trim() }));
    };

    let value: Value = serde_json::from_str(raw)
        .map_err(|error| CliError::InvalidPayload(format!("not valid JSON: {error}")))?;
    if !value.is_object() {
        return Err(CliError::InvalidPayload(
            "payload must be a JSON object".to_string(),
        ));
    }
    Ok(value)
}

pub fn normalize_entry_identifier(id: &str) -> Result<String, CliError> {
    let id = id.trim();
    if id.is_empty() {
        return Err(CliError::EmptyEntryId);
    }
    Ok(id.to_ascii_lowercase())
}

/// Resolve a full entry ID or a unique prefix of one.
pub async fn resolve_entry_id(
    queue: &SyncQueue,
    tenant: &TenantId,
    raw_id: &str,
) -> Result<SyncEntryId, CliError> {
    let id = normalize_entry_identifier(raw_id)?;

    if let Ok(entry_id) = id.parse::<SyncEntryId>() {
        return Ok(entry_id);
    }

    let mut matches = Vec::new();
    for status in SyncStatus::ALL {
        matches.extend(
            queue
                .list_by_status(tenant, status)
                .await?
                .into_iter()
                .map(|entry| entry.id)
                .filter(|entry_id| entry_id.to_string().starts_with(&id)),
        );
    }

    match matches.as_slice() {
        [] => Err(CliError::EntryNotFound(id)),
        [only] => Ok(*only),
        _ => Err(CliError::AmbiguousEntryId(format!(
            "Entry ID prefix '{id}' matches {} entries; use a longer prefix",
            matches.len()
        ))),
    }
}

pub fn format_entry_lines(entries: &[SyncQueueEntry]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    entries
        .iter()
        .map(|entry| {
            let id = entry.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let target = format!(
                "{} {} {}",
                entry.operation_type, entry.entity_type, entry.entity_id
            );
            let relative_time = format_relative_time(entry.timestamp, now_ms);
            let line = format!(
                "{short_id:<13}  {:<10}  {target:<40}  attempts={:<3}  {relative_time}",
                entry.status, entry.attempts
            );

            match &entry.error {
                Some(error) => format!("{line}  error={error}"),
                None => line,
            }
        })
        .collect()
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else {
        format_sync_timestamp(timestamp_ms)
    }
}
