use std::collections::HashMap;
use std::path::Path;

use clap::Parser;
use serde_json::json;
use tenantsync_core::config::{DATA_DIR_VAR, MAX_ATTEMPTS_VAR};
use tenantsync_core::models::{EntityType, NewSyncEntry, OperationType, SyncStatus};

use crate::cli::{Cli, Commands, CompletionShell, OperationArg, StatusArg};
use crate::commands::common::{
    format_entry_lines, format_relative_time, format_sync_timestamp, normalize_entry_identifier,
    open_queue, parse_payload, parse_tenant, resolve_entry_id, settings_from,
};
use crate::commands::completions::render_completions;
use crate::commands::enqueue::run_enqueue;
use crate::commands::maintenance::{run_purge, run_retry};
use crate::commands::mark::run_mark;
use crate::commands::status::{format_status_lines, QueueStatusItem};
use crate::error::CliError;

fn test_settings(dir: &Path) -> tenantsync_core::config::SyncSettings {
    settings_from(&HashMap::new(), Some(dir)).unwrap()
}

#[test]
fn cli_parses_enqueue_with_global_data_dir() {
    let cli = Cli::try_parse_from([
        "tenantsync",
        "enqueue",
        "--tenant",
        "acme",
        "Account",
        "acc-1",
        "create",
        "--payload",
        r#"{"id":"acc-1"}"#,
        "--data-dir",
        "/tmp/ts",
    ])
    .unwrap();

    assert_eq!(cli.data_dir.as_deref(), Some(Path::new("/tmp/ts")));
    let Commands::Enqueue {
        tenant,
        entity_type,
        operation,
        payload,
        ..
    } = cli.command
    else {
        panic!("expected enqueue");
    };
    assert_eq!(tenant, "acme");
    assert_eq!(entity_type, "Account");
    assert_eq!(operation, OperationArg::Create);
    assert!(payload.is_some());
}

#[test]
fn cli_rejects_unknown_status() {
    assert!(Cli::try_parse_from(["tenantsync", "mark", "--tenant", "acme", "abc", "done"]).is_err());
}

#[test]
fn data_dir_flag_overrides_environment() {
    let mut values = HashMap::new();
    values.insert(DATA_DIR_VAR.to_string(), "/from/env".to_string());
    values.insert(MAX_ATTEMPTS_VAR.to_string(), "9".to_string());

    let settings = settings_from(&values, Some(Path::new("/from/flag"))).unwrap();
    assert_eq!(settings.data_dir, Path::new("/from/flag"));
    assert_eq!(settings.max_attempts, 9);

    let settings = settings_from(&values, None).unwrap();
    assert_eq!(settings.data_dir, Path::new("/from/env"));
}

#[test]
fn parse_payload_defaults_to_entity_id() {
    assert_eq!(parse_payload(None, " acc-1 ").unwrap(), json!({ "id": "acc-1" }));
    assert_eq!(parse_payload(Some("  "), "acc-1").unwrap(), json!({ "id": "acc-1" }));
}

#[test]
fn parse_payload_requires_json_object() {
    assert!(matches!(
        parse_payload(Some("[1, 2]"), "acc-1"),
        Err(CliError::InvalidPayload(_))
    ));
    assert!(matches!(
        parse_payload(Some("{oops"), "acc-1"),
        Err(CliError::InvalidPayload(_))
    ));
}

#[test]
fn parse_tenant_rejects_path_like_ids() {
    assert!(parse_tenant("acme").is_ok());
    assert!(parse_tenant("../acme").is_err());
}

#[test]
fn normalize_entry_identifier_rejects_empty() {
    assert!(matches!(
        normalize_entry_identifier("   "),
        Err(CliError::EmptyEntryId)
    ));
    assert_eq!(normalize_entry_identifier(" ABC ").unwrap(), "abc");
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
}

#[test]
fn format_sync_timestamp_returns_utc_label() {
    assert_eq!(format_sync_timestamp(0), "1970-01-01 00:00:00 UTC");
}

#[test]
fn status_lines_include_every_status() {
    let item = QueueStatusItem {
        tenant_id: parse_tenant("acme").unwrap(),
        counts: tenantsync_core::db::QueueCounts {
            pending: 2,
            processing: 1,
            synced: 0,
            failed: 3,
        },
        total: 6,
    };

    let lines = format_status_lines(&item);
    assert_eq!(lines.len(), 6);
    assert!(lines[1].ends_with('2'));
    assert!(lines[4].ends_with('3'));

    let value = serde_json::to_value(&item).unwrap();
    assert_eq!(value["tenantId"], "acme");
    assert_eq!(value["failed"], 3);
    assert_eq!(value["total"], 6);
}

#[test]
fn completions_use_binary_name() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("tenantsync"));
}

#[tokio::test(flavor = "current_thread")]
async fn enqueue_then_mark_by_prefix() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = test_settings(tmp.path());

    run_enqueue(
        &settings,
        "acme",
        "Account",
        "acc-1",
        OperationArg::Create,
        Some(r#"{"id":"acc-1","name":"Checking"}"#),
    )
    .await
    .unwrap();

    let tenant = parse_tenant("acme").unwrap();
    let queue = open_queue(&settings, &tenant).await.unwrap();
    let pending = queue.list_pending(&tenant).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].entity_type, EntityType::Account);
    assert_eq!(pending[0].operation_type, OperationType::Create);

    let lines = format_entry_lines(&pending);
    assert!(lines[0].contains("CREATE Account acc-1"));
    drop(queue);

    let id = pending[0].id.to_string();
    run_mark(&settings, "acme", &id[..20], StatusArg::Failed, Some("rejected"))
        .await
        .unwrap();

    let queue = open_queue(&settings, &tenant).await.unwrap();
    let failed = queue.list_by_status(&tenant, SyncStatus::Failed).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].error.as_deref(), Some("rejected"));
}

#[tokio::test(flavor = "current_thread")]
async fn retry_and_purge_maintain_queue() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = test_settings(tmp.path());
    let tenant = parse_tenant("acme").unwrap();

    {
        let queue = open_queue(&settings, &tenant).await.unwrap();
        let failed = queue
            .enqueue(NewSyncEntry::delete(EntityType::Payee, "p-1"))
            .await
            .unwrap();
        let synced = queue
            .enqueue(NewSyncEntry::delete(EntityType::Payee, "p-2"))
            .await
            .unwrap();
        queue
            .update_status(&tenant, &failed.id, SyncStatus::Failed, Some("boom"))
            .await
            .unwrap();
        queue
            .update_status(&tenant, &synced.id, SyncStatus::Synced, None)
            .await
            .unwrap();
        queue.registry().close().await;
    }

    run_retry(&settings, "acme").await.unwrap();
    run_purge(&settings, "acme").await.unwrap();

    let queue = open_queue(&settings, &tenant).await.unwrap();
    let counts = queue.counts(&tenant).await.unwrap();
    assert_eq!((counts.pending, counts.synced, counts.failed), (1, 0, 0));
}

#[tokio::test(flavor = "current_thread")]
async fn unknown_entry_prefix_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let settings = test_settings(tmp.path());
    let tenant = parse_tenant("acme").unwrap();
    let queue = open_queue(&settings, &tenant).await.unwrap();

    let error = resolve_entry_id(&queue, &tenant, "ffff").await.unwrap_err();
    assert!(matches!(error, CliError::EntryNotFound(_)));
}
