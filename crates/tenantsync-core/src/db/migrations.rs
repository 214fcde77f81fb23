//! Database migrations
//!
//! Schema changes form a ladder of versioned steps. Each step only adds
//! tables, columns or indexes, runs in its own transaction, and records its
//! version in `schema_version`, so any historical database can be replayed
//! up to the latest layout without losing rows.

use crate::error::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};

/// Current schema version
pub const CURRENT_VERSION: i32 = 3;

/// One additive step of the migration ladder
struct Migration {
    version: i32,
    description: &'static str,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "initial sync queue",
        statements: &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            "CREATE TABLE IF NOT EXISTS sync_queue (
                id TEXT PRIMARY KEY,
                tenant_id TEXT NOT NULL,
                entity_type TEXT NOT NULL,
                entity_id TEXT NOT NULL,
                operation_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending'
            )",
            "CREATE INDEX IF NOT EXISTS idx_sync_queue_tenant_ts
                ON sync_queue(tenant_id, timestamp)",
        ],
    },
    Migration {
        version: 2,
        description: "retry diagnostics",
        statements: &[
            "ALTER TABLE sync_queue ADD COLUMN attempts INTEGER NOT NULL DEFAULT 0",
            "ALTER TABLE sync_queue ADD COLUMN last_attempt INTEGER",
            "ALTER TABLE sync_queue ADD COLUMN error TEXT",
            "CREATE INDEX IF NOT EXISTS idx_sync_queue_tenant_status
                ON sync_queue(tenant_id, status, timestamp)",
        ],
    },
    Migration {
        version: 3,
        description: "tenant metadata and entity lookup",
        statements: &[
            "CREATE TABLE IF NOT EXISTS tenant_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            "CREATE INDEX IF NOT EXISTS idx_sync_queue_entity
                ON sync_queue(tenant_id, entity_type, entity_id)",
        ],
    },
];

/// Run all pending migrations, returning the resulting schema version
pub fn run(conn: &mut Connection) -> Result<i32> {
    run_up_to(conn, CURRENT_VERSION)
}

/// Apply ladder steps up to and including `target`
pub(crate) fn run_up_to(conn: &mut Connection, target: i32) -> Result<i32> {
    let start = get_version(conn)?;
    let mut version = start;

    for migration in MIGRATIONS
        .iter()
        .filter(|migration| migration.version > start && migration.version <= target)
    {
        apply(conn, migration)?;
        version = migration.version;
        tracing::info!(
            "Migrated database to version {} ({})",
            migration.version,
            migration.description
        );
    }

    Ok(version)
}

fn apply(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let failed = |error: rusqlite::Error| Error::Migration {
        version: migration.version,
        message: error.to_string(),
    };

    // Dropping the transaction without commit rolls it back
    let tx = conn.transaction().map_err(failed)?;
    for stmt in migration.statements {
        tx.execute_batch(stmt).map_err(failed)?;
    }
    tx.execute(
        "INSERT INTO schema_version (version) VALUES (?)",
        params![migration.version],
    )
    .map_err(failed)?;
    tx.commit().map_err(failed)
}

/// Get the current schema version
pub fn get_version(conn: &Connection) -> Result<i32> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;

    if !exists {
        return Ok(0);
    }

    let version = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
        .optional()?
        .unwrap_or(0);

    Ok(version)
}
