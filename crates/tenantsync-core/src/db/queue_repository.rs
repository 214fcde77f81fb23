//! Sync queue repository implementation

use crate::error::Result;
use crate::models::{SyncEntryId, SyncQueueEntry, SyncStatus, TenantId};
use crate::util::now_millis;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

const ENTRY_COLUMNS: &str = "id, tenant_id, entity_type, entity_id, operation_type, payload,
     timestamp, status, attempts, last_attempt, error";

/// Number of queue entries per status for one tenant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub processing: usize,
    pub synced: usize,
    pub failed: usize,
}

impl QueueCounts {
    pub const fn total(&self) -> usize {
        self.pending + self.processing + self.synced + self.failed
    }
}

/// Trait for sync queue storage operations
pub trait SyncQueueRepository {
    /// Persist a freshly created entry
    fn insert(&self, entry: &SyncQueueEntry) -> Result<()>;

    /// Get an entry by ID
    fn get(&self, tenant: &TenantId, id: &SyncEntryId) -> Result<Option<SyncQueueEntry>>;

    /// List entries with the given status, oldest first
    fn list_by_status(&self, tenant: &TenantId, status: SyncStatus)
        -> Result<Vec<SyncQueueEntry>>;

    /// Transition one entry; returns false when the entry does not exist
    fn update_status(
        &self,
        tenant: &TenantId,
        id: &SyncEntryId,
        status: SyncStatus,
        error: Option<&str>,
    ) -> Result<bool>;

    /// Delete one entry; returns false when the entry does not exist
    fn remove(&self, tenant: &TenantId, id: &SyncEntryId) -> Result<bool>;

    /// Count entries per status
    fn counts(&self, tenant: &TenantId) -> Result<QueueCounts>;

    /// Move every `Processing` entry back to `Pending`
    fn requeue_processing(&self, tenant: &TenantId) -> Result<usize>;

    /// Move every `Failed` entry back to `Pending` with a fresh retry budget
    fn requeue_failed(&self, tenant: &TenantId) -> Result<usize>;

    /// Delete every `Synced` entry
    fn purge_synced(&self, tenant: &TenantId) -> Result<usize>;

    /// Whether a `Pending` entry newer than `timestamp` exists
    fn has_pending_after(&self, tenant: &TenantId, timestamp: i64) -> Result<bool>;

    /// `Pending` entries with a timestamp strictly after `timestamp`, oldest first
    fn list_pending_after(&self, tenant: &TenantId, timestamp: i64)
        -> Result<Vec<SyncQueueEntry>>;
}

/// `SQLite` implementation of `SyncQueueRepository`
pub struct SqliteSyncQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteSyncQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an entry from a database row
    fn parse_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<SyncQueueEntry> {
        let id: String = row.get(0)?;
        let tenant_id: String = row.get(1)?;
        let operation_type: String = row.get(4)?;
        let status: String = row.get(7)?;

        Ok(SyncQueueEntry {
            id: id.parse().map_err(|error| conversion_error(0, error))?,
            tenant_id: TenantId::new(tenant_id).map_err(|error| conversion_error(1, error))?,
            entity_type: row.get::<_, String>(2)?.into(),
            entity_id: row.get(3)?,
            operation_type: operation_type
                .parse()
                .map_err(|error| conversion_error(4, error))?,
            payload: row.get(5)?,
            timestamp: row.get(6)?,
            status: status.parse().map_err(|error| conversion_error(7, error))?,
            attempts: row.get(8)?,
            last_attempt: row.get(9)?,
            error: row.get(10)?,
        })
    }
}

fn conversion_error<E>(column: usize, error: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(error))
}

impl SyncQueueRepository for SqliteSyncQueueRepository<'_> {
    fn insert(&self, entry: &SyncQueueEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO sync_queue
                (id, tenant_id, entity_type, entity_id, operation_type, payload,
                 timestamp, status, attempts, last_attempt, error)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.id.as_str(),
                entry.tenant_id.as_str(),
                entry.entity_type.as_str(),
                entry.entity_id,
                entry.operation_type.as_str(),
                entry.payload,
                entry.timestamp,
                entry.status.as_str(),
                entry.attempts,
                entry.last_attempt,
                entry.error,
            ],
        )?;
        Ok(())
    }

    fn get(&self, tenant: &TenantId, id: &SyncEntryId) -> Result<Option<SyncQueueEntry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM sync_queue WHERE tenant_id = ? AND id = ?"),
                params![tenant.as_str(), id.as_str()],
                Self::parse_entry,
            )
            .optional()?;

        Ok(entry)
    }

    fn list_by_status(
        &self,
        tenant: &TenantId,
        status: SyncStatus,
    ) -> Result<Vec<SyncQueueEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS}
             FROM sync_queue
             WHERE tenant_id = ? AND status = ?
             ORDER BY timestamp ASC, rowid ASC"
        ))?;

        let entries = stmt
            .query_map(params![tenant.as_str(), status.as_str()], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    fn update_status(
        &self,
        tenant: &TenantId,
        id: &SyncEntryId,
        status: SyncStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        let entering_processing = status == SyncStatus::Processing;
        let clears_error = status == SyncStatus::Synced;

        let rows = self.conn.execute(
            "UPDATE sync_queue
             SET status = ?1,
                 attempts = attempts + CASE WHEN ?2 THEN 1 ELSE 0 END,
                 last_attempt = CASE WHEN ?2 THEN ?3 ELSE last_attempt END,
                 error = CASE WHEN ?4 THEN NULL ELSE COALESCE(?5, error) END
             WHERE tenant_id = ?6 AND id = ?7",
            params![
                status.as_str(),
                entering_processing,
                now_millis(),
                clears_error,
                error,
                tenant.as_str(),
                id.as_str(),
            ],
        )?;

        Ok(rows > 0)
    }

    fn remove(&self, tenant: &TenantId, id: &SyncEntryId) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM sync_queue WHERE tenant_id = ? AND id = ?",
            params![tenant.as_str(), id.as_str()],
        )?;
        Ok(rows > 0)
    }

    fn counts(&self, tenant: &TenantId) -> Result<QueueCounts> {
        let mut stmt = self.conn.prepare(
            "SELECT status, COUNT(*) FROM sync_queue WHERE tenant_id = ? GROUP BY status",
        )?;
        let rows = stmt
            .query_map(params![tenant.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut counts = QueueCounts::default();
        for (status, count) in rows {
            match status.parse::<SyncStatus>()? {
                SyncStatus::Pending => counts.pending = count,
                SyncStatus::Processing => counts.processing = count,
                SyncStatus::Synced => counts.synced = count,
                SyncStatus::Failed => counts.failed = count,
            }
        }
        Ok(counts)
    }

    fn requeue_processing(&self, tenant: &TenantId) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE sync_queue SET status = 'pending'
             WHERE tenant_id = ? AND status = 'processing'",
            params![tenant.as_str()],
        )?;
        Ok(rows)
    }

    fn requeue_failed(&self, tenant: &TenantId) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE sync_queue SET status = 'pending', attempts = 0
             WHERE tenant_id = ? AND status = 'failed'",
            params![tenant.as_str()],
        )?;
        Ok(rows)
    }

    fn purge_synced(&self, tenant: &TenantId) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM sync_queue WHERE tenant_id = ? AND status = 'synced'",
            params![tenant.as_str()],
        )?;
        Ok(rows)
    }

    fn has_pending_after(&self, tenant: &TenantId, timestamp: i64) -> Result<bool> {
        let exists = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM sync_queue
                WHERE tenant_id = ? AND status = 'pending' AND timestamp > ?
            )",
            params![tenant.as_str(), timestamp],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn list_pending_after(
        &self,
        tenant: &TenantId,
        timestamp: i64,
    ) -> Result<Vec<SyncQueueEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS}
             FROM sync_queue
             WHERE tenant_id = ? AND status = 'pending' AND timestamp > ?
             ORDER BY timestamp ASC, rowid ASC"
        ))?;

        let entries = stmt
            .query_map(params![tenant.as_str(), timestamp], Self::parse_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{EntityType, NewSyncEntry, OperationType};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn tenant() -> TenantId {
        TenantId::new("acme").unwrap()
    }

    fn queue_account(repo: &SqliteSyncQueueRepository<'_>, entity_id: &str) -> SyncQueueEntry {
        let intent = NewSyncEntry::new(
            EntityType::Account,
            entity_id,
            OperationType::Create,
            json!({ "id": entity_id }),
        );
        let entry = SyncQueueEntry::from_new(tenant(), &intent).unwrap();
        repo.insert(&entry).unwrap();
        entry
    }

    #[test]
    fn test_insert_and_get() {
        let db = setup();
        let repo = SqliteSyncQueueRepository::new(db.connection());

        let entry = queue_account(&repo, "acc-1");
        let fetched = repo.get(&tenant(), &entry.id).unwrap().unwrap();
        assert_eq!(fetched, entry);
    }

    #[test]
    fn test_get_scoped_by_tenant() {
        let db = setup();
        let repo = SqliteSyncQueueRepository::new(db.connection());

        let entry = queue_account(&repo, "acc-1");
        let other = TenantId::new("globex").unwrap();
        assert!(repo.get(&other, &entry.id).unwrap().is_none());
        assert!(!repo
            .update_status(&other, &entry.id, SyncStatus::Synced, None)
            .unwrap());
    }

    #[test]
    fn test_list_pending_ordered_by_timestamp() {
        let db = setup();
        let repo = SqliteSyncQueueRepository::new(db.connection());

        let first = queue_account(&repo, "acc-1");
        let second = queue_account(&repo, "acc-2");
        let third = queue_account(&repo, "acc-3");

        let pending = repo.list_by_status(&tenant(), SyncStatus::Pending).unwrap();
        let ids = pending.iter().map(|entry| entry.id).collect::<Vec<_>>();
        assert_eq!(ids, vec![first.id, second.id, third.id]);
    }

    #[test]
    fn test_list_pending_empty_is_ok() {
        let db = setup();
        let repo = SqliteSyncQueueRepository::new(db.connection());
        assert!(repo
            .list_by_status(&tenant(), SyncStatus::Pending)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_processing_counts_attempts_and_failure_keeps_error() {
        let db = setup();
        let repo = SqliteSyncQueueRepository::new(db.connection());
        let entry = queue_account(&repo, "acc-1");

        assert!(repo
            .update_status(&tenant(), &entry.id, SyncStatus::Processing, None)
            .unwrap());
        assert!(repo
            .update_status(&tenant(), &entry.id, SyncStatus::Pending, Some("socket closed"))
            .unwrap());

        let fetched = repo.get(&tenant(), &entry.id).unwrap().unwrap();
        assert_eq!(fetched.status, SyncStatus::Pending);
        assert_eq!(fetched.attempts, 1);
        assert!(fetched.last_attempt.is_some());
        assert_eq!(fetched.error.as_deref(), Some("socket closed"));

        repo.update_status(&tenant(), &entry.id, SyncStatus::Synced, None)
            .unwrap();
        let fetched = repo.get(&tenant(), &entry.id).unwrap().unwrap();
        assert_eq!(fetched.status, SyncStatus::Synced);
        assert!(fetched.error.is_none());
    }

    #[test]
    fn test_update_missing_entry_returns_false() {
        let db = setup();
        let repo = SqliteSyncQueueRepository::new(db.connection());
        assert!(!repo
            .update_status(&tenant(), &SyncEntryId::new(), SyncStatus::Processing, None)
            .unwrap());
        assert!(!repo.remove(&tenant(), &SyncEntryId::new()).unwrap());
    }

    #[test]
    fn test_counts_and_maintenance() {
        let db = setup();
        let repo = SqliteSyncQueueRepository::new(db.connection());

        let a = queue_account(&repo, "acc-1");
        let b = queue_account(&repo, "acc-2");
        let c = queue_account(&repo, "acc-3");
        queue_account(&repo, "acc-4");

        repo.update_status(&tenant(), &a.id, SyncStatus::Processing, None)
            .unwrap();
        repo.update_status(&tenant(), &b.id, SyncStatus::Synced, None)
            .unwrap();
        repo.update_status(&tenant(), &c.id, SyncStatus::Failed, Some("rejected"))
            .unwrap();

        assert_eq!(
            repo.counts(&tenant()).unwrap(),
            QueueCounts {
                pending: 1,
                processing: 1,
                synced: 1,
                failed: 1,
            }
        );

        assert_eq!(repo.requeue_processing(&tenant()).unwrap(), 1);
        assert_eq!(repo.requeue_failed(&tenant()).unwrap(), 1);
        assert_eq!(repo.purge_synced(&tenant()).unwrap(), 1);

        let counts = repo.counts(&tenant()).unwrap();
        assert_eq!(counts.pending, 3);
        assert_eq!(counts.total(), 3);

        let retried = repo.get(&tenant(), &c.id).unwrap().unwrap();
        assert_eq!(retried.attempts, 0);
        assert_eq!(retried.error.as_deref(), Some("rejected"));
    }

    #[test]
    fn test_has_pending_after() {
        let db = setup();
        let repo = SqliteSyncQueueRepository::new(db.connection());

        let entry = queue_account(&repo, "acc-1");
        assert!(repo.has_pending_after(&tenant(), entry.timestamp - 1).unwrap());
        assert!(!repo.has_pending_after(&tenant(), entry.timestamp).unwrap());
    }

    #[test]
    fn test_list_pending_after_skips_older_entries() {
        let db = setup();
        let repo = SqliteSyncQueueRepository::new(db.connection());

        let first = queue_account(&repo, "acc-1");
        let second = queue_account(&repo, "acc-2");
        let third = queue_account(&repo, "acc-3");
        repo.update_status(&tenant(), &third.id, SyncStatus::Processing, None)
            .unwrap();

        let newer = repo.list_pending_after(&tenant(), first.timestamp).unwrap();
        assert_eq!(newer, vec![second]);
        assert!(repo
            .list_pending_after(&tenant(), third.timestamp)
            .unwrap()
            .is_empty());
    }
}
