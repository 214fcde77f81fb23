//! Tenant-scoped sync queue service shared by domain code and the orchestrator.

use crate::db::{QueueCounts, SqliteSyncQueueRepository, SyncQueueRepository, TenantRegistry};
use crate::models::{NewSyncEntry, SyncEntryId, SyncQueueEntry, SyncStatus, TenantId};
use crate::Result;

/// Thread-safe queue operations against the registry's open tenant.
#[derive(Clone)]
pub struct SyncQueue {
    registry: TenantRegistry,
}

impl SyncQueue {
    pub const fn new(registry: TenantRegistry) -> Self {
        Self { registry }
    }

    pub const fn registry(&self) -> &TenantRegistry {
        &self.registry
    }

    /// Queue a mutation intent for the open tenant.
    pub async fn enqueue(&self, new: NewSyncEntry) -> Result<SyncQueueEntry> {
        self.registry
            .with_active(move |tenant, db| {
                let entry = SyncQueueEntry::from_new(tenant.clone(), &new)?;
                SqliteSyncQueueRepository::new(db.connection()).insert(&entry)?;
                tracing::debug!(
                    "Queued {} {} {} for tenant {}",
                    entry.operation_type,
                    entry.entity_type,
                    entry.entity_id,
                    tenant
                );
                Ok(entry)
            })
            .await
    }

    /// Queue a mutation intent, failing unless `tenant` is the open tenant.
    pub async fn enqueue_for(&self, tenant: &TenantId, new: NewSyncEntry) -> Result<SyncQueueEntry> {
        let owner = tenant.clone();
        self.registry
            .with_tenant(tenant, move |db| {
                let entry = SyncQueueEntry::from_new(owner, &new)?;
                SqliteSyncQueueRepository::new(db.connection()).insert(&entry)?;
                Ok(entry)
            })
            .await
    }

    /// `Pending` entries, oldest first
    pub async fn list_pending(&self, tenant: &TenantId) -> Result<Vec<SyncQueueEntry>> {
        self.list_by_status(tenant, SyncStatus::Pending).await
    }

    /// `Pending` entries queued strictly after `timestamp`, oldest first
    pub async fn list_pending_after(
        &self,
        tenant: &TenantId,
        timestamp: i64,
    ) -> Result<Vec<SyncQueueEntry>> {
        self.with_repository(tenant, move |repo, tenant| {
            repo.list_pending_after(tenant, timestamp)
        })
        .await
    }

    pub async fn list_by_status(
        &self,
        tenant: &TenantId,
        status: SyncStatus,
    ) -> Result<Vec<SyncQueueEntry>> {
        self.with_repository(tenant, move |repo, tenant| repo.list_by_status(tenant, status))
            .await
    }

    /// Move an entry to `status`; false when it does not exist.
    pub async fn update_status(
        &self,
        tenant: &TenantId,
        id: &SyncEntryId,
        status: SyncStatus,
        error: Option<&str>,
    ) -> Result<bool> {
        let id = *id;
        let error = error.map(str::to_string);
        self.with_repository(tenant, move |repo, tenant| {
            repo.update_status(tenant, &id, status, error.as_deref())
        })
        .await
    }

    pub async fn get(&self, tenant: &TenantId, id: &SyncEntryId) -> Result<Option<SyncQueueEntry>> {
        let id = *id;
        self.with_repository(tenant, move |repo, tenant| repo.get(tenant, &id))
            .await
    }

    pub async fn remove(&self, tenant: &TenantId, id: &SyncEntryId) -> Result<bool> {
        let id = *id;
        self.with_repository(tenant, move |repo, tenant| repo.remove(tenant, &id))
            .await
    }

    pub async fn counts(&self, tenant: &TenantId) -> Result<QueueCounts> {
        self.with_repository(tenant, |repo, tenant| repo.counts(tenant))
            .await
    }

    /// Return entries stuck in `Processing` to `Pending`.
    pub async fn requeue_processing(&self, tenant: &TenantId) -> Result<usize> {
        self.with_repository(tenant, |repo, tenant| repo.requeue_processing(tenant))
            .await
    }

    /// Give `Failed` entries another retry budget.
    pub async fn requeue_failed(&self, tenant: &TenantId) -> Result<usize> {
        self.with_repository(tenant, |repo, tenant| repo.requeue_failed(tenant))
            .await
    }

    pub async fn purge_synced(&self, tenant: &TenantId) -> Result<usize> {
        self.with_repository(tenant, |repo, tenant| repo.purge_synced(tenant))
            .await
    }

    pub async fn has_pending_after(&self, tenant: &TenantId, timestamp: i64) -> Result<bool> {
        self.with_repository(tenant, move |repo, tenant| {
            repo.has_pending_after(tenant, timestamp)
        })
        .await
    }

    async fn with_repository<T, F>(&self, tenant: &TenantId, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&SqliteSyncQueueRepository<'_>, &TenantId) -> Result<T> + Send + 'static,
    {
        let owned = tenant.clone();
        self.registry
            .with_tenant(tenant, move |db| {
                f(&SqliteSyncQueueRepository::new(db.connection()), &owned)
            })
            .await
    }
}
