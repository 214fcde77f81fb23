//! Data models for tenantsync

mod health;
mod sync_entry;
mod tenant;

pub use health::{BackendStatus, ConnectionHealth, HealthStatus, TransportStatus};
pub use sync_entry::{
    EntityType, NewSyncEntry, OperationType, SyncEntryId, SyncQueueEntry, SyncStatus,
};
pub use tenant::TenantId;
