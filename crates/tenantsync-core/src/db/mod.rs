//! Database layer for tenantsync

mod connection;
mod migrations;
mod queue_repository;
mod registry;

pub use connection::Database;
pub use migrations::CURRENT_VERSION as SCHEMA_VERSION;
pub use queue_repository::{QueueCounts, SqliteSyncQueueRepository, SyncQueueRepository};
pub use registry::{StorageRoot, TenantHandle, TenantRegistry};
