//! tenantsync-core - local-first, multi-tenant sync layer
//!
//! Mutations are persisted to a per-tenant `SQLite` queue first and replayed
//! to the backend in order once the connection is healthy. The crate is
//! split into:
//!
//! - [`db`]: tenant storage registry, migrations and the queue repository
//! - [`services`]: async, tenant-scoped queue operations
//! - [`health`]: connection health monitor and backend availability prober
//! - [`sync`]: the orchestrator that reconciles and drains the queue

pub mod config;
pub mod db;
pub mod error;
pub mod health;
pub mod models;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{NewSyncEntry, SyncQueueEntry, SyncStatus, TenantId};
