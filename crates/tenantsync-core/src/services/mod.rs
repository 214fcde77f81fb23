//! Async services layered over the tenant registry

mod sync_queue;

pub use sync_queue::SyncQueue;
