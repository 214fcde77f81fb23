//! Error types for tenantsync-core

use thiserror::Error;

/// Result type alias using tenantsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tenantsync-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// No tenant database is open, or the open one belongs to another tenant
    #[error("No active tenant storage{}", .0.as_deref().map(|tenant| format!(" for tenant {tenant}")).unwrap_or_default())]
    StorageUnavailable(Option<String>),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Schema migration failed
    #[error("Migration to version {version} failed: {message}")]
    Migration { version: i32, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A blocking storage task panicked or was cancelled
    #[error("Storage task failed: {0}")]
    StorageTask(#[from] tokio::task::JoinError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport rejected or failed to deliver a frame
    #[error("Transport error: {0}")]
    Transport(String),

    /// Pulling the authoritative remote state failed
    #[error("Reconciliation error: {0}")]
    Reconciliation(String),

    /// Backend reachability probe failed
    #[error("Probe error: {0}")]
    Probe(String),
}

impl Error {
    /// Whether this error means there is no usable tenant handle.
    pub const fn is_storage_unavailable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_unavailable_message_names_tenant() {
        let error = Error::StorageUnavailable(Some("acme".to_string()));
        assert_eq!(error.to_string(), "No active tenant storage for tenant acme");
        assert!(error.is_storage_unavailable());

        let error = Error::StorageUnavailable(None);
        assert_eq!(error.to_string(), "No active tenant storage");
    }
}
