use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use tenantsync_core::models::{OperationType, SyncStatus};

#[derive(Parser)]
#[command(name = "tenantsync")]
#[command(about = "Inspect and maintain local tenant sync queues")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Root directory holding tenant databases (overrides TENANTSYNC_DATA_DIR)
    #[arg(long, global = true, value_name = "PATH")]
    pub data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Queue a mutation for a tenant
    Enqueue {
        #[arg(long)]
        tenant: String,
        /// Entity type, e.g. Account or Transaction
        entity_type: String,
        entity_id: String,
        #[arg(value_enum)]
        operation: OperationArg,
        /// JSON object payload (defaults to {"id": <entity-id>})
        #[arg(long, value_name = "JSON")]
        payload: Option<String>,
    },
    /// List queued entries, oldest first
    #[command(alias = "list")]
    Pending {
        #[arg(long)]
        tenant: String,
        /// Status to list
        #[arg(long, value_enum, default_value_t = StatusArg::Pending)]
        status: StatusArg,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show per-status entry counts
    Status {
        #[arg(long)]
        tenant: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the status of one entry
    Mark {
        #[arg(long)]
        tenant: String,
        /// Entry ID or unique ID prefix
        id: String,
        #[arg(value_enum)]
        status: StatusArg,
        /// Error message to record
        #[arg(long)]
        error: Option<String>,
    },
    /// Return failed entries to pending with a fresh retry budget
    Retry {
        #[arg(long)]
        tenant: String,
    },
    /// Delete synced entries
    Purge {
        #[arg(long)]
        tenant: String,
    },
    /// List tenants with a local database
    Tenants {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a tenant's local database
    DeleteTenant { tenant: String },
    /// Check whether the backend is reachable
    Probe {
        /// Health URL (defaults to TENANTSYNC_PROBE_URL)
        url: Option<String>,
        /// Print the resulting connection health as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OperationArg {
    Create,
    Update,
    Delete,
}

impl From<OperationArg> for OperationType {
    fn from(value: OperationArg) -> Self {
        match value {
            OperationArg::Create => Self::Create,
            OperationArg::Update => Self::Update,
            OperationArg::Delete => Self::Delete,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Pending,
    Processing,
    Synced,
    Failed,
}

impl From<StatusArg> for SyncStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Pending => Self::Pending,
            StatusArg::Processing => Self::Processing,
            StatusArg::Synced => Self::Synced,
            StatusArg::Failed => Self::Failed,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
