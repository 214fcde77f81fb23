//! tenantsync CLI - inspect and maintain local tenant sync queues
//!
//! Works directly on the per-tenant databases; it never talks to the
//! realtime backend except for `probe`.

mod cli;
mod commands;
mod error;

use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::load_settings;
use crate::commands::completions::run_completions;
use crate::commands::enqueue::run_enqueue;
use crate::commands::maintenance::{run_purge, run_retry};
use crate::commands::mark::run_mark;
use crate::commands::pending::run_pending;
use crate::commands::probe::run_probe;
use crate::commands::status::run_status;
use crate::commands::tenants::{run_delete_tenant, run_tenants};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "tenantsync=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Completions need no configuration
    if let Commands::Completions { shell, output } = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let settings = load_settings(cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Enqueue {
            tenant,
            entity_type,
            entity_id,
            operation,
            payload,
        } => {
            run_enqueue(
                &settings,
                &tenant,
                &entity_type,
                &entity_id,
                operation,
                payload.as_deref(),
            )
            .await?;
        }
        Commands::Pending {
            tenant,
            status,
            json,
        } => run_pending(&settings, &tenant, status, json).await?,
        Commands::Status { tenant, json } => run_status(&settings, &tenant, json).await?,
        Commands::Mark {
            tenant,
            id,
            status,
            error,
        } => run_mark(&settings, &tenant, &id, status, error.as_deref()).await?,
        Commands::Retry { tenant } => run_retry(&settings, &tenant).await?,
        Commands::Purge { tenant } => run_purge(&settings, &tenant).await?,
        Commands::Tenants { json } => run_tenants(&settings, json)?,
        Commands::DeleteTenant { tenant } => run_delete_tenant(&settings, &tenant).await?,
        Commands::Probe { url, json } => run_probe(&settings, url.as_deref(), json).await?,
        Commands::Completions { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests;
