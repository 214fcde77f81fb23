use std::sync::Arc;

use tenantsync_core::config::SyncSettings;
use tenantsync_core::health::{AvailabilityProber, HealthMonitor, HttpReachabilityCheck};

use crate::error::CliError;

pub async fn run_probe(
    settings: &SyncSettings,
    url: Option<&str>,
    as_json: bool,
) -> Result<(), CliError> {
    let check = match url.map(str::trim).filter(|url| !url.is_empty()) {
        Some(url) => HttpReachabilityCheck::new(url, settings.probe_timeout)?,
        None => settings.reachability_check()?.ok_or(CliError::NoProbeUrl)?,
    };
    let url = check.url().to_string();

    let monitor = HealthMonitor::new();
    let prober = AvailabilityProber::new(monitor.clone(), Arc::new(check));
    let reachable = prober.check_availability(true).await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&monitor.current_health())?);
    }
    if !reachable {
        return Err(CliError::Unreachable(url));
    }
    if !as_json {
        println!("Backend reachable at {url}");
    }
    Ok(())
}
