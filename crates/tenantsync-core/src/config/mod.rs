//! Runtime configuration for tenantsync.
//!
//! Settings come from `TENANTSYNC_*` environment variables. Parsing goes
//! through a lookup closure so it can be exercised without touching the
//! process environment.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::db::StorageRoot;
use crate::health::HttpReachabilityCheck;
use crate::sync::{OrchestratorConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_SEND_TIMEOUT};
use crate::util::{is_http_url, normalize_text_option};

pub const DATA_DIR_VAR: &str = "TENANTSYNC_DATA_DIR";
pub const PROBE_URL_VAR: &str = "TENANTSYNC_PROBE_URL";
pub const PROBE_INTERVAL_VAR: &str = "TENANTSYNC_PROBE_INTERVAL_SECS";
pub const PROBE_TIMEOUT_VAR: &str = "TENANTSYNC_PROBE_TIMEOUT_SECS";
pub const SEND_TIMEOUT_VAR: &str = "TENANTSYNC_SEND_TIMEOUT_SECS";
pub const MAX_ATTEMPTS_VAR: &str = "TENANTSYNC_MAX_ATTEMPTS";
pub const RETAIN_SYNCED_VAR: &str = "TENANTSYNC_RETAIN_SYNCED";

const APP_DIR_NAME: &str = "tenantsync";
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 30;
const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 4;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Could not determine a data directory; set {DATA_DIR_VAR}")]
    NoDataDir,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Root under which `tenants/<tenant>.db` files live
    pub data_dir: PathBuf,
    /// Health endpoint for the availability prober
    pub probe_url: Option<String>,
    pub probe_interval: Duration,
    pub probe_timeout: Duration,
    pub send_timeout: Duration,
    /// `0` retries forever
    pub max_attempts: u32,
    pub retain_synced: bool,
}

impl SyncSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = match optional_trimmed(&lookup, DATA_DIR_VAR) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir()?,
        };

        let probe_url = optional_trimmed(&lookup, PROBE_URL_VAR)
            .map(|url| url.trim_end_matches('/').to_string());
        if let Some(url) = probe_url.as_deref() {
            if !is_http_url(url) {
                return Err(ConfigError::Invalid(format!(
                    "{PROBE_URL_VAR} must start with http:// or https://"
                )));
            }
        }

        let probe_interval = positive_secs(&lookup, PROBE_INTERVAL_VAR, DEFAULT_PROBE_INTERVAL_SECS)?;
        let probe_timeout = positive_secs(&lookup, PROBE_TIMEOUT_VAR, DEFAULT_PROBE_TIMEOUT_SECS)?;
        let send_timeout = positive_secs(&lookup, SEND_TIMEOUT_VAR, DEFAULT_SEND_TIMEOUT.as_secs())?;

        let max_attempts = match optional_trimmed(&lookup, MAX_ATTEMPTS_VAR) {
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                ConfigError::Invalid(format!(
                    "{MAX_ATTEMPTS_VAR} must be a non-negative integer (0 = unlimited)"
                ))
            })?,
            None => DEFAULT_MAX_ATTEMPTS,
        };

        let retain_synced = match optional_trimmed(&lookup, RETAIN_SYNCED_VAR) {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                ConfigError::Invalid(format!("{RETAIN_SYNCED_VAR} must be true or false"))
            })?,
            None => false,
        };

        Ok(Self {
            data_dir,
            probe_url,
            probe_interval,
            probe_timeout,
            send_timeout,
            max_attempts,
            retain_synced,
        })
    }

    pub fn storage_root(&self) -> StorageRoot {
        StorageRoot::Directory(self.data_dir.clone())
    }

    pub const fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            send_timeout: self.send_timeout,
            max_attempts: self.max_attempts,
            retain_synced: self.retain_synced,
        }
    }

    /// HTTP reachability check for the configured probe URL, if any
    pub fn reachability_check(&self) -> crate::Result<Option<HttpReachabilityCheck>> {
        self.probe_url
            .as_deref()
            .map(|url| HttpReachabilityCheck::new(url, self.probe_timeout))
            .transpose()
    }
}

/// `<platform data dir>/tenantsync`
pub fn default_data_dir() -> Result<PathBuf, ConfigError> {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or(ConfigError::NoDataDir)
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}

fn positive_secs(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<Duration, ConfigError> {
    let Some(raw) = optional_trimmed(lookup, name) else {
        return Ok(Duration::from_secs(default));
    };
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::Invalid(format!(
            "{name} must be a positive number of seconds"
        ))),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Result<SyncSettings, ConfigError> {
        let map = pairs.iter().copied().collect::<HashMap<&str, &str>>();
        SyncSettings::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = settings(&[(DATA_DIR_VAR, "/var/lib/tenantsync")]).unwrap();

        assert_eq!(settings.data_dir, PathBuf::from("/var/lib/tenantsync"));
        assert_eq!(settings.probe_url, None);
        assert_eq!(settings.probe_interval, Duration::from_secs(30));
        assert_eq!(settings.probe_timeout, Duration::from_secs(4));
        assert_eq!(settings.orchestrator_config(), OrchestratorConfig::default());
    }

    #[test]
    fn overrides_are_parsed() {
        let settings = settings(&[
            (DATA_DIR_VAR, " /tmp/ts "),
            (PROBE_URL_VAR, "https://api.example.com/health/"),
            (PROBE_INTERVAL_VAR, "15"),
            (SEND_TIMEOUT_VAR, "3"),
            (MAX_ATTEMPTS_VAR, "0"),
            (RETAIN_SYNCED_VAR, "yes"),
        ])
        .unwrap();

        assert_eq!(settings.data_dir, PathBuf::from("/tmp/ts"));
        assert_eq!(
            settings.probe_url.as_deref(),
            Some("https://api.example.com/health")
        );
        assert_eq!(settings.probe_interval, Duration::from_secs(15));

        let config = settings.orchestrator_config();
        assert_eq!(config.send_timeout, Duration::from_secs(3));
        assert_eq!(config.max_attempts, 0);
        assert!(config.retain_synced);
        assert!(settings.reachability_check().unwrap().is_some());
    }

    #[test]
    fn rejects_non_http_probe_url() {
        let error = settings(&[(DATA_DIR_VAR, "/tmp/ts"), (PROBE_URL_VAR, "ws://example.com")])
            .unwrap_err();
        assert!(error.to_string().contains(PROBE_URL_VAR));
    }

    #[test]
    fn rejects_zero_timeouts() {
        let error = settings(&[(DATA_DIR_VAR, "/tmp/ts"), (SEND_TIMEOUT_VAR, "0")]).unwrap_err();
        assert!(error.to_string().contains(SEND_TIMEOUT_VAR));
    }

    #[test]
    fn rejects_unknown_bool() {
        let error =
            settings(&[(DATA_DIR_VAR, "/tmp/ts"), (RETAIN_SYNCED_VAR, "maybe")]).unwrap_err();
        assert!(error.to_string().contains(RETAIN_SYNCED_VAR));
    }
}
