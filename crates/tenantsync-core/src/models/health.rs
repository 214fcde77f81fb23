//! Connection health model

use serde::{Deserialize, Serialize};

/// Connection state reported by the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// Whether the backend is confirmed reachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendStatus {
    #[default]
    Offline,
    Online,
}

impl From<bool> for BackendStatus {
    fn from(reachable: bool) -> Self {
        if reachable {
            Self::Online
        } else {
            Self::Offline
        }
    }
}

/// Combined health signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    #[default]
    Unhealthy,
    Reconnecting,
}

/// Snapshot of transport, backend and combined health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionHealth {
    pub transport_status: TransportStatus,
    pub backend_status: BackendStatus,
    pub health_status: HealthStatus,
}

impl ConnectionHealth {
    /// Compose a snapshot from its two inputs.
    pub const fn derive(transport_status: TransportStatus, backend_status: BackendStatus) -> Self {
        let health_status = match (transport_status, backend_status) {
            (TransportStatus::Connected, BackendStatus::Online) => HealthStatus::Healthy,
            (TransportStatus::Connecting, _) => HealthStatus::Reconnecting,
            _ => HealthStatus::Unhealthy,
        };
        Self {
            transport_status,
            backend_status,
            health_status,
        }
    }

    pub const fn is_healthy(&self) -> bool {
        matches!(self.health_status, HealthStatus::Healthy)
    }
}
