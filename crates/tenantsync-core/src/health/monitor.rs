//! Connection health monitor
//!
//! Folds transport events and backend reachability into one
//! [`ConnectionHealth`] snapshot. Every change of the combined status is
//! published on a broadcast channel; identical inputs publish nothing.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::models::{BackendStatus, ConnectionHealth, HealthStatus, TransportStatus};

const TRANSITION_CAPACITY: usize = 32;

/// Lifecycle event reported by the realtime transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connecting,
    Open,
    Close,
    Error(String),
}

/// A change of the combined health status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthTransition {
    pub previous: HealthStatus,
    pub current: ConnectionHealth,
}

impl HealthTransition {
    pub const fn became_healthy(&self) -> bool {
        self.current.is_healthy()
    }
}

struct MonitorInner {
    state: Mutex<ConnectionHealth>,
    transitions: broadcast::Sender<HealthTransition>,
}

/// Shared, cheaply cloneable health monitor.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<MonitorInner>,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitor {
    pub fn new() -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CAPACITY);
        Self {
            inner: Arc::new(MonitorInner {
                state: Mutex::new(ConnectionHealth::default()),
                transitions,
            }),
        }
    }

    /// Receive every future health transition
    pub fn subscribe(&self) -> broadcast::Receiver<HealthTransition> {
        self.inner.transitions.subscribe()
    }

    pub fn current_health(&self) -> ConnectionHealth {
        *self.lock()
    }

    pub fn is_healthy(&self) -> bool {
        self.current_health().is_healthy()
    }

    pub fn on_transport_event(&self, event: TransportEvent) {
        let status = match event {
            TransportEvent::Connecting => TransportStatus::Connecting,
            TransportEvent::Open => TransportStatus::Connected,
            TransportEvent::Close => TransportStatus::Disconnected,
            TransportEvent::Error(message) => {
                tracing::warn!("Transport error: {}", message);
                TransportStatus::Disconnected
            }
        };
        self.set_transport_status(status);
    }

    /// Record the transport state. Losing the transport also marks the backend
    /// offline until reachability is confirmed again.
    pub fn set_transport_status(&self, transport_status: TransportStatus) {
        self.update(|health| {
            let backend_status = if transport_status == TransportStatus::Disconnected {
                BackendStatus::Offline
            } else {
                health.backend_status
            };
            ConnectionHealth::derive(transport_status, backend_status)
        });
    }

    pub fn set_backend_status(&self, backend_status: BackendStatus) {
        self.update(|health| ConnectionHealth::derive(health.transport_status, backend_status));
    }

    fn update(&self, apply: impl FnOnce(&ConnectionHealth) -> ConnectionHealth) {
        let mut health = self.lock();
        let next = apply(&health);
        let previous = health.health_status;
        *health = next;

        if previous == next.health_status {
            return;
        }

        tracing::info!(
            "Connection health {:?} -> {:?} (transport {:?}, backend {:?})",
            previous,
            next.health_status,
            next.transport_status,
            next.backend_status
        );
        // Published under the lock so subscribers see transitions in order.
        // No receivers is fine.
        let _ = self.inner.transitions.send(HealthTransition {
            previous,
            current: next,
        });
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionHealth> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
