//! Sync orchestrator
//!
//! Drains the open tenant's queue whenever connection health becomes
//! Healthy: reconcile with the backend first, return stale `Processing`
//! entries to `Pending`, then send every `Pending` entry in timestamp order,
//! one at a time. Backend acknowledgements finish entries off.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::health::{HealthMonitor, HealthTransition};
use crate::models::{SyncQueueEntry, SyncStatus, TenantId};
use crate::services::SyncQueue;
use crate::util::next_monotonic_millis;

use super::envelope::{decode_message, encode_entry, InboundMessage, SyncAck};
use super::transport::{Reconciler, Transport};

/// Default upper bound on one transport send
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);
/// Default number of attempts before an entry is parked as `Failed`
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Initial pass plus at most one follow-up for entries queued mid-drain
const MAX_PASSES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub send_timeout: Duration,
    /// `0` retries forever
    pub max_attempts: u32,
    /// Keep acknowledged entries as `Synced` instead of deleting them
    pub retain_synced: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            send_timeout: DEFAULT_SEND_TIMEOUT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retain_synced: false,
        }
    }
}

impl OrchestratorConfig {
    /// Status for an entry whose `attempts`-th send just failed
    const fn status_after_failure(&self, attempts: u32) -> SyncStatus {
        if self.max_attempts > 0 && attempts >= self.max_attempts {
            SyncStatus::Failed
        } else {
            SyncStatus::Pending
        }
    }
}

/// Why a trigger did not drain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Unhealthy,
    NoActiveTenant,
    AlreadyDraining,
}

/// Totals for one drain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DrainReport {
    pub tenant_id: TenantId,
    /// Stale `Processing` entries returned to `Pending` before draining
    pub requeued: usize,
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub passes: u32,
}

impl DrainReport {
    const fn new(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            requeued: 0,
            sent: 0,
            failed: 0,
            skipped: 0,
            passes: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Drained(DrainReport),
    Skipped(SkipReason),
    /// Reconciliation failed; no queue entry was touched
    ReconciliationFailed { tenant_id: TenantId, error: String },
}

/// Releases a tenant's in-flight claim when dropped.
struct DrainGuard<'a> {
    in_flight: &'a Mutex<HashSet<TenantId>>,
    tenant: TenantId,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.tenant);
    }
}

pub struct SyncOrchestrator {
    queue: SyncQueue,
    monitor: HealthMonitor,
    transport: Arc<dyn Transport>,
    reconciler: Arc<dyn Reconciler>,
    config: OrchestratorConfig,
    in_flight: Mutex<HashSet<TenantId>>,
}

impl SyncOrchestrator {
    pub fn new(
        queue: SyncQueue,
        monitor: HealthMonitor,
        transport: Arc<dyn Transport>,
        reconciler: Arc<dyn Reconciler>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            queue,
            monitor,
            transport,
            reconciler,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub const fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Subscribe to the monitor and drive drains from a background task.
    ///
    /// The subscription is taken before this returns, so no transition that
    /// happens afterwards is missed.
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        let transitions = self.monitor.subscribe();
        tokio::spawn(Arc::clone(self).run(transitions))
    }

    /// Drain on every transition into Healthy until the channel closes.
    pub async fn run(self: Arc<Self>, mut transitions: broadcast::Receiver<HealthTransition>) {
        loop {
            match transitions.recv().await {
                Ok(transition) if transition.became_healthy() => {
                    self.spawn_drain();
                }
                Ok(_) => {}
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!("Missed {} health transitions", missed);
                    if self.monitor.is_healthy() {
                        self.spawn_drain();
                    }
                }
                Err(RecvError::Closed) => break,
            }
        }
        tracing::debug!("Health channel closed; orchestrator stopped");
    }

    fn spawn_drain(self: &Arc<Self>) {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            match orchestrator.trigger_drain().await {
                Ok(DrainOutcome::Drained(report)) => tracing::info!(
                    "Drained tenant {}: {} sent, {} failed, {} skipped",
                    report.tenant_id,
                    report.sent,
                    report.failed,
                    report.skipped
                ),
                Ok(_) => {}
                Err(error) => tracing::warn!("Drain aborted: {}", error),
            }
        });
    }

    /// Drain the open tenant's queue now.
    ///
    /// Does nothing while unhealthy or while another drain for the same
    /// tenant is running.
    pub async fn trigger_drain(&self) -> Result<DrainOutcome> {
        if !self.monitor.is_healthy() {
            tracing::debug!("Connection not healthy; skipping drain");
            return Ok(DrainOutcome::Skipped(SkipReason::Unhealthy));
        }

        // Bound for the whole drain, even if another tenant is opened meanwhile
        let Some(tenant) = self.queue.registry().current_tenant().await else {
            tracing::debug!("No open tenant; skipping drain");
            return Ok(DrainOutcome::Skipped(SkipReason::NoActiveTenant));
        };

        let Some(_guard) = self.claim(&tenant) else {
            tracing::debug!("Drain already in flight for tenant {}; dropping trigger", tenant);
            return Ok(DrainOutcome::Skipped(SkipReason::AlreadyDraining));
        };

        if let Err(error) = self.reconciler.pull_latest(&tenant).await {
            tracing::warn!(
                "Reconciliation failed for tenant {}; drain postponed: {}",
                tenant,
                error
            );
            return Ok(DrainOutcome::ReconciliationFailed {
                tenant_id: tenant,
                error: error.to_string(),
            });
        }

        let mut report = DrainReport::new(tenant.clone());
        report.requeued = self.queue.requeue_processing(&tenant).await?;
        if report.requeued > 0 {
            tracing::info!(
                "Returned {} unacknowledged entries to pending for tenant {}",
                report.requeued,
                tenant
            );
        }

        // Follow-up passes only pick up entries queued after the previous
        // pass started; failures from earlier passes wait for the next trigger
        let mut since = None;
        loop {
            let watermark = next_monotonic_millis();
            self.drain_pass(&tenant, since, &mut report).await?;
            report.passes += 1;

            if report.passes >= MAX_PASSES || !self.monitor.is_healthy() {
                break;
            }
            if !self.queue.has_pending_after(&tenant, watermark).await? {
                break;
            }
            tracing::debug!("Entries queued during drain for tenant {}; draining again", tenant);
            since = Some(watermark);
        }

        Ok(DrainOutcome::Drained(report))
    }

    async fn drain_pass(
        &self,
        tenant: &TenantId,
        since: Option<i64>,
        report: &mut DrainReport,
    ) -> Result<()> {
        let pending = match since {
            Some(watermark) => self.queue.list_pending_after(tenant, watermark).await?,
            None => self.queue.list_pending(tenant).await?,
        };
        if pending.is_empty() {
            tracing::debug!("Nothing to sync for tenant {}", tenant);
            return Ok(());
        }

        for entry in pending {
            match self
                .queue
                .update_status(tenant, &entry.id, SyncStatus::Processing, None)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!("Entry {} disappeared before send; skipping", entry.id);
                    report.skipped += 1;
                    continue;
                }
                // The tenant was closed underneath us; leave everything as it is
                Err(error) if error.is_storage_unavailable() => return Err(error),
                Err(error) => {
                    tracing::warn!("Could not mark entry {} as processing: {}", entry.id, error);
                    report.skipped += 1;
                    continue;
                }
            }

            match self.send(&entry).await {
                Ok(()) => report.sent += 1,
                Err(error) => {
                    self.record_send_failure(tenant, &entry, &error).await?;
                    report.failed += 1;
                }
            }
        }

        Ok(())
    }

    async fn send(&self, entry: &SyncQueueEntry) -> Result<()> {
        let frame = encode_entry(entry)?;
        if !self.transport.is_ready() {
            return Err(Error::Transport("transport is not ready".to_string()));
        }

        tokio::time::timeout(self.config.send_timeout, self.transport.send(frame))
            .await
            .unwrap_or_else(|_| {
                Err(Error::Transport(format!(
                    "send timed out after {:?}",
                    self.config.send_timeout
                )))
            })
    }

    async fn record_send_failure(
        &self,
        tenant: &TenantId,
        entry: &SyncQueueEntry,
        error: &Error,
    ) -> Result<()> {
        let attempts = entry.attempts + 1;
        let status = self.config.status_after_failure(attempts);
        tracing::error!(
            "Failed to send {} {} {} (entry {}, attempt {}): {}",
            entry.operation_type,
            entry.entity_type,
            entry.entity_id,
            entry.id,
            attempts,
            error
        );

        let message = error.to_string();
        match self
            .queue
            .update_status(tenant, &entry.id, status, Some(&message))
            .await
        {
            Ok(_) => Ok(()),
            Err(error) if error.is_storage_unavailable() => Err(error),
            Err(error) => {
                tracing::warn!("Could not record failure for entry {}: {}", entry.id, error);
                Ok(())
            }
        }
    }

    /// Consume one inbound frame from the transport.
    ///
    /// Returns the acknowledgement when the frame was one; other frame types
    /// are ignored.
    pub async fn handle_message(&self, raw: &str) -> Result<Option<SyncAck>> {
        let ack = match decode_message(raw)? {
            InboundMessage::Ack(ack) => ack,
            InboundMessage::Other(kind) => {
                tracing::debug!("Ignoring inbound frame of type {}", kind);
                return Ok(None);
            }
        };

        let tenant = &ack.tenant_id;
        let known = match &ack.error {
            None => self.acknowledge(tenant, &ack).await?,
            Some(error) => self.reject(tenant, &ack, error).await?,
        };
        if !known {
            tracing::warn!("Acknowledgement for unknown entry {} of tenant {}", ack.id, tenant);
        }

        Ok(Some(ack))
    }

    async fn acknowledge(&self, tenant: &TenantId, ack: &SyncAck) -> Result<bool> {
        if !self
            .queue
            .update_status(tenant, &ack.id, SyncStatus::Synced, None)
            .await?
        {
            return Ok(false);
        }
        if !self.config.retain_synced {
            self.queue.remove(tenant, &ack.id).await?;
        }
        tracing::debug!("Entry {} synced", ack.id);
        Ok(true)
    }

    async fn reject(&self, tenant: &TenantId, ack: &SyncAck, error: &str) -> Result<bool> {
        let Some(entry) = self.queue.get(tenant, &ack.id).await? else {
            return Ok(false);
        };

        let status = self.config.status_after_failure(entry.attempts);
        tracing::error!("Backend rejected entry {} ({}): {}", ack.id, status, error);
        self.queue
            .update_status(tenant, &ack.id, status, Some(error))
            .await
    }

    fn claim(&self, tenant: &TenantId) -> Option<DrainGuard<'_>> {
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(tenant.clone()) {
            return None;
        }
        Some(DrainGuard {
            in_flight: &self.in_flight,
            tenant: tenant.clone(),
        })
    }
}
