//! Seams to the realtime transport and the remote source of truth

use async_trait::async_trait;

use crate::models::TenantId;
use crate::Result;

/// Bidirectional realtime connection to the backend.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Whether a frame can be sent right now
    fn is_ready(&self) -> bool;

    /// Send one serialized frame
    async fn send(&self, frame: String) -> Result<()>;
}

/// Pulls authoritative remote state into local storage before a drain.
#[async_trait]
pub trait Reconciler: Send + Sync {
    async fn pull_latest(&self, tenant: &TenantId) -> Result<()>;
}

/// Reconciler for deployments without a pull step
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopReconciler;

#[async_trait]
impl Reconciler for NoopReconciler {
    async fn pull_latest(&self, _tenant: &TenantId) -> Result<()> {
        Ok(())
    }
}
