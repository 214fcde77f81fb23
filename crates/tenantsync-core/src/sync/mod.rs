//! Queue draining against the realtime backend

mod envelope;
mod orchestrator;
mod transport;

pub use envelope::{
    decode_message, encode_entry, InboundMessage, SyncAck, PROCESS_SYNC_ENTRY, SYNC_ENTRY_ACK,
};
pub use orchestrator::{
    DrainOutcome, DrainReport, OrchestratorConfig, SkipReason, SyncOrchestrator,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_SEND_TIMEOUT,
};
pub use transport::{NoopReconciler, Reconciler, Transport};
