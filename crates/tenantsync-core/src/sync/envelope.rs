//! JSON frames exchanged with the backend

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{SyncEntryId, SyncQueueEntry, TenantId};

/// Frame type carrying one queue entry to the backend
pub const PROCESS_SYNC_ENTRY: &str = "process_sync_entry";
/// Frame type the backend answers with once an entry is applied or rejected
pub const SYNC_ENTRY_ACK: &str = "sync_entry_ack";

#[derive(Serialize)]
struct OutboundFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    payload: &'a SyncQueueEntry,
}

#[derive(Deserialize)]
struct InboundFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

/// Backend verdict on one previously sent entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAck {
    pub id: SyncEntryId,
    pub tenant_id: TenantId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncAck {
    pub const fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Inbound frames the orchestrator understands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Ack(SyncAck),
    /// Any other frame type; not ours to handle
    Other(String),
}

/// Serialize `{"type":"process_sync_entry","payload":entry}`.
pub fn encode_entry(entry: &SyncQueueEntry) -> Result<String> {
    Ok(serde_json::to_string(&OutboundFrame {
        kind: PROCESS_SYNC_ENTRY,
        payload: entry,
    })?)
}

pub fn decode_message(raw: &str) -> Result<InboundMessage> {
    let frame: InboundFrame = serde_json::from_str(raw)?;
    if frame.kind != SYNC_ENTRY_ACK {
        return Ok(InboundMessage::Other(frame.kind));
    }

    let ack: SyncAck = serde_json::from_value(frame.payload).map_err(|error| {
        Error::InvalidInput(format!("malformed {SYNC_ENTRY_ACK} payload: {error}"))
    })?;
    Ok(InboundMessage::Ack(SyncAck {
        error: crate::util::normalize_text_option(ack.error),
        ..ack
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityType, NewSyncEntry, OperationType, SyncStatus};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn entry() -> SyncQueueEntry {
        let intent = NewSyncEntry::new(
            EntityType::Account,
            "acc-1",
            OperationType::Create,
            json!({ "id": "acc-1", "name": "Checking" }),
        );
        SyncQueueEntry::from_new(TenantId::new("acme").unwrap(), &intent).unwrap()
    }

    #[test]
    fn outbound_frame_wraps_entry() {
        let entry = entry();
        let frame: Value = serde_json::from_str(&encode_entry(&entry).unwrap()).unwrap();

        assert_eq!(frame["type"], "process_sync_entry");
        assert_eq!(frame["payload"]["id"], entry.id.to_string());
        assert_eq!(frame["payload"]["tenantId"], "acme");
        assert_eq!(frame["payload"]["entityType"], "Account");
        assert_eq!(frame["payload"]["entityId"], "acc-1");
        assert_eq!(frame["payload"]["operationType"], "CREATE");
        assert_eq!(frame["payload"]["payload"]["name"], "Checking");
        assert_eq!(frame["payload"]["status"], SyncStatus::Pending.as_str());
        assert_eq!(frame["payload"]["attempts"], 0);
    }

    #[test]
    fn decodes_successful_ack() {
        let id = SyncEntryId::new();
        let raw = json!({
            "type": "sync_entry_ack",
            "payload": { "id": id.to_string(), "tenantId": "acme" }
        })
        .to_string();

        let InboundMessage::Ack(ack) = decode_message(&raw).unwrap() else {
            panic!("expected ack");
        };
        assert_eq!(ack.id, id);
        assert!(ack.is_success());
    }

    #[test]
    fn blank_ack_error_counts_as_success() {
        let raw = json!({
            "type": "sync_entry_ack",
            "payload": { "id": SyncEntryId::new().to_string(), "tenantId": "acme", "error": "  " }
        })
        .to_string();

        let InboundMessage::Ack(ack) = decode_message(&raw).unwrap() else {
            panic!("expected ack");
        };
        assert!(ack.is_success());
    }

    #[test]
    fn unknown_frame_types_are_passed_through() {
        let message = decode_message(r#"{"type":"presence","payload":{}}"#).unwrap();
        assert_eq!(message, InboundMessage::Other("presence".to_string()));
    }

    #[test]
    fn malformed_ack_is_invalid_input() {
        let error = decode_message(r#"{"type":"sync_entry_ack","payload":{"id":"nope"}}"#)
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }
}
