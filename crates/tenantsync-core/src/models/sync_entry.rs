//! Sync queue entry model

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::util::next_monotonic_millis;

use super::tenant::TenantId;

/// A unique identifier for a queue entry, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncEntryId(Uuid);

impl SyncEntryId {
    /// Create a new unique entry ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SyncEntryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SyncEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SyncEntryId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Kind of domain object a queue entry mutates
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    Account,
    AccountGroup,
    Category,
    CategoryGroup,
    Transaction,
    Payee,
    Budget,
    /// Domain types not known to this crate, stored by name
    Other(String),
}

impl EntityType {
    /// Stable name used on the wire and in storage
    pub fn as_str(&self) -> &str {
        match self {
            Self::Account => "Account",
            Self::AccountGroup => "AccountGroup",
            Self::Category => "Category",
            Self::CategoryGroup => "CategoryGroup",
            Self::Transaction => "Transaction",
            Self::Payee => "Payee",
            Self::Budget => "Budget",
            Self::Other(name) => name,
        }
    }
}

impl From<String> for EntityType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Account" => Self::Account,
            "AccountGroup" => Self::AccountGroup,
            "Category" => Self::Category,
            "CategoryGroup" => Self::CategoryGroup,
            "Transaction" => Self::Transaction,
            "Payee" => Self::Payee,
            "Budget" => Self::Budget,
            _ => Self::Other(value),
        }
    }
}

impl From<EntityType> for String {
    fn from(value: EntityType) -> Self {
        match value {
            EntityType::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutation kind carried by a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    Create,
    Update,
    Delete,
}

impl OperationType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Self::Create),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(Error::InvalidInput(format!(
                "unknown operation type: {other}"
            ))),
        }
    }
}

/// Delivery status of a queue entry
///
/// `Pending -> Processing -> Synced`, with `Processing -> Pending` on a failed
/// send and `Processing -> Failed` once the retry budget is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Processing,
    Synced,
    Failed,
}

impl SyncStatus {
    pub const ALL: [Self; 4] = [Self::Pending, Self::Processing, Self::Synced, Self::Failed];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Synced => "synced",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "synced" => Ok(Self::Synced),
            "failed" => Ok(Self::Failed),
            other => Err(Error::InvalidInput(format!("unknown sync status: {other}"))),
        }
    }
}

/// A mutation intent as submitted by a domain service, before it is queued
#[derive(Debug, Clone, PartialEq)]
pub struct NewSyncEntry {
    pub entity_type: EntityType,
    pub entity_id: String,
    pub operation_type: OperationType,
    pub payload: Value,
}

impl NewSyncEntry {
    pub fn new(
        entity_type: EntityType,
        entity_id: impl Into<String>,
        operation_type: OperationType,
        payload: Value,
    ) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            operation_type,
            payload,
        }
    }

    /// A delete intent; the payload only carries the id.
    pub fn delete(entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        let entity_id = entity_id.into();
        let payload = json!({ "id": entity_id });
        Self::new(entity_type, entity_id, OperationType::Delete, payload)
    }

    /// Check the intent and produce the payload that will be persisted.
    pub(crate) fn validated_payload(&self) -> Result<Value> {
        if self.entity_id.trim().is_empty() {
            return Err(Error::InvalidInput(
                "entity id must not be empty".to_string(),
            ));
        }
        if self.entity_type.as_str().trim().is_empty() {
            return Err(Error::InvalidInput(
                "entity type must not be empty".to_string(),
            ));
        }

        match self.operation_type {
            OperationType::Delete => Ok(json!({ "id": self.entity_id })),
            OperationType::Create | OperationType::Update => {
                if self.payload.is_object() {
                    Ok(self.payload.clone())
                } else {
                    Err(Error::InvalidInput(format!(
                        "{} payload for {} must be a JSON object",
                        self.operation_type, self.entity_type
                    )))
                }
            }
        }
    }
}

/// One durable, at-least-once mutation intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncQueueEntry {
    pub id: SyncEntryId,
    pub tenant_id: TenantId,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub operation_type: OperationType,
    pub payload: Value,
    /// Creation time (Unix ms, strictly increasing within a process)
    pub timestamp: i64,
    pub status: SyncStatus,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_attempt: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncQueueEntry {
    /// Materialize a queued entry for `tenant_id` from a validated intent
    pub(crate) fn from_new(tenant_id: TenantId, new: &NewSyncEntry) -> Result<Self> {
        let payload = new.validated_payload()?;
        Ok(Self {
            id: SyncEntryId::new(),
            tenant_id,
            entity_type: new.entity_type.clone(),
            entity_id: new.entity_id.trim().to_string(),
            operation_type: new.operation_type,
            payload,
            timestamp: next_monotonic_millis(),
            status: SyncStatus::Pending,
            attempts: 0,
            last_attempt: None,
            error: None,
        })
    }
}
