//! Tenant identifier model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Maximum accepted length of a tenant identifier.
const MAX_TENANT_ID_LEN: usize = 64;

/// Identifier of an isolated tenant (workspace) owning one local database.
///
/// The value doubles as the tenant's database file stem, so it is restricted
/// to ASCII alphanumerics plus `-`, `_` and `.` and may not start with `.`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Validate and wrap a tenant identifier.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(Error::InvalidInput(
                "tenant id must not be empty".to_string(),
            ));
        }
        if trimmed.len() > MAX_TENANT_ID_LEN {
            return Err(Error::InvalidInput(format!(
                "tenant id must be at most {MAX_TENANT_ID_LEN} characters"
            )));
        }
        if trimmed.starts_with('.') {
            return Err(Error::InvalidInput(
                "tenant id must not start with '.'".to_string(),
            ));
        }
        if let Some(invalid) = trimmed
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
        {
            return Err(Error::InvalidInput(format!(
                "tenant id contains invalid character {invalid:?}"
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TenantId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for TenantId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}
