//! Data structures representing `HashiCorp` Vault audit log events.
//!
//! These types mirror the JSON structure written by Vault's socket
//! audit device, trimmed to the fields needed for request/response
//! correlation and metric labeling.

use serde::Deserialize;
use thiserror::Error;

/// Audit event type string for requests.
pub const EVENT_TYPE_REQUEST: &str = "request";
/// Audit event type string for responses.
pub const EVENT_TYPE_RESPONSE: &str = "response";

/// Failure to decode one audit log line.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed audit event: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Classification of one audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A request entering Vault.
    Request,
    /// A response leaving Vault.
    Response,
    /// Anything else; logged and discarded.
    Unknown,
}

/// One decoded audit log event.
///
/// Each line sent by the audit device is a JSON object that
/// deserializes into this structure. Vault writes lowercase field
/// names; the capitalized Go-marshaled form produced by some log
/// shippers is accepted via serde aliases.
///
/// Missing fields deserialize to their defaults rather than failing:
/// an empty label value is valid data, not an error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditEntry {
    #[serde(rename = "type", default)]
    pub entry_type: String, // "request" or "response"
    #[serde(default, alias = "Time")]
    pub time: String,
    #[serde(default, alias = "Request")]
    pub request: Option<RequestInfo>,
    /// Error message if the operation failed; empty or absent on success.
    #[serde(default, alias = "Error")]
    pub error: Option<String>,
}

/// Request details carried by both request and response events.
///
/// Vault responses embed the originating request object, which is how
/// a response is correlated back to its request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestInfo {
    /// Identifier shared by a request and its eventual response.
    #[serde(default, alias = "ID")]
    pub id: Option<String>,
    /// Operation type (e.g., "read", "update", "delete", "list")
    #[serde(default, alias = "Operation")]
    pub operation: Option<String>,
    /// Path being accessed (e.g., "secret/data/myapp/config")
    #[serde(default, alias = "Path")]
    pub path: Option<String>,
}

impl AuditEntry {
    /// Decode a single audit log line.
    pub fn from_line(line: &str) -> Result<Self, DecodeError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Classify this event by its `type` field.
    pub fn kind(&self) -> EventKind {
        match self.entry_type.as_str() {
            EVENT_TYPE_REQUEST => EventKind::Request,
            EVENT_TYPE_RESPONSE => EventKind::Response,
            _ => EventKind::Unknown,
        }
    }

    /// Get the request ID from this event
    pub fn request_id(&self) -> Option<&str> {
        self.request.as_ref()?.id.as_deref()
    }

    /// Metric label values `(operation, path, error)` for this event.
    ///
    /// Every metric series is dimensioned by exactly this tuple, so
    /// requests, responses, and latency observations for the same
    /// event always land on identically labeled series.
    pub fn labels(&self) -> [&str; 3] {
        let operation = self
            .request
            .as_ref()
            .and_then(|r| r.operation.as_deref())
            .unwrap_or("");
        let path = self
            .request
            .as_ref()
            .and_then(|r| r.path.as_deref())
            .unwrap_or("");
        let error = self.error.as_deref().unwrap_or("");
        [operation, path, error]
    }
}
