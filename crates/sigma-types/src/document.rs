//! The document row and the small value types that travel with it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque primary key of a [`Document`] row.
///
/// Physically a database-assigned integer or UUID depending on dialect;
/// kept as a string at this layer so callers never need to know which.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

impl DocumentId {
    /// Borrow the id as a plain string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single row of `dynamic_documents` (spec §3).
///
/// `data` is the schemaless user payload; every other field is system
/// managed and must never be set directly from client input (see
/// `sigma-gateway::write` sanitize step).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Server-assigned, unique row key.
    pub id: DocumentId,
    /// Logical collection this document belongs to.
    pub table_name: String,
    /// Schemaless JSON payload. Root is always an object.
    pub data: Value,
    /// Starts at 0, increases by exactly 1 on each effective mutation.
    pub version: i64,
    /// Soft-delete flag; reads filter to `false` unless bypassed.
    pub is_deleted: bool,
    /// Trace id of the last mutator, if any.
    pub latest_request_id: Option<String>,
    /// Auditor identity that created the row.
    pub created_by: Option<String>,
    /// Auditor identity that last modified the row.
    pub last_modified_by: Option<String>,
    /// Immutable after the first write.
    pub created_at: DateTime<Utc>,
    /// Advances only on an effective mutation.
    pub last_modified_at: DateTime<Utc>,
    /// Monotonic per-row-change counter assigned by the database.
    pub sequence_number: i64,
}

impl Document {
    /// Root object of `data`, or an empty map view if the root is somehow
    /// not an object (should never happen past schema validation, but the
    /// accessor stays defensive for rows written before a schema existed).
    pub fn data_object(&self) -> Option<&serde_json::Map<String, Value>> {
        self.data.as_object()
    }
}

/// Identity and trace context attached to every write (spec §9 "Audit
/// injection").
///
/// Computed once per request by the gateway and threaded down to the
/// repository layer; callers below the write orchestrator never construct
/// audit fields themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditContext {
    /// Opaque identity of the caller, from `current_auditor()` (spec §6).
    pub auditor: String,
    /// Value of the inbound `X-Request-ID` header, or a generated one.
    pub request_id: String,
}

/// Per-collection change-feed position, persisted so a consumer can resume
/// after a restart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceCheckpoint {
    /// Primary key: the collection this checkpoint tracks.
    pub collection: String,
    /// Last sequence number the consumer has durably processed.
    pub sequence: i64,
    /// Retained for wire compatibility; unused by sequence-trigger dialects
    /// (spec §9 open question).
    pub resume_token: Option<String>,
    /// When this checkpoint was last advanced.
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_id_displays_as_inner_string() {
        let id = DocumentId::from("abc-123");
        assert_eq!(id.to_string(), "abc-123");
        assert_eq!(id.as_str(), "abc-123");
    }

    #[test]
    fn document_serializes_with_expected_field_names() {
        let doc = Document {
            id: DocumentId::from("1"),
            table_name: "users".into(),
            data: serde_json::json!({"name": "Alice"}),
            version: 0,
            is_deleted: false,
            latest_request_id: None,
            created_by: None,
            last_modified_by: None,
            created_at: Utc::now(),
            last_modified_at: Utc::now(),
            sequence_number: 1,
        };
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["table_name"], "users");
        assert_eq!(json["data"]["name"], "Alice");
    }
}
