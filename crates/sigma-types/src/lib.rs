#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **sigma-types** – Shared data model for the Sigma data gateway.
//!
//! This crate is dependency-light and sits at the bottom of the crate graph
//! so that every other Sigma crate can depend on it without causing cycles.
//! It defines the document row, endpoint descriptor, filter tree, and the
//! small value types that travel between the filter pipeline, the
//! repository, and the write orchestrator. It makes no assumptions about
//! SQL, HTTP, or the config store's wire format.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod document;
pub mod endpoint;
pub mod filter;

pub use document::{AuditContext, Document, DocumentId, SequenceCheckpoint};
pub use endpoint::{Endpoint, EndpointKind, FilterConfig, SchemaRef};
pub use filter::{FilterTree, LogicalOp, Operator, SortOrder};

/// Name of a logical collection (`table_name` in the physical schema).
pub type Collection = String;

/// Sub-entity array element inside `data.<field>`.
///
/// `myId` is assigned once, never reused; deletion is logical via
/// `isDeleted`, never a slot removal (spec invariant 9).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubEntityItem {
    /// Stable identifier, unique within the owning array.
    #[serde(rename = "myId")]
    pub my_id: String,
    /// Logical deletion flag.
    #[serde(rename = "isDeleted")]
    pub is_deleted: bool,
    /// The remaining, caller-defined fields of the entry.
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
}

/// Outcome of a single write operation, independent of the HTTP envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WriteOutcome {
    /// A `POST` created one or more documents.
    #[serde(rename = "CREATE")]
    Create {
        /// Server-assigned ids of the inserted documents.
        inserted_ids: Vec<DocumentId>,
    },
    /// A `PATCH` updated zero or more matching documents.
    #[serde(rename = "UPDATE")]
    Update {
        /// Number of documents the filter matched.
        matched: u64,
        /// Number of documents whose persisted state actually changed.
        modified: u64,
        /// Present when `modified == 0` due to no-op detection.
        message: Option<String>,
    },
    /// A `PUT` inserted or updated exactly one document.
    #[serde(rename = "UPSERT")]
    Upsert {
        /// Whether the row was newly inserted (`true`) or updated (`false`).
        was_inserted: bool,
        /// Id of the affected document.
        document_id: DocumentId,
        /// Matched/modified counts, mirroring UPDATE semantics for the
        /// updated-in-place case.
        matched: u64,
        /// Number of documents whose persisted state actually changed.
        modified: u64,
    },
    /// A `DELETE` soft-deleted zero or more documents.
    #[serde(rename = "DELETE")]
    Delete {
        /// Number of documents flipped to `is_deleted = true`.
        deleted_count: u64,
    },
}

/// A single change-feed event surfaced by the sequence-based feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// The kind of mutation that produced this event.
    pub op: ChangeOp,
    /// Primary key of the affected document.
    pub key: DocumentId,
    /// Document body at the time of the event (`None` for pure deletes of
    /// rows that have since been purged — never the case for soft delete,
    /// kept for forward compatibility with hard-delete dialects).
    pub doc: Option<Value>,
    /// Monotonic sequence number assigned by the database.
    pub sequence: i64,
    /// Timestamp the mutation committed.
    pub committed_at: DateTime<Utc>,
}

/// Discriminates the kind of mutation behind a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    /// Row inserted.
    Create,
    /// Row updated in place.
    Update,
    /// Row soft-deleted.
    Delete,
}

/// Ordered `sort: {field: ±1}` map, preserving the caller's insertion order
/// (spec §4.5 "Options").
pub type SortSpec = IndexMap<String, SortOrder>;

/// `projection: {field: 0|1}` — whether to include or exclude fields from
/// the response, applied best-effort post-fetch on the JSON column.
pub type ProjectionSpec = IndexMap<String, bool>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_entity_item_round_trips_through_json() {
        let item = SubEntityItem {
            my_id: "A".into(),
            is_deleted: false,
            fields: BTreeMap::from([("qty".to_string(), Value::from(5))]),
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["myId"], "A");
        assert_eq!(json["qty"], 5);
        let back: SubEntityItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn write_outcome_tags_match_spec_wire_names() {
        let outcome = WriteOutcome::Upsert {
            was_inserted: true,
            document_id: DocumentId::from("abc"),
            matched: 0,
            modified: 0,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["type"], "UPSERT");
        assert_eq!(json["wasInserted"], true);
    }
}
