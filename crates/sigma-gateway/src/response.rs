//! Response Builder: typed result → HTTP envelope (spec §4.10).
//!
//! Every document in a response body is its `data` payload with the
//! system-managed columns merged in under their own camelCase keys
//! (`id`, `version`, `createdAt`, ...) rather than nested under a
//! separate envelope key — callers read a document the same shape
//! whether it came from a query or a write's echoed body. This choice
//! isn't spelled out in spec.md; see `/root/crate/DESIGN.md`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{Map, Value};

use sigma_schema::{EnumBinding, EnumCatalog};
use sigma_types::{Document, WriteOutcome};

use crate::query::QueryOutcome;
use crate::timefmt::TimeFormat;

/// Render one [`Document`] as the JSON object clients see: `data`'s
/// top-level keys plus the system-managed fields, enum-enriched and
/// with timestamps rendered per `time_format`.
pub fn render_document(doc: &Document, bindings: &[EnumBinding], catalog: &EnumCatalog, time_format: TimeFormat) -> Value {
    let mut body = doc.data.clone();
    sigma_schema::enrich_document(&mut body, bindings, catalog);

    let map = match &mut body {
        Value::Object(map) => map,
        other => {
            // Schema validation guarantees an object root for create/upsert
            // bodies, but rows written before a schema existed might not be;
            // wrap defensively so the response is still well-formed JSON.
            let mut wrapped = Map::new();
            wrapped.insert("value".to_string(), other.clone());
            *other = Value::Object(wrapped);
            other.as_object_mut().unwrap()
        }
    };

    map.insert("id".to_string(), Value::String(doc.id.as_str().to_string()));
    map.insert("version".to_string(), Value::Number(doc.version.into()));
    map.insert("isDeleted".to_string(), Value::Bool(doc.is_deleted));
    map.insert("sequenceNumber".to_string(), Value::Number(doc.sequence_number.into()));
    map.insert("createdAt".to_string(), Value::String(time_format.render(doc.created_at)));
    map.insert("lastModifiedAt".to_string(), Value::String(time_format.render(doc.last_modified_at)));
    if let Some(created_by) = &doc.created_by {
        map.insert("createdBy".to_string(), Value::String(created_by.clone()));
    }
    if let Some(modified_by) = &doc.last_modified_by {
        map.insert("lastModifiedBy".to_string(), Value::String(modified_by.clone()));
    }
    if let Some(request_id) = &doc.latest_request_id {
        map.insert("latestRequestId".to_string(), Value::String(request_id.clone()));
    }
    body
}

/// Render a [`QueryOutcome`] (spec §4.10 "Lists of documents serialize
/// to a JSON array"; "Sequence responses include `{data, nextSequence,
/// hasMore}`").
pub fn render_query(outcome: QueryOutcome, bindings: &[EnumBinding], catalog: &EnumCatalog, time_format: TimeFormat) -> Response {
    match outcome {
        QueryOutcome::Documents(docs) => {
            let rendered: Vec<Value> = docs.iter().map(|d| render_document(d, bindings, catalog, time_format)).collect();
            (StatusCode::OK, Json(Value::Array(rendered))).into_response()
        }
        QueryOutcome::Sequence { data, next_sequence, has_more } => {
            let rendered: Vec<Value> = data.iter().map(|d| render_document(d, bindings, catalog, time_format)).collect();
            let body = serde_json::json!({
                "data": rendered,
                "nextSequence": next_sequence,
                "hasMore": has_more,
            });
            (StatusCode::OK, Json(body)).into_response()
        }
    }
}

/// Render a [`WriteOutcome`] (spec §4.10 "Write responses: `{type,
/// success, affectedCount, ...op-specific}`"). Status is `201 Created`
/// for a CREATE or an inserting UPSERT, `200 OK` otherwise (spec §6
/// status table).
pub fn render_write(outcome: WriteOutcome) -> Response {
    let (status, type_name, affected_count, mut extra) = match &outcome {
        WriteOutcome::Create { inserted_ids } => (
            StatusCode::CREATED,
            "CREATE",
            inserted_ids.len() as u64,
            serde_json::json!({ "insertedIds": inserted_ids }),
        ),
        WriteOutcome::Update { matched, modified, message } => (
            StatusCode::OK,
            "UPDATE",
            *modified,
            serde_json::json!({ "matched": matched, "modified": modified, "message": message }),
        ),
        WriteOutcome::Upsert { was_inserted, document_id, matched, modified } => (
            if *was_inserted { StatusCode::CREATED } else { StatusCode::OK },
            "UPSERT",
            *modified,
            serde_json::json!({
                "wasInserted": was_inserted,
                "documentId": document_id,
                "matched": matched,
                "modified": modified,
            }),
        ),
        WriteOutcome::Delete { deleted_count } => (
            StatusCode::OK,
            "DELETE",
            *deleted_count,
            serde_json::json!({ "deletedCount": deleted_count }),
        ),
    };

    let map = extra.as_object_mut().expect("every arm above builds a JSON object");
    map.insert("type".to_string(), Value::String(type_name.to_string()));
    map.insert("success".to_string(), Value::Bool(true));
    map.insert("affectedCount".to_string(), Value::Number(affected_count.into()));
    (status, Json(extra)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sigma_types::DocumentId;

    fn sample_doc() -> Document {
        Document {
            id: DocumentId::from("7"),
            table_name: "widgets".into(),
            data: serde_json::json!({"name": "gadget", "status": "ACTIVE"}),
            version: 2,
            is_deleted: false,
            latest_request_id: Some("req-1".into()),
            created_by: Some("svc".into()),
            last_modified_by: Some("svc".into()),
            created_at: Utc::now(),
            last_modified_at: Utc::now(),
            sequence_number: 5,
        }
    }

    #[test]
    fn render_document_merges_system_fields_alongside_data() {
        let catalog: EnumCatalog = serde_json::from_value(serde_json::json!({"status": [{"code": "ACTIVE", "value": "Active"}]})).unwrap();
        let bindings = vec![EnumBinding { field_path: "status".into(), enum_name: "status".into() }];
        let rendered = render_document(&sample_doc(), &bindings, &catalog, TimeFormat::Iso8601);
        assert_eq!(rendered["name"], "gadget");
        assert_eq!(rendered["id"], "7");
        assert_eq!(rendered["version"], 2);
        assert_eq!(rendered["status"], serde_json::json!({"code": "ACTIVE", "value": "Active"}));
    }

    #[test]
    fn write_outcome_create_reports_affected_count_and_status() {
        let outcome = WriteOutcome::Create { inserted_ids: vec![DocumentId::from("1"), DocumentId::from("2")] };
        let response = render_write(outcome);
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    #[test]
    fn write_outcome_upsert_update_path_is_200() {
        let outcome = WriteOutcome::Upsert { was_inserted: false, document_id: DocumentId::from("1"), matched: 1, modified: 1 };
        let response = render_write(outcome);
        assert_eq!(response.status(), StatusCode::OK);
    }
}
