//! Write Orchestrator: validate → sanitize → sub-entity orchestrate →
//! no-op detect → apply (spec §4.9).
//!
//! Every mutation this module drives against a single matched row is a
//! full-document replace against `data`: the orchestrator always fetches
//! the row first, computes the final merged body in Rust, and hands the
//! repository a ready-to-persist document rather than asking it to merge
//! JSON server-side. A `multi=true` update fans this out over every
//! matched row, each scoped by its own `_id` filter, rather than handing
//! the repository one shared body for many rows (see `DESIGN.md`).

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use uuid::Uuid;

use sigma_dialect::SqlDialect;
use sigma_filter::{build_filter, parse_filter_map, translate, FilterResult, OperatorRegistry, ReadOptions};
use sigma_schema::SchemaError;
use sigma_types::{AuditContext, DocumentId, Endpoint, WriteOutcome};

use crate::error::GatewayError;
use crate::request::WriteRequest;
use crate::state::AppState;

/// System-managed fields a client must never set directly; stripped from
/// every incoming write body (spec §4.9 step 2 "Sanitize").
const SYSTEM_FIELDS: [&str; 10] = [
    "_id",
    "id",
    "version",
    "is_deleted",
    "latest_request_id",
    "created_by",
    "last_modified_by",
    "created_at",
    "last_modified_at",
    "sequence_number",
];

/// Run `request` against `endpoint`, returning the typed outcome for
/// `response::render_write` to envelope.
pub async fn execute_write(
    state: &AppState,
    endpoint: &Endpoint,
    audit: &AuditContext,
    expected_version: Option<i64>,
    request: WriteRequest,
) -> Result<WriteOutcome, GatewayError> {
    if endpoint.is_nested() {
        return Err(GatewayError::Validation(vec![
            "writes to a nested endpoint that would span multiple parents are not supported".to_string(),
        ]));
    }

    match request {
        WriteRequest::Create { bodies } => handle_create(state, endpoint, audit, bodies).await,
        WriteRequest::Update { filter_map, updates, multi } => {
            handle_update(state, endpoint, audit, expected_version, filter_map, updates, multi).await
        }
        WriteRequest::Upsert { filter_map, data } => handle_upsert(state, endpoint, audit, expected_version, filter_map, data).await,
        WriteRequest::Delete { filter_map, multi } => handle_delete(state, endpoint, audit, filter_map, multi).await,
    }
}

async fn handle_create(
    state: &AppState,
    endpoint: &Endpoint,
    audit: &AuditContext,
    mut bodies: Vec<Value>,
) -> Result<WriteOutcome, GatewayError> {
    if bodies.is_empty() {
        return Err(GatewayError::Validation(vec!["at least one document body is required".to_string()]));
    }

    for body in &mut bodies {
        sanitize(body);
        if !endpoint.sub_entities.is_empty() {
            orchestrate_create_sub_entities(body, &endpoint.sub_entities)?;
        }
    }

    if let Some(schema_ref) = &endpoint.schema_ref {
        validate_create_bodies(state, schema_ref, &bodies).await?;
    }

    let ids = state.repository.insert_many(&endpoint.collection, bodies, audit).await?;
    Ok(WriteOutcome::Create { inserted_ids: ids })
}

#[allow(clippy::too_many_arguments)]
async fn handle_update(
    state: &AppState,
    endpoint: &Endpoint,
    audit: &AuditContext,
    expected_version: Option<i64>,
    filter_map: Map<String, Value>,
    updates: Value,
    multi: bool,
) -> Result<WriteOutcome, GatewayError> {
    let dialect = state.repository.dialect();
    let filter = build_filter(&filter_map, &endpoint.write_filter_config, dialect, &state.operators, 2)?;
    let matched = state.repository.find_all(&endpoint.collection, &filter, &ReadOptions::default(), false).await?;

    let touches_sub_entities = mentions_sub_entities(&updates, &endpoint.sub_entities);
    if touches_sub_entities && multi {
        return Err(GatewayError::Validation(vec![
            "sub-entity writes are incompatible with multi=true".to_string(),
        ]));
    }
    if touches_sub_entities && matched.len() != 1 {
        return Err(GatewayError::Validation(vec![
            "sub-entity update requires the filter to match exactly one document".to_string(),
        ]));
    }
    if !touches_sub_entities && !multi && matched.len() > 1 {
        return Err(GatewayError::Validation(vec![
            "filter matched more than one document; pass multi=true to update them all".to_string(),
        ]));
    }
    if let (Some(expected), [only]) = (expected_version, matched.as_slice()) {
        if only.version != expected {
            return Err(GatewayError::Conflict { expected, actual: only.version });
        }
    }

    let mut modified = 0u64;
    for doc in &matched {
        let mut merged = shallow_merge_excluding(&doc.data, &updates, &endpoint.sub_entities);
        orchestrate_update_sub_entities(&mut merged, &updates, &endpoint.sub_entities)?;
        if values_equal_numeric_tolerant(&merged, &doc.data) {
            continue;
        }
        let scoped = id_filter(&doc.id, dialect, &state.operators)?;
        state.repository.update_matching(&endpoint.collection, &scoped, merged, audit).await?;
        modified += 1;
    }

    let matched_count = matched.len() as u64;
    let message = (matched_count > 0 && modified == 0).then(|| "no changes detected".to_string());
    Ok(WriteOutcome::Update { matched: matched_count, modified, message })
}

async fn handle_upsert(
    state: &AppState,
    endpoint: &Endpoint,
    audit: &AuditContext,
    expected_version: Option<i64>,
    filter_map: Map<String, Value>,
    mut data: Value,
) -> Result<WriteOutcome, GatewayError> {
    let dialect = state.repository.dialect();
    let filter = build_filter(&filter_map, &endpoint.write_filter_config, dialect, &state.operators, 2)?;
    let matched = state.repository.find_all(&endpoint.collection, &filter, &ReadOptions::default(), false).await?;
    if matched.len() > 1 {
        return Err(GatewayError::Validation(vec!["upsert filter matches more than one document".to_string()]));
    }

    sanitize(&mut data);

    match matched.into_iter().next() {
        None => {
            if !endpoint.sub_entities.is_empty() {
                orchestrate_create_sub_entities(&mut data, &endpoint.sub_entities)?;
            }
            if let Some(schema_ref) = &endpoint.schema_ref {
                validate_single_body(state, schema_ref, &data).await?;
            }
            let doc = state.repository.insert_one(&endpoint.collection, data, audit).await?;
            Ok(WriteOutcome::Upsert { was_inserted: true, document_id: doc.id, matched: 0, modified: 1 })
        }
        Some(existing) => {
            if let Some(expected) = expected_version {
                if existing.version != expected {
                    return Err(GatewayError::Conflict { expected, actual: existing.version });
                }
            }
            if let Some(schema_ref) = &endpoint.schema_ref {
                validate_single_body(state, schema_ref, &data).await?;
            }
            let mut merged = shallow_merge_excluding(&existing.data, &data, &endpoint.sub_entities);
            orchestrate_update_sub_entities(&mut merged, &data, &endpoint.sub_entities)?;

            let modified = if values_equal_numeric_tolerant(&merged, &existing.data) {
                0
            } else {
                let scoped = id_filter(&existing.id, dialect, &state.operators)?;
                state.repository.update_matching(&endpoint.collection, &scoped, merged, audit).await?;
                1
            };
            Ok(WriteOutcome::Upsert { was_inserted: false, document_id: existing.id, matched: 1, modified })
        }
    }
}

async fn handle_delete(
    state: &AppState,
    endpoint: &Endpoint,
    audit: &AuditContext,
    filter_map: Map<String, Value>,
    multi: bool,
) -> Result<WriteOutcome, GatewayError> {
    let dialect = state.repository.dialect();
    let filter = build_filter(&filter_map, &endpoint.write_filter_config, dialect, &state.operators, 2)?;

    let matched = state.repository.count(&endpoint.collection, &filter, false).await?;
    if !multi && matched > 1 {
        return Err(GatewayError::Validation(vec![
            "filter matched more than one document; pass multi=true to delete them all".to_string(),
        ]));
    }
    if matched == 0 {
        return Ok(WriteOutcome::Delete { deleted_count: 0 });
    }

    let deleted = state.repository.delete_matching(&endpoint.collection, &filter, audit).await?;
    Ok(WriteOutcome::Delete { deleted_count: deleted })
}

fn sanitize(body: &mut Value) {
    if let Some(map) = body.as_object_mut() {
        for field in SYSTEM_FIELDS {
            map.remove(field);
        }
    }
}

fn mentions_sub_entities(updates: &Value, sub_entities: &BTreeSet<String>) -> bool {
    updates.as_object().map(|map| sub_entities.iter().any(|field| map.contains_key(field))).unwrap_or(false)
}

/// Shallow-merge every top-level key of `updates` into a clone of `base`,
/// skipping keys in `sub_entities` — those are applied separately by
/// [`orchestrate_update_sub_entities`] against the existing array rather
/// than overwritten wholesale.
fn shallow_merge_excluding(base: &Value, updates: &Value, sub_entities: &BTreeSet<String>) -> Value {
    let mut merged = base.clone();
    if let (Some(merged_map), Some(updates_map)) = (merged.as_object_mut(), updates.as_object()) {
        for (key, value) in updates_map {
            if sub_entities.contains(key) {
                continue;
            }
            merged_map.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Create-path sub-entity orchestration (spec §4.9 step 3 "Create
/// path"): assign a fresh `myId` to any entry missing one, reject
/// duplicates within one payload, reject an `isDelete` flag outright, and
/// force `isDeleted=false` on every entry.
fn orchestrate_create_sub_entities(body: &mut Value, sub_entities: &BTreeSet<String>) -> Result<(), GatewayError> {
    let Some(map) = body.as_object_mut() else { return Ok(()) };
    for field in sub_entities {
        let Some(array_value) = map.get_mut(field) else { continue };
        let Some(array) = array_value.as_array_mut() else {
            return Err(GatewayError::Validation(vec![format!("'{field}' must be an array")]));
        };

        let mut seen = std::collections::HashSet::new();
        for entry in array.iter_mut() {
            let Some(entry_map) = entry.as_object_mut() else {
                return Err(GatewayError::Validation(vec![format!("'{field}' entries must be objects")]));
            };
            if entry_map.contains_key("isDelete") {
                return Err(GatewayError::Validation(vec![format!(
                    "'{field}' entries cannot specify isDelete on create"
                )]));
            }
            let my_id = match entry_map.get("myId").and_then(Value::as_str) {
                Some(id) => id.to_string(),
                None => {
                    let fresh = Uuid::new_v4().to_string();
                    entry_map.insert("myId".to_string(), Value::String(fresh.clone()));
                    fresh
                }
            };
            if !seen.insert(my_id.clone()) {
                return Err(GatewayError::Validation(vec![format!("duplicate myId '{my_id}' in '{field}'")]));
            }
            entry_map.insert("isDeleted".to_string(), Value::Bool(false));
        }
    }
    Ok(())
}

/// Update/upsert-path sub-entity orchestration (spec §4.9 step 3
/// "Update/Upsert path"). Mutates `merged`'s sub-entity arrays in place
/// per the operation entries found in `updates`.
fn orchestrate_update_sub_entities(merged: &mut Value, updates: &Value, sub_entities: &BTreeSet<String>) -> Result<(), GatewayError> {
    let Some(updates_map) = updates.as_object() else { return Ok(()) };
    for field in sub_entities {
        let Some(ops_value) = updates_map.get(field) else { continue };
        let Some(ops) = ops_value.as_array() else {
            return Err(GatewayError::Validation(vec![format!(
                "'{field}' must be an array of sub-entity operations"
            )]));
        };

        let merged_map = merged
            .as_object_mut()
            .ok_or_else(|| GatewayError::Internal("document root is not an object".to_string()))?;
        let array_value = merged_map.entry(field.clone()).or_insert_with(|| Value::Array(Vec::new()));
        let Some(array) = array_value.as_array_mut() else {
            return Err(GatewayError::Internal(format!("'{field}' is not an array in the stored document")));
        };
        apply_sub_entity_operations(field, array, ops)?;
    }
    Ok(())
}

fn apply_sub_entity_operations(field: &str, array: &mut Vec<Value>, ops: &[Value]) -> Result<(), GatewayError> {
    for op in ops {
        let Some(op_map) = op.as_object() else {
            return Err(GatewayError::Validation(vec![format!("'{field}' operation entries must be objects")]));
        };
        let my_id = op_map.get("myId").and_then(Value::as_str);
        let is_delete = op_map.get("isDelete").and_then(Value::as_bool).unwrap_or(false);

        match my_id {
            Some(id) => {
                let index = array.iter().position(|entry| entry.get("myId").and_then(Value::as_str) == Some(id));
                let Some(index) = index else {
                    return Err(GatewayError::Validation(vec![format!("'{field}' entry '{id}' does not exist")]));
                };
                if is_delete {
                    let already = array[index].get("isDeleted").and_then(Value::as_bool).unwrap_or(false);
                    if already {
                        return Err(GatewayError::Validation(vec![format!("'{field}' entry '{id}' is already deleted")]));
                    }
                    if let Some(entry_map) = array[index].as_object_mut() {
                        entry_map.insert("isDeleted".to_string(), Value::Bool(true));
                    }
                } else if let Some(entry_map) = array[index].as_object_mut() {
                    for (key, value) in op_map {
                        if key == "myId" || key == "isDelete" {
                            continue;
                        }
                        entry_map.insert(key.clone(), value.clone());
                    }
                }
            }
            None => {
                let mut entry = Map::new();
                entry.insert("myId".to_string(), Value::String(Uuid::new_v4().to_string()));
                entry.insert("isDeleted".to_string(), Value::Bool(false));
                for (key, value) in op_map {
                    if key == "myId" || key == "isDelete" {
                        continue;
                    }
                    entry.insert(key.clone(), value.clone());
                }
                array.push(Value::Object(entry));
            }
        }
    }
    Ok(())
}

/// Structural equality tolerant of numeric representation (`1` vs `1.0`)
/// (spec §4.9 step 4 "numeric equality tolerant across numeric types").
fn values_equal_numeric_tolerant(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(k, v)| y.get(k).map(|yv| values_equal_numeric_tolerant(v, yv)).unwrap_or(false))
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(xv, yv)| values_equal_numeric_tolerant(xv, yv))
        }
        _ => a == b,
    }
}

/// Build a `_id = <id>` filter for scoping a mutation to exactly one
/// already-fetched row. This filter is internally constructed, not
/// user-supplied, so it skips straight from parse to `translate()`
/// rather than going through `build_filter()`'s allowlist check — there
/// is nothing for `validate()` to usefully check against a filter this
/// module built itself.
fn id_filter(id: &DocumentId, dialect: &dyn SqlDialect, registry: &OperatorRegistry) -> Result<FilterResult, GatewayError> {
    let mut map = Map::new();
    map.insert("_id".to_string(), serde_json::json!({"$eq": id.as_str()}));
    let tree = parse_filter_map(&map).map_err(GatewayError::from)?;
    translate(&tree, dialect, registry, 2).map_err(|e| GatewayError::from(vec![e]))
}

async fn validate_create_bodies(state: &AppState, schema_ref: &sigma_types::SchemaRef, bodies: &[Value]) -> Result<(), GatewayError> {
    if state.enum_catalog.writes_blocked() {
        return Err(GatewayError::Upstream("enum catalog is stale".to_string()));
    }
    let catalog = state.enum_catalog.current();
    match sigma_schema::validate_bulk(&state.schemas, &schema_ref.name, bodies, &catalog) {
        Ok(()) => Ok(()),
        Err(failures) => {
            let hard: Vec<String> = failures
                .into_iter()
                .filter_map(|(index, err)| optional_schema_issue(err, schema_ref.required).map(|msg| format!("[{index}] {msg}")))
                .collect();
            if hard.is_empty() { Ok(()) } else { Err(GatewayError::Validation(hard)) }
        }
    }
}

async fn validate_single_body(state: &AppState, schema_ref: &sigma_types::SchemaRef, body: &Value) -> Result<(), GatewayError> {
    if state.enum_catalog.writes_blocked() {
        return Err(GatewayError::Upstream("enum catalog is stale".to_string()));
    }
    let catalog = state.enum_catalog.current();
    match sigma_schema::validate(&state.schemas, &schema_ref.name, body, &catalog) {
        Ok(()) => Ok(()),
        Err(SchemaError::Invalid(issues)) => {
            let hard: Vec<String> = issues
                .into_iter()
                .filter(|issue| schema_ref.required || !issue.message.to_ascii_lowercase().contains("required"))
                .map(|issue| format!("{}: {}", issue.instance_path, issue.message))
                .collect();
            if hard.is_empty() { Ok(()) } else { Err(GatewayError::Validation(hard)) }
        }
        Err(other) => Err(other.into()),
    }
}

/// Reduce one bulk-validation failure to an optional message, dropping
/// "missing required property" issues for a `schema: "name"` reference
/// that didn't opt into `:required` (spec §3 "`required`: whether a
/// CREATE/UPSERT without a body satisfying the schema is rejected").
fn optional_schema_issue(err: SchemaError, required: bool) -> Option<String> {
    match err {
        SchemaError::Invalid(issues) => {
            let hard: Vec<String> = issues
                .into_iter()
                .filter(|issue| required || !issue.message.to_ascii_lowercase().contains("required"))
                .map(|issue| format!("{}: {}", issue.instance_path, issue.message))
                .collect();
            if hard.is_empty() {
                None
            } else {
                Some(hard.join("; "))
            }
        }
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sanitize_strips_every_system_field() {
        let mut body = json!({
            "name": "widget",
            "version": 3,
            "is_deleted": true,
            "created_by": "someone",
        });
        sanitize(&mut body);
        assert_eq!(body, json!({"name": "widget"}));
    }

    #[test]
    fn create_path_assigns_ids_and_rejects_is_delete() {
        let subs = BTreeSet::from(["items".to_string()]);
        let mut body = json!({"items": [{"qty": 1}, {"myId": "A", "qty": 2}]});
        orchestrate_create_sub_entities(&mut body, &subs).unwrap();
        let items = body["items"].as_array().unwrap();
        assert!(items[0]["myId"].is_string());
        assert_eq!(items[0]["isDeleted"], json!(false));
        assert_eq!(items[1]["myId"], json!("A"));

        let mut rejected = json!({"items": [{"myId": "A", "isDelete": true}]});
        assert!(orchestrate_create_sub_entities(&mut rejected, &subs).is_err());
    }

    #[test]
    fn create_path_rejects_duplicate_my_id() {
        let subs = BTreeSet::from(["items".to_string()]);
        let mut body = json!({"items": [{"myId": "A"}, {"myId": "A"}]});
        assert!(orchestrate_create_sub_entities(&mut body, &subs).is_err());
    }

    #[test]
    fn update_path_example_from_spec() {
        let subs = BTreeSet::from(["items".to_string()]);
        let mut merged = json!({"id": 10, "items": [{"myId": "A", "qty": 1, "isDeleted": false}, {"myId": "B", "qty": 2, "isDeleted": false}]});
        let updates = json!({"items": [{"myId": "A", "qty": 5}, {"qty": 9}, {"myId": "B", "isDelete": true}]});
        orchestrate_update_sub_entities(&mut merged, &updates, &subs).unwrap();
        let items = merged["items"].as_array().unwrap();
        assert_eq!(items[0], json!({"myId": "A", "qty": 5, "isDeleted": false}));
        assert_eq!(items[1]["isDeleted"], json!(true));
        assert_eq!(items[2]["qty"], json!(9));
        assert!(items[2]["myId"].is_string());
    }

    #[test]
    fn update_path_rejects_delete_of_missing_entry() {
        let subs = BTreeSet::from(["items".to_string()]);
        let mut merged = json!({"items": []});
        let updates = json!({"items": [{"myId": "ghost", "isDelete": true}]});
        assert!(orchestrate_update_sub_entities(&mut merged, &updates, &subs).is_err());
    }

    #[test]
    fn update_path_rejects_double_delete() {
        let subs = BTreeSet::from(["items".to_string()]);
        let mut merged = json!({"items": [{"myId": "A", "isDeleted": true}]});
        let updates = json!({"items": [{"myId": "A", "isDelete": true}]});
        assert!(orchestrate_update_sub_entities(&mut merged, &updates, &subs).is_err());
    }

    #[test]
    fn numeric_tolerant_equality_treats_int_and_float_as_equal() {
        assert!(values_equal_numeric_tolerant(&json!({"qty": 1}), &json!({"qty": 1.0})));
        assert!(!values_equal_numeric_tolerant(&json!({"qty": 1}), &json!({"qty": 2})));
        assert!(!values_equal_numeric_tolerant(&json!({"qty": 1}), &json!({})));
    }

    #[test]
    fn shallow_merge_skips_sub_entity_fields() {
        let subs = BTreeSet::from(["items".to_string()]);
        let base = json!({"name": "a", "items": [1, 2]});
        let updates = json!({"name": "b", "items": ["ignored"]});
        let merged = shallow_merge_excluding(&base, &updates, &subs);
        assert_eq!(merged["name"], json!("b"));
        assert_eq!(merged["items"], json!([1, 2]));
    }
}
