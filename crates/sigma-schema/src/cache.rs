//! Schema cache: parsed JSON Schema documents keyed by name, with
//! `enumRef` placeholders spliced from the current enum catalog before
//! compilation (spec §4.4 "Schema cache").

use std::sync::Arc;

use dashmap::DashMap;
use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use crate::enum_catalog::EnumCatalog;
use crate::error::{SchemaError, ValidationIssue};

/// Registered, not-yet-spliced schema documents, keyed by name.
#[derive(Default)]
pub struct SchemaRegistry {
    documents: DashMap<String, Arc<Value>>,
}

impl SchemaRegistry {
    /// Register or replace the raw schema document for `name`.
    pub fn register(&self, name: impl Into<String>, document: Value) {
        self.documents.insert(name.into(), Arc::new(document));
    }

    /// Fetch the raw document for `name`.
    pub fn get(&self, name: &str) -> Option<Arc<Value>> {
        self.documents.get(name).map(|entry| Arc::clone(entry.value()))
    }
}

/// Splice every `"enumRef": "x"` object in `schema` into
/// `"enum": [...]` using `catalog`, returning the materialized document
/// a compiler can consume. `enumRef` is not a real JSON Schema keyword;
/// it is rewritten away entirely before compilation.
pub fn splice_enum_refs(schema_name: &str, schema: &Value, catalog: &EnumCatalog) -> Result<Value, SchemaError> {
    let mut spliced = schema.clone();
    splice_in_place(schema_name, &mut spliced, catalog)?;
    Ok(spliced)
}

fn splice_in_place(schema_name: &str, value: &mut Value, catalog: &EnumCatalog) -> Result<(), SchemaError> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(enum_name)) = map.remove("enumRef") {
                let codes = catalog.codes(&enum_name).ok_or_else(|| SchemaError::UnknownEnum {
                    schema: schema_name.to_string(),
                    enum_name: enum_name.clone(),
                })?;
                map.insert("enum".to_string(), Value::Array(codes.into_iter().map(Value::String).collect()));
                return Ok(());
            }
            for child in map.values_mut() {
                splice_in_place(schema_name, child, catalog)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                splice_in_place(schema_name, item, catalog)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Validate `instance` against `document` (already enum-spliced),
/// compiling fresh each call rather than caching the compiled
/// validator: `jsonschema::JSONSchema` borrows its source document's
/// lifetime, and this cache's documents are replaced wholesale on every
/// enum refresh, so keeping only the cheap-to-clone `Arc<Value>` around
/// avoids a self-referential struct for no real benefit — compiling a
/// Draft 2020-12 validator from an already-parsed document is cheap
/// relative to the I/O this call sits behind.
pub fn validate_against(schema_name: &str, document: &Value, instance: &Value) -> Result<(), SchemaError> {
    let compiled = JSONSchema::options()
        .with_draft(Draft::Draft202012)
        .compile(document)
        .map_err(|e| SchemaError::InvalidSchema { name: schema_name.to_string(), reason: e.to_string() })?;

    let result = compiled.validate(instance);
    if let Err(errors) = result {
        let issues = errors
            .map(|e| ValidationIssue { instance_path: e.instance_path.to_string(), message: e.to_string() })
            .collect();
        return Err(SchemaError::Invalid(issues));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> EnumCatalog {
        // EnumCatalog's fields are private; build through the public
        // deserialization shape the refresher uses.
        serde_json::from_value(json!({
            "status": [{"code": "ACTIVE", "value": "Active"}, {"code": "CLOSED", "value": "Closed"}]
        }))
        .unwrap()
    }

    #[test]
    fn splice_replaces_enum_ref_with_enum_array() {
        let schema = json!({
            "type": "object",
            "properties": {"status": {"enumRef": "status"}}
        });
        let spliced = splice_enum_refs("order", &schema, &catalog()).unwrap();
        assert_eq!(spliced["properties"]["status"]["enum"], json!(["ACTIVE", "CLOSED"]));
        assert!(spliced["properties"]["status"].get("enumRef").is_none());
    }

    #[test]
    fn splice_rejects_unknown_enum_names() {
        let schema = json!({"properties": {"status": {"enumRef": "missing"}}});
        let err = splice_enum_refs("order", &schema, &catalog()).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownEnum { .. }));
    }

    #[test]
    fn validate_against_reports_issues_for_a_failing_document() {
        let schema = json!({
            "type": "object",
            "required": ["name"],
            "properties": {"name": {"type": "string"}}
        });
        let err = validate_against("widget", &schema, &json!({})).unwrap_err();
        assert!(matches!(err, SchemaError::Invalid(issues) if !issues.is_empty()));
    }

    #[test]
    fn validate_against_passes_a_conforming_document() {
        let schema = json!({"type": "object", "required": ["name"]});
        assert!(validate_against("widget", &schema, &json!({"name": "x"})).is_ok());
    }
}
