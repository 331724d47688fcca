//! Schema & Enum Manager: validates documents against registered JSON
//! Schema definitions, splices `enumRef` placeholders from a
//! continuously refreshed enum catalog, and enriches response payloads
//! with human-readable enum labels.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod cache;
mod enrich;
mod enum_catalog;
mod error;

pub use cache::{splice_enum_refs, validate_against, SchemaRegistry};
pub use enrich::{discover_bindings, enrich_document, EnumBinding};
pub use enum_catalog::{EnumCatalog, EnumCatalogHandle, EnumEntry};
pub use error::{SchemaError, ValidationIssue};

use serde_json::Value;

/// Validate `instance` against the registered schema `schema_name`,
/// splicing the current enum catalog's codes into any `enumRef`
/// placeholders first. Partial updates and deletes never call this
/// (spec §4.4 "Partial updates and deletes do not invoke schema
/// validation").
pub fn validate(
    registry: &SchemaRegistry,
    schema_name: &str,
    instance: &Value,
    catalog: &EnumCatalog,
) -> Result<(), SchemaError> {
    let document = registry.get(schema_name).ok_or_else(|| SchemaError::UnknownSchema(schema_name.to_string()))?;
    let spliced = splice_enum_refs(schema_name, &document, catalog)?;
    validate_against(schema_name, &spliced, instance)
}

/// Validate a batch of documents against `schema_name`, returning the
/// index of every failing document alongside its issues rather than
/// stopping at the first failure (spec §4.4 "`validate_bulk([doc],
/// schema_name) → ok | errors[] with indices`").
pub fn validate_bulk(
    registry: &SchemaRegistry,
    schema_name: &str,
    instances: &[Value],
    catalog: &EnumCatalog,
) -> Result<(), Vec<(usize, SchemaError)>> {
    let document = registry
        .get(schema_name)
        .ok_or_else(|| vec![(0, SchemaError::UnknownSchema(schema_name.to_string()))])?;
    let spliced = splice_enum_refs(schema_name, &document, catalog)
        .map_err(|e| vec![(0, e)])?;

    let failures: Vec<(usize, SchemaError)> = instances
        .iter()
        .enumerate()
        .filter_map(|(index, instance)| validate_against(schema_name, &spliced, instance).err().map(|e| (index, e)))
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> EnumCatalog {
        serde_json::from_value(json!({"status": [{"code": "ACTIVE", "value": "Active"}]})).unwrap()
    }

    #[test]
    fn validate_splices_enum_ref_before_checking() {
        let registry = SchemaRegistry::default();
        registry.register(
            "widget",
            json!({"type": "object", "properties": {"status": {"enumRef": "status"}}}),
        );
        assert!(validate(&registry, "widget", &json!({"status": "ACTIVE"}), &catalog()).is_ok());
        assert!(validate(&registry, "widget", &json!({"status": "UNKNOWN"}), &catalog()).is_err());
    }

    #[test]
    fn validate_rejects_unregistered_schema_name() {
        let registry = SchemaRegistry::default();
        let err = validate(&registry, "missing", &json!({}), &catalog()).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownSchema(_)));
    }

    #[test]
    fn validate_bulk_reports_every_failing_index() {
        let registry = SchemaRegistry::default();
        registry.register("widget", json!({"type": "object", "required": ["name"]}));
        let instances = vec![json!({"name": "a"}), json!({}), json!({"name": "b"}), json!({})];
        let failures = validate_bulk(&registry, "widget", &instances, &catalog()).unwrap_err();
        let indices: Vec<usize> = failures.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![1, 3]);
    }
}
