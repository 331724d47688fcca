//! Response enrichment: rewrite enum-bound leaf values from a bare
//! code string to `{code, value}` (spec §4.4 "Response enrichment").

use serde_json::{Map, Value};

use crate::enum_catalog::EnumCatalog;

/// One field path bound to an enum, as recorded on a compiled schema
/// (spec's `enumRef` keyword, already spliced away by validation time,
/// so enrichment tracks bindings separately by dotted path).
#[derive(Debug, Clone)]
pub struct EnumBinding {
    /// Dotted path into the document (`"status"`, `"address.kind"`).
    pub field_path: String,
    /// Enum name to look labels up in.
    pub enum_name: String,
}

/// Walk a JSON Schema document's `properties` tree and collect every
/// `enumRef` placeholder as a dotted field path, so the response builder
/// knows which leaves to enrich without re-parsing the schema on every
/// request.
pub fn discover_bindings(schema: &Value) -> Vec<EnumBinding> {
    let mut bindings = Vec::new();
    walk_properties(schema, "", &mut bindings);
    bindings
}

fn walk_properties(node: &Value, prefix: &str, bindings: &mut Vec<EnumBinding>) {
    let Some(properties) = node.get("properties").and_then(Value::as_object) else { return };

    for (field, child) in properties {
        let path = if prefix.is_empty() { field.clone() } else { format!("{prefix}.{field}") };
        if let Some(Value::String(enum_name)) = child.get("enumRef") {
            bindings.push(EnumBinding { field_path: path.clone(), enum_name: enum_name.clone() });
        }
        walk_properties(child, &path, bindings);
    }
}

/// Rewrite every bound leaf in `document` from `"CODE"` to
/// `{"code": "CODE", "value": "Human Label"}`. A code missing from the
/// catalog passes through unchanged (spec §4.4 "Missing codes pass
/// through unchanged").
pub fn enrich_document(document: &mut Value, bindings: &[EnumBinding], catalog: &EnumCatalog) {
    for binding in bindings {
        let segments: Vec<&str> = binding.field_path.split('.').collect();
        rewrite_path(document, &segments, &binding.enum_name, catalog);
    }
}

fn rewrite_path(value: &mut Value, segments: &[&str], enum_name: &str, catalog: &EnumCatalog) {
    let Some((head, rest)) = segments.split_first() else { return };
    let Value::Object(map) = value else { return };
    let Some(child) = map.get_mut(*head) else { return };

    if rest.is_empty() {
        rewrite_leaf(child, enum_name, catalog);
    } else {
        rewrite_path(child, rest, enum_name, catalog);
    }
}

fn rewrite_leaf(value: &mut Value, enum_name: &str, catalog: &EnumCatalog) {
    let Value::String(code) = value else { return };
    let Some(label) = catalog.label(enum_name, code) else { return };

    let mut enriched = Map::new();
    enriched.insert("code".to_string(), Value::String(code.clone()));
    enriched.insert("value".to_string(), Value::String(label.to_string()));
    *value = Value::Object(enriched);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> EnumCatalog {
        serde_json::from_value(json!({"status": [{"code": "ACTIVE", "value": "Active"}]})).unwrap()
    }

    #[test]
    fn top_level_code_is_rewritten_to_code_value_pair() {
        let mut doc = json!({"status": "ACTIVE", "name": "x"});
        enrich_document(&mut doc, &[EnumBinding { field_path: "status".into(), enum_name: "status".into() }], &catalog());
        assert_eq!(doc["status"], json!({"code": "ACTIVE", "value": "Active"}));
        assert_eq!(doc["name"], "x");
    }

    #[test]
    fn nested_path_is_rewritten() {
        let mut doc = json!({"address": {"status": "ACTIVE"}});
        enrich_document(
            &mut doc,
            &[EnumBinding { field_path: "address.status".into(), enum_name: "status".into() }],
            &catalog(),
        );
        assert_eq!(doc["address"]["status"], json!({"code": "ACTIVE", "value": "Active"}));
    }

    #[test]
    fn unknown_code_passes_through_unchanged() {
        let mut doc = json!({"status": "MYSTERY"});
        enrich_document(&mut doc, &[EnumBinding { field_path: "status".into(), enum_name: "status".into() }], &catalog());
        assert_eq!(doc["status"], "MYSTERY");
    }

    #[test]
    fn discover_bindings_finds_nested_enum_refs() {
        let schema = json!({
            "type": "object",
            "properties": {
                "status": {"enumRef": "status"},
                "address": {"type": "object", "properties": {"kind": {"enumRef": "address_kind"}}}
            }
        });
        let bindings = discover_bindings(&schema);
        let paths: Vec<&str> = bindings.iter().map(|b| b.field_path.as_str()).collect();
        assert_eq!(paths, vec!["status", "address.kind"]);
    }
}
