//! Builds `Endpoint` records from a config snapshot (spec §4.6 steps 1–4).

use std::collections::{BTreeSet, HashMap};

use sigma_config::ConfigTree;
use sigma_types::{Endpoint, EndpointKind, FilterConfig, HttpMethod, Operator, SchemaRef};

use crate::error::RegistryError;

const DEFAULT_BULK_SIZE: u32 = 100;

/// Materialize every endpoint under `endpoints_root`, skipping (and
/// logging) any whose subtree is malformed rather than aborting the
/// whole reload (spec §4.6 step 2, §7 "ConfigError ... the affected
/// endpoint is excluded from the registry; service continues").
pub fn materialize_endpoints(tree: &ConfigTree, endpoints_root: &str) -> Vec<Endpoint> {
    let names = tree.children(endpoints_root).unwrap_or_default();
    let mut endpoints = Vec::with_capacity(names.len());

    for name in names {
        let base = format!("{endpoints_root}/{name}");
        match materialize_one(tree, &name, &base) {
            Ok(endpoint) => endpoints.push(endpoint),
            Err(e) => tracing::warn!(endpoint = %name, error = %e, "skipping malformed endpoint"),
        }
    }

    endpoints
}

fn materialize_one(tree: &ConfigTree, name: &str, base: &str) -> Result<Endpoint, RegistryError> {
    let path = required_string(tree, name, base, "path")?;
    let http_method_field = required_string(tree, name, base, "httpMethod")?;
    let collection = required_string(tree, name, base, "databaseCollection")?;

    let read_methods = parse_methods(name, "httpMethod", &http_method_field)?;
    let write_methods = match optional_string(tree, base, "writeMethods") {
        Some(raw) => parse_methods(name, "writeMethods", &raw)?,
        None => BTreeSet::new(),
    };

    let kind = match optional_string(tree, base, "type").as_deref() {
        Some("GRAPHQL") => EndpointKind::GraphQl,
        Some("REST") | None => EndpointKind::Rest,
        Some(other) => {
            return Err(RegistryError::InvalidField {
                endpoint: name.to_string(),
                field: "type".to_string(),
                reason: format!("unrecognized endpoint kind '{other}'"),
            })
        }
    };

    let sequence_enabled = match optional_string(tree, base, "sequenceEnabled").as_deref() {
        None => false,
        Some("true") => true,
        Some("false") => false,
        Some(other) => {
            return Err(RegistryError::InvalidField {
                endpoint: name.to_string(),
                field: "sequenceEnabled".to_string(),
                reason: format!("expected 'true' or 'false', got '{other}'"),
            })
        }
    };

    let default_bulk_size = match optional_string(tree, base, "defaultBulkSize") {
        Some(raw) => raw.parse::<u32>().map_err(|_| RegistryError::InvalidField {
            endpoint: name.to_string(),
            field: "defaultBulkSize".to_string(),
            reason: format!("'{raw}' is not a positive integer"),
        })?,
        None => DEFAULT_BULK_SIZE,
    };

    let schema_ref = match optional_string(tree, base, "schema") {
        Some(raw) => Some(parse_schema_ref(&raw)),
        None => None,
    };

    let sub_entities = optional_string(tree, base, "subEntities")
        .map(|raw| split_list(&raw))
        .unwrap_or_default();

    let father_document = optional_string(tree, base, "fatherDocument");

    let read_filter_config = materialize_filter_config(tree, name, &format!("{base}/readFilter"))?;
    let write_filter_config = materialize_filter_config(tree, name, &format!("{base}/writeFilter"))?;

    Ok(Endpoint {
        name: name.to_string(),
        path,
        read_methods,
        write_methods,
        collection,
        kind,
        sequence_enabled,
        default_bulk_size,
        read_filter_config,
        write_filter_config,
        schema_ref,
        sub_entities,
        father_document,
    })
}

fn materialize_filter_config(tree: &ConfigTree, endpoint: &str, base: &str) -> Result<FilterConfig, RegistryError> {
    let mut fields = HashMap::new();
    for field in tree.children(base).unwrap_or_default() {
        let raw = required_string(tree, endpoint, base, &field)?;
        let mut ops = BTreeSet::new();
        for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let op = Operator::parse(token).ok_or_else(|| RegistryError::UnknownOperatorToken {
                endpoint: endpoint.to_string(),
                field: field.clone(),
                token: token.to_string(),
            })?;
            ops.insert(op);
        }
        fields.insert(field, ops);
    }
    Ok(FilterConfig { fields })
}

fn parse_methods(endpoint: &str, field: &'static str, raw: &str) -> Result<BTreeSet<HttpMethod>, RegistryError> {
    let mut methods = BTreeSet::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let method = parse_method_token(token).ok_or_else(|| RegistryError::InvalidField {
            endpoint: endpoint.to_string(),
            field: field.to_string(),
            reason: format!("unrecognized HTTP method token '{token}'"),
        })?;
        methods.insert(method);
    }
    Ok(methods)
}

fn parse_method_token(token: &str) -> Option<HttpMethod> {
    match token.to_ascii_uppercase().as_str() {
        "GET" => Some(HttpMethod::Get),
        "POST" => Some(HttpMethod::Post),
        "PUT" => Some(HttpMethod::Put),
        "PATCH" => Some(HttpMethod::Patch),
        "DELETE" => Some(HttpMethod::Delete),
        _ => None,
    }
}

fn parse_schema_ref(raw: &str) -> SchemaRef {
    match raw.split_once(':') {
        Some((name, "required")) => SchemaRef { name: name.to_string(), required: true },
        _ => SchemaRef { name: raw.to_string(), required: false },
    }
}

fn split_list(raw: &str) -> BTreeSet<String> {
    raw.split([',', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn required_string(tree: &ConfigTree, endpoint: &str, base: &str, field: &str) -> Result<String, RegistryError> {
    optional_string(tree, base, field).ok_or_else(|| RegistryError::MissingField {
        endpoint: endpoint.to_string(),
        field: field.to_string(),
    })
}

fn optional_string(tree: &ConfigTree, base: &str, field: &str) -> Option<String> {
    let bytes = tree.read(&format!("{base}/{field}")).ok().flatten()?;
    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigma_config::ConfigNode;
    use std::collections::BTreeMap;

    fn leaf(value: &str) -> ConfigNode {
        ConfigNode { value: Some(value.as_bytes().to_vec()), children: BTreeMap::new() }
    }

    fn sample_tree() -> ConfigTree {
        let mut users = BTreeMap::new();
        users.insert("path".to_string(), leaf("/users"));
        users.insert("httpMethod".to_string(), leaf("GET"));
        users.insert("writeMethods".to_string(), leaf("POST"));
        users.insert("databaseCollection".to_string(), leaf("users"));

        let mut read_filter = BTreeMap::new();
        read_filter.insert("email".to_string(), leaf("$eq"));
        users.insert("readFilter".to_string(), ConfigNode { value: None, children: read_filter });

        let mut bogus = BTreeMap::new();
        bogus.insert("path".to_string(), leaf("/bogus"));
        bogus.insert("httpMethod".to_string(), leaf("GET"));
        bogus.insert("databaseCollection".to_string(), leaf("bogus"));
        let mut bad_filter = BTreeMap::new();
        bad_filter.insert("name".to_string(), leaf("$nope"));
        bogus.insert("writeFilter".to_string(), ConfigNode { value: None, children: bad_filter });

        let mut incomplete = BTreeMap::new();
        incomplete.insert("path".to_string(), leaf("/incomplete"));

        let mut endpoints = BTreeMap::new();
        endpoints.insert("users".to_string(), ConfigNode { value: None, children: users });
        endpoints.insert("bogus".to_string(), ConfigNode { value: None, children: bogus });
        endpoints.insert("incomplete".to_string(), ConfigNode { value: None, children: incomplete });

        let mut root = ConfigNode::default();
        root.children.insert(
            "endpoints".to_string(),
            ConfigNode { value: None, children: endpoints },
        );
        ConfigTree::new(root)
    }

    #[test]
    fn materializes_a_well_formed_endpoint() {
        let tree = sample_tree();
        let endpoints = materialize_endpoints(&tree, "/endpoints");
        let users = endpoints.iter().find(|e| e.name == "users").unwrap();
        assert_eq!(users.path, "/users");
        assert!(users.read_methods.contains(&HttpMethod::Get));
        assert!(users.write_methods.contains(&HttpMethod::Post));
        assert_eq!(users.default_bulk_size, DEFAULT_BULK_SIZE);
    }

    #[test]
    fn skips_endpoint_with_missing_required_field() {
        let tree = sample_tree();
        let endpoints = materialize_endpoints(&tree, "/endpoints");
        assert!(endpoints.iter().all(|e| e.name != "incomplete"));
    }

    #[test]
    fn rejects_whole_endpoint_on_unknown_operator_token() {
        let tree = sample_tree();
        let endpoints = materialize_endpoints(&tree, "/endpoints");
        assert!(endpoints.iter().all(|e| e.name != "bogus"));
    }

    #[test]
    fn schema_ref_parses_required_suffix() {
        assert_eq!(parse_schema_ref("widget:required"), SchemaRef { name: "widget".into(), required: true });
        assert_eq!(parse_schema_ref("widget"), SchemaRef { name: "widget".into(), required: false });
    }
}
