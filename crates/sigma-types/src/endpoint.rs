//! Endpoint descriptor materialized from the configuration tree (spec §3,
//! §4.6).

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::filter::Operator;

/// `REST` or `GRAPHQL` — GraphQL endpoints are routed the same way but are
/// dispatched to the external schema-stitching collaborator (spec §1
/// out-of-scope); Sigma only materializes the descriptor for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EndpointKind {
    /// Plain REST endpoint, fully handled by this gateway.
    Rest,
    /// GraphQL endpoint; routing only, execution is external.
    GraphQl,
}

/// HTTP methods Sigma recognizes as read or write operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// Read.
    Get,
    /// Create, or a complex filtered read when POST is not a write method.
    Post,
    /// Upsert.
    Put,
    /// Update.
    Patch,
    /// Soft delete.
    Delete,
}

/// Per-field allowlist of operators, one instance each for reads and
/// writes (spec §3 "Invariants", §4.5 "Validate").
///
/// An empty `fields` map means filtering is disabled entirely for that
/// direction: every leaf is rejected with
/// `"Filtering is not enabled for this endpoint"`. `_id` is implicitly
/// allowed with equality regardless of what is configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Field name → allowed operator set.
    pub fields: HashMap<String, BTreeSet<Operator>>,
}

impl FilterConfig {
    /// Operators allowed for `field`, implicitly including equality on
    /// `_id` no matter what is configured.
    pub fn allowed_operators(&self, field: &str) -> Option<BTreeSet<Operator>> {
        if field == "_id" {
            let mut ops = self.fields.get(field).cloned().unwrap_or_default();
            ops.insert(Operator::Eq);
            return Some(ops);
        }
        self.fields.get(field).cloned()
    }

    /// Whether filtering is enabled at all for this direction.
    pub fn is_enabled(&self) -> bool {
        !self.fields.is_empty()
    }
}

/// `schema: "name[:required]"` reference on an endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRef {
    /// Name of the schema in the schema cache.
    pub name: String,
    /// Whether a CREATE/UPSERT without a body satisfying the schema is
    /// rejected (`true`) or merely validated-if-present (`false`).
    pub required: bool,
}

/// A fully materialized endpoint, as built by `sigma-registry` from a
/// config subtree (spec §3 "Endpoint descriptor").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Config-tree name of the endpoint.
    pub name: String,
    /// HTTP path, including any path parameters the router understands.
    pub path: String,
    /// Methods that map to a read.
    pub read_methods: BTreeSet<HttpMethod>,
    /// Subset of {POST, PUT, PATCH, DELETE} that map to a write.
    pub write_methods: BTreeSet<HttpMethod>,
    /// Logical collection (`table_name`) backing this endpoint.
    pub collection: String,
    /// REST or GraphQL.
    pub kind: EndpointKind,
    /// Whether `sequence`/`bulkSize` query params are honored.
    pub sequence_enabled: bool,
    /// Default page size for the change feed when `bulkSize` is omitted.
    pub default_bulk_size: u32,
    /// Allowlist applied to reads.
    pub read_filter_config: FilterConfig,
    /// Allowlist applied to writes — intentionally stricter than reads.
    pub write_filter_config: FilterConfig,
    /// Optional JSON Schema binding for CREATE/UPSERT validation.
    pub schema_ref: Option<SchemaRef>,
    /// Array fields that accept create/update/delete-within-array
    /// semantics.
    pub sub_entities: BTreeSet<String>,
    /// Dot path into `data` exposing an inner array as a virtual
    /// collection. Non-empty ⇒ this endpoint disables sequence
    /// pagination (spec §3 invariant).
    pub father_document: Option<String>,
}

impl Endpoint {
    /// Whether this endpoint is a nested (sub-array) endpoint.
    pub fn is_nested(&self) -> bool {
        self.father_document.is_some()
    }

    /// Whether sequence pagination is actually usable for this endpoint:
    /// configured *and* not a nested endpoint.
    pub fn sequence_pagination_enabled(&self) -> bool {
        self.sequence_enabled && !self.is_nested()
    }

    /// Whether `method` maps to a read on this endpoint.
    pub fn allows_read(&self, method: HttpMethod) -> bool {
        self.read_methods.contains(&method)
    }

    /// Whether `method` maps to a write on this endpoint.
    pub fn allows_write(&self, method: HttpMethod) -> bool {
        self.write_methods.contains(&method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_equality_is_always_allowed_even_if_unconfigured() {
        let config = FilterConfig::default();
        let ops = config.allowed_operators("_id").unwrap();
        assert!(ops.contains(&Operator::Eq));
    }

    #[test]
    fn empty_config_disables_filtering_on_other_fields() {
        let config = FilterConfig::default();
        assert!(config.allowed_operators("price").is_none());
        assert!(!config.is_enabled());
    }

    #[test]
    fn nested_endpoint_disables_sequence_pagination() {
        let endpoint = Endpoint {
            name: "order-items".into(),
            path: "/orders/items".into(),
            read_methods: BTreeSet::from([HttpMethod::Get]),
            write_methods: BTreeSet::new(),
            collection: "orders".into(),
            kind: EndpointKind::Rest,
            sequence_enabled: true,
            default_bulk_size: 100,
            read_filter_config: FilterConfig::default(),
            write_filter_config: FilterConfig::default(),
            schema_ref: None,
            sub_entities: BTreeSet::new(),
            father_document: Some("items".into()),
        };
        assert!(!endpoint.sequence_pagination_enabled());
    }
}
