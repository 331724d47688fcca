//! HTTP → `QueryRequest`/`WriteRequest` parsing (spec §4.7 "Request
//! Parser").

use serde_json::{Map, Value};
use sigma_filter::ReadOptions;
use sigma_types::Endpoint;

use crate::error::GatewayError;

/// Query params the pipeline reserves for read options and sequence
/// pagination; these never enter a filter map (spec §4.7 "Reserved
/// query params").
const RESERVED_QUERY_PARAMS: [&str; 5] = ["sequence", "bulkSize", "limit", "skip", "sort"];

/// A parsed read request (spec §4.7 "`GET` ... either FullCollection,
/// FilteredRequest, or SequenceRequest").
#[derive(Debug, Clone)]
pub enum QueryRequest {
    /// No filter params at all: the whole non-deleted collection.
    FullCollection,
    /// Filter params present (query string or body).
    Filtered {
        /// Filter map ready for `sigma_filter::build_filter`.
        filter_map: Map<String, Value>,
        /// Parsed `sort`/`limit`/`skip`/`projection`.
        options: ReadOptions,
    },
    /// `sequence`/`bulkSize` present and the endpoint allows sequence
    /// pagination.
    Sequence {
        /// Resume position; events with a strictly greater sequence are
        /// returned.
        sequence: i64,
        /// Page size, capped by the endpoint's default if omitted.
        bulk_size: u32,
    },
}

/// A parsed write request (spec §4.7 "`PUT`→ upsert; `PATCH` → update;
/// `DELETE` → delete").
#[derive(Debug, Clone)]
pub enum WriteRequest {
    /// `POST` with one object or an array of objects (spec §4.9 "Bulk
    /// creates are atomic across the request").
    Create {
        /// One body per document to insert.
        bodies: Vec<Value>,
    },
    /// `PATCH`.
    Update {
        /// Rows to update.
        filter_map: Map<String, Value>,
        /// Field assignments to merge into each matched row.
        updates: Value,
        /// Whether more than one match is permitted.
        multi: bool,
    },
    /// `PUT`.
    Upsert {
        /// Rows to match; exactly one row is expected to match, or zero
        /// (triggering an insert).
        filter_map: Map<String, Value>,
        /// Document body to insert or merge.
        data: Value,
    },
    /// `DELETE`.
    Delete {
        /// Rows to soft-delete.
        filter_map: Map<String, Value>,
        /// Whether more than one match is permitted.
        multi: bool,
    },
}

/// Parse a raw HTTP query string (`a=1&b[gte]=2`) into a filter-shaped
/// JSON map: `field=value` becomes implicit equality, `field[op]=value`
/// becomes `{field: {"$op": value}}`. Values are parsed as JSON scalars
/// where possible (so `age=30` becomes a number), falling back to a
/// plain string.
pub fn parse_query_string(raw: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for pair in raw.split('&').filter(|p| !p.is_empty()) {
        let (key, raw_value) = match pair.split_once('=') {
            Some((k, v)) => (k, v),
            None => (pair, ""),
        };
        let key = urlencoding_decode(key);
        let value = scalar_from_query_value(&urlencoding_decode(raw_value));

        if let Some((field, op)) = parse_bracket_key(&key) {
            let entry = map.entry(field).or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(ops) = entry {
                ops.insert(op, value);
            }
        } else {
            map.insert(key, value);
        }
    }
    map
}

fn parse_bracket_key(key: &str) -> Option<(String, String)> {
    let key = key.strip_suffix(']')?;
    let (field, op) = key.split_once('[')?;
    Some((field.to_string(), op.to_string()))
}

fn scalar_from_query_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Minimal percent-decoding; query keys/values in this gateway carry no
/// binary data, only filter tokens and JSON scalars.
fn urlencoding_decode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        match c {
            '+' => out.push(' '),
            '%' => {
                let hi = chars.next();
                let lo = chars.next();
                match (hi.and_then(|c| c.to_digit(16)), lo.and_then(|c| c.to_digit(16))) {
                    (Some(hi), Some(lo)) => out.push(((hi * 16 + lo) as u8) as char),
                    _ => out.push('%'),
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Split reserved pagination/sequence/sort params out of a query map,
/// returning the remaining filter fields plus whatever reserved values
/// were present.
fn split_reserved(mut query: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut reserved = Map::new();
    for key in RESERVED_QUERY_PARAMS {
        if let Some(value) = query.remove(key) {
            reserved.insert(key.to_string(), value);
        }
    }
    (reserved, query)
}

/// Parse a `GET` request's query string against `endpoint` (spec §4.7,
/// §4.8 "Sequence request").
pub fn parse_query_request(endpoint: &Endpoint, raw_query: &str) -> Result<QueryRequest, GatewayError> {
    let query_map = parse_query_string(raw_query);
    let (reserved, filter_map) = split_reserved(query_map);
    build_query_request(endpoint, reserved, filter_map)
}

/// Parse a `POST`-as-complex-filter-read request (spec §6 "`POST` ...
/// read (complex filter) OR create"): reserved options still come from
/// the query string, but the filter comes from the JSON body instead of
/// bracket-syntax query params, since a body can express nested
/// `and`/`or`/`nor` trees query strings can't.
pub fn parse_post_read_request(endpoint: &Endpoint, raw_query: &str, body: &Value) -> Result<QueryRequest, GatewayError> {
    let (reserved, _) = split_reserved(parse_query_string(raw_query));
    let filter_map = match body {
        Value::Object(map) if !map.is_empty() => map.clone(),
        _ => Map::new(),
    };
    build_query_request(endpoint, reserved, filter_map)
}

fn build_query_request(endpoint: &Endpoint, reserved: Map<String, Value>, filter_map: Map<String, Value>) -> Result<QueryRequest, GatewayError> {
    let wants_sequence = reserved.contains_key("sequence") || reserved.contains_key("bulkSize");
    if wants_sequence {
        if !endpoint.sequence_pagination_enabled() {
            return Err(GatewayError::Validation(vec![
                "sequence pagination is not enabled for this endpoint".to_string(),
            ]));
        }
        let sequence = reserved.get("sequence").and_then(Value::as_i64).unwrap_or(0);
        let bulk_size = reserved
            .get("bulkSize")
            .and_then(Value::as_u64)
            .map(|n| n as u32)
            .unwrap_or(endpoint.default_bulk_size);
        return Ok(QueryRequest::Sequence { sequence, bulk_size });
    }

    let mut options = ReadOptions::default();
    if let Some(sort_raw) = reserved.get("sort") {
        if let Some(text) = sort_raw.as_str() {
            options.sort = Some(parse_query_sort(text));
        }
    }
    if let Some(limit) = reserved.get("limit").and_then(Value::as_u64) {
        options.limit = Some(limit as u32);
    }
    if let Some(skip) = reserved.get("skip").and_then(Value::as_u64) {
        options.skip = Some(skip as u32);
    }

    if filter_map.is_empty() && options == ReadOptions::default() {
        return Ok(QueryRequest::FullCollection);
    }
    Ok(QueryRequest::Filtered { filter_map, options })
}

fn parse_query_sort(text: &str) -> sigma_types::SortSpec {
    let mut spec = sigma_types::SortSpec::new();
    for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let Some((field, dir)) = entry.split_once(':') else { continue };
        let order = match dir {
            "1" => sigma_types::SortOrder::Asc,
            "-1" => sigma_types::SortOrder::Desc,
            _ => continue,
        };
        spec.insert(field.to_string(), order);
    }
    spec
}

/// Parse a write request. `raw_query` supplies the filter when the
/// caller didn't put one in the body (spec §4.7 "filter comes from the
/// query string or the body's `filter` key").
pub fn parse_write_request(
    method: sigma_types::HttpMethod,
    raw_query: &str,
    mut body: Value,
) -> Result<WriteRequest, GatewayError> {
    use sigma_types::HttpMethod as M;

    if method == M::Post {
        let bodies = match body {
            Value::Array(items) => items,
            other => vec![other],
        };
        return Ok(WriteRequest::Create { bodies });
    }

    let body_map = body.as_object_mut();
    let body_filter = body_map.and_then(|m| m.remove("filter"));
    let filter_map = match body_filter {
        Some(Value::Object(map)) => map,
        _ => parse_query_string(raw_query),
    };

    let multi = body
        .get("multi")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    match method {
        M::Patch => {
            let updates = body.get("updates").cloned().unwrap_or(body.clone());
            Ok(WriteRequest::Update { filter_map, updates, multi })
        }
        M::Put => Ok(WriteRequest::Upsert { filter_map, data: body }),
        M::Delete => Ok(WriteRequest::Delete { filter_map, multi }),
        M::Get | M::Post => unreachable!("handled above or routed as a read"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_string_parses_bracket_operators() {
        let map = parse_query_string("price[gte]=10&status=active");
        assert_eq!(map["price"], json!({"gte": 10}));
        assert_eq!(map["status"], json!("active"));
    }

    #[test]
    fn reserved_params_never_enter_the_filter_map() {
        let map = parse_query_string("status=active&limit=5&sort=age:1");
        let (reserved, filter) = split_reserved(map);
        assert!(filter.contains_key("status"));
        assert!(!filter.contains_key("limit"));
        assert_eq!(reserved["limit"], json!(5));
    }

    #[test]
    fn percent_decoding_handles_encoded_at_sign() {
        let map = parse_query_string("email=a%40x.com");
        assert_eq!(map["email"], json!("a@x.com"));
    }

    #[test]
    fn write_request_patch_reads_updates_and_multi_flag() {
        let body = json!({"updates": {"age": 31}, "multi": true});
        let req = parse_write_request(sigma_types::HttpMethod::Patch, "_id=1", body).unwrap();
        match req {
            WriteRequest::Update { updates, multi, .. } => {
                assert_eq!(updates, json!({"age": 31}));
                assert!(multi);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn create_wraps_a_single_object_body_into_one_entry() {
        let req = parse_write_request(sigma_types::HttpMethod::Post, "", json!({"name": "Alice"})).unwrap();
        match req {
            WriteRequest::Create { bodies } => assert_eq!(bodies.len(), 1),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
