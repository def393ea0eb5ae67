//! Locate tabular data inside an arbitrary GraphQL result.
//!
//! Shopify returns collections either as `{ edges: [{ node }] }` connections,
//! as `{ nodes: [...] }`, or occasionally as plain arrays. The normalizer
//! picks the most plausible array with a fixed precedence and records where it
//! was found so the caller can show the source to the user.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Source path reported when the result itself is an array.
pub const ROOT_SOURCE_PATH: &str = "root";

/// Rows extracted from a raw result, plus where they were found.
///
/// When no array-shaped data exists at a recognized location, `rows` is empty
/// and `source_path` is `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedRows {
    /// Extracted rows. Usually objects, but heterogeneous shapes pass through.
    pub rows: Vec<Value>,
    /// Dotted path of the array inside the raw result (`"orders.edges"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
}

impl NormalizedRows {
    fn found(rows: Vec<Value>, source_path: impl Into<String>) -> Self {
        Self {
            rows,
            source_path: Some(source_path.into()),
        }
    }

    /// Returns `true` if no rows were found.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of extracted rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Column headers for tabular display: the field names of the first row.
    #[must_use]
    pub fn headers(&self) -> Vec<&str> {
        self.rows
            .first()
            .and_then(Value::as_object)
            .map(|row| row.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Extract the most plausible tabular array from `data`.
///
/// Resolution order, first match wins:
///
/// 1. `data` is an array: returned as-is with source path `"root"`.
/// 2. A top-level field holding an object with an `edges` array. Each edge is
///    replaced by its `node` when present.
/// 3. A top-level field holding an object with a `nodes` array.
/// 4. A top-level field that is itself an array.
///
/// Steps 2-4 each scan every top-level field, so an `edges` connection wins
/// over a `nodes` one even when it appears later in the object. Nested objects
/// are never searched beyond one level.
///
/// # Examples
///
/// ```
/// use chatbi_core::normalize;
/// use serde_json::json;
///
/// let result = normalize(&json!({ "orders": { "edges": [{ "node": { "id": 1 } }] } }));
/// assert_eq!(result.rows, vec![json!({ "id": 1 })]);
/// assert_eq!(result.source_path.as_deref(), Some("orders.edges"));
/// ```
#[must_use]
pub fn normalize(data: &Value) -> NormalizedRows {
    match data {
        Value::Array(items) => NormalizedRows::found(items.clone(), ROOT_SOURCE_PATH),
        Value::Object(fields) => normalize_object(fields),
        _ => NormalizedRows::default(),
    }
}

fn normalize_object(fields: &Map<String, Value>) -> NormalizedRows {
    if let Some((key, edges)) = find_connection(fields, "edges") {
        let rows = edges.iter().map(unwrap_edge).collect();
        return NormalizedRows::found(rows, format!("{key}.edges"));
    }

    if let Some((key, nodes)) = find_connection(fields, "nodes") {
        return NormalizedRows::found(nodes.clone(), format!("{key}.nodes"));
    }

    fields
        .iter()
        .find_map(|(key, value)| {
            value
                .as_array()
                .map(|items| NormalizedRows::found(items.clone(), key.clone()))
        })
        .unwrap_or_default()
}

/// Find the first top-level field whose value is an object carrying an array
/// under `collection`.
fn find_connection<'a>(
    fields: &'a Map<String, Value>,
    collection: &str,
) -> Option<(&'a str, &'a Vec<Value>)> {
    fields.iter().find_map(|(key, value)| {
        value
            .as_object()
            .and_then(|connection| connection.get(collection))
            .and_then(Value::as_array)
            .map(|items| (key.as_str(), items))
    })
}

/// An edge that is an object with a `node` field becomes that node; anything
/// else passes through unchanged.
fn unwrap_edge(edge: &Value) -> Value {
    edge.as_object()
        .and_then(|fields| fields.get("node"))
        .unwrap_or(edge)
        .clone()
}
