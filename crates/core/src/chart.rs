//! Chart field inference for normalized rows.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Label key used when the sample row has no fields at all.
pub const DEFAULT_NAME_KEY: &str = "name";

/// The category and measure fields chosen for a bar chart.
///
/// A `None` value key means the rows cannot be charted; callers render an
/// empty state instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartKeys {
    /// Field used for the category axis.
    pub name_key: String,
    /// First numeric field, if any.
    pub value_key: Option<String>,
}

/// One bar of a chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// Category label.
    pub name: String,
    /// Measure.
    pub value: f64,
}

/// Pick chart keys by inspecting the first row only.
///
/// The value key is the first field (in document order) holding a JSON number.
/// The name key is the first field other than the value key, falling back to
/// the first field, then to `"name"`. This is a heuristic and does not try to
/// find a semantically meaningful pair.
///
/// # Examples
///
/// ```
/// use chatbi_core::pick_keys;
/// use serde_json::json;
///
/// let keys = pick_keys(&[json!({ "name": "A", "qty": 5 })]);
/// assert_eq!(keys.name_key, "name");
/// assert_eq!(keys.value_key.as_deref(), Some("qty"));
/// ```
#[must_use]
pub fn pick_keys(rows: &[Value]) -> ChartKeys {
    let empty = Map::new();
    let sample = rows.first().and_then(Value::as_object).unwrap_or(&empty);

    let value_key = sample
        .iter()
        .find(|(_, value)| value.is_number())
        .map(|(key, _)| key.clone());

    let name_key = sample
        .keys()
        .find(|key| Some(key.as_str()) != value_key.as_deref())
        .or_else(|| sample.keys().next())
        .map_or_else(|| DEFAULT_NAME_KEY.to_string(), Clone::clone);

    ChartKeys {
        name_key,
        value_key,
    }
}

/// Project rows onto `(name, value)` pairs using the chosen keys.
///
/// Rows whose measure is missing or not numeric are skipped. Returns an empty
/// list when the keys have no value key.
#[must_use]
pub fn chart_points(rows: &[Value], keys: &ChartKeys) -> Vec<ChartPoint> {
    let Some(value_key) = keys.value_key.as_deref() else {
        return Vec::new();
    };

    rows.iter()
        .filter_map(|row| {
            let value = row.get(value_key).and_then(Value::as_f64)?;
            let name = row.get(&keys.name_key).map(label).unwrap_or_default();
            Some(ChartPoint { name, value })
        })
        .collect()
}

fn label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
