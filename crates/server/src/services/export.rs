//! CSV export of normalized result rows.

use serde_json::Value;

/// Default download name.
pub const DEFAULT_FILE_NAME: &str = "export.csv";

/// Column used for rows that are not JSON objects.
const SCALAR_COLUMN: &str = "value";

/// Errors that can occur while writing CSV.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// CSV encoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Flushing the output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write rows as CSV.
///
/// The header is the union of object keys in first-seen order. Nested values
/// are written as compact JSON, nulls and missing keys as empty cells. An
/// empty row set produces an empty body.
///
/// # Errors
///
/// Returns an error if the CSV writer fails.
pub fn rows_to_csv(rows: &[Value]) -> Result<Vec<u8>, ExportError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let header = header_for(rows);
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&header)?;

    for row in rows {
        let record: Vec<String> = match row {
            Value::Object(fields) => header
                .iter()
                .map(|key| fields.get(key.as_str()).map(cell).unwrap_or_default())
                .collect(),
            scalar => header
                .iter()
                .map(|key| {
                    if key == SCALAR_COLUMN {
                        cell(scalar)
                    } else {
                        String::new()
                    }
                })
                .collect(),
        };
        writer.write_record(&record)?;
    }

    writer.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

fn header_for(rows: &[Value]) -> Vec<String> {
    let mut header: Vec<String> = Vec::new();
    for row in rows {
        match row {
            Value::Object(fields) => {
                for key in fields.keys() {
                    if !header.iter().any(|h| h == key) {
                        header.push(key.clone());
                    }
                }
            }
            _ => {
                if !header.iter().any(|h| h == SCALAR_COLUMN) {
                    header.push(SCALAR_COLUMN.to_string());
                }
            }
        }
    }
    header
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).unwrap_or_else(|_| value.to_string())
        }
    }
}

/// Reduce a requested download name to a safe `*.csv` file name.
#[must_use]
pub fn safe_file_name(requested: Option<&str>) -> String {
    let stem: String = requested
        .map(str::trim)
        .map(|name| name.strip_suffix(".csv").unwrap_or(name))
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ' '))
        .collect();
    let stem = stem.trim_matches(|c: char| c == '.' || c == ' ');

    if stem.is_empty() {
        DEFAULT_FILE_NAME.to_string()
    } else {
        format!("{stem}.csv")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn csv_text(rows: &[Value]) -> String {
        String::from_utf8(rows_to_csv(rows).unwrap()).unwrap()
    }

    #[test]
    fn test_union_header_in_first_seen_order() {
        let rows = vec![
            json!({ "title": "Tea", "price": "4.50" }),
            json!({ "title": "Mug", "vendor": "Acme", "price": "12.00" }),
        ];
        assert_eq!(
            csv_text(&rows),
            "title,price,vendor\nTea,4.50,\nMug,12.00,Acme\n"
        );
    }

    #[test]
    fn test_nested_values_are_compact_json() {
        let rows = vec![json!({
            "name": "#1001",
            "totalPriceSet": { "shopMoney": { "amount": "10.0" } },
            "tags": ["gift", "vip"],
            "note": null
        })];
        assert_eq!(
            csv_text(&rows),
            "name,totalPriceSet,tags,note\n#1001,\"{\"\"shopMoney\"\":{\"\"amount\"\":\"\"10.0\"\"}}\",\"[\"\"gift\"\",\"\"vip\"\"]\",\n"
        );
    }

    #[test]
    fn test_empty_rows_produce_empty_body() {
        assert!(rows_to_csv(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_scalar_rows_use_value_column() {
        assert_eq!(csv_text(&[json!(3), json!("x")]), "value\n3\nx\n");
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name(None), "export.csv");
        assert_eq!(safe_file_name(Some("orders-march")), "orders-march.csv");
        assert_eq!(safe_file_name(Some("orders.csv")), "orders.csv");
        assert_eq!(safe_file_name(Some("../../etc/passwd")), "etcpasswd.csv");
        assert_eq!(safe_file_name(Some("\"; rm")), "rm.csv");
        assert_eq!(safe_file_name(Some("...")), "export.csv");
    }
}
