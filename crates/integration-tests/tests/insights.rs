//! Insights and CSV export tests.
//!
//! These tests require the server running (cargo run -p chatbi-server).

use chatbi_integration_tests::{base_url, client};
use reqwest::StatusCode;
use serde_json::{Value, json};

fn orders() -> Value {
    json!({ "orders": { "edges": [
        { "node": { "name": "#1001", "subtotal": 20 } },
        { "node": { "name": "#1002", "subtotal": 5 } }
    ] } })
}

#[tokio::test]
#[ignore = "Requires running chatbi server"]
async fn test_insights() {
    let resp = client()
        .post(format!("{}/api/insights", base_url()))
        .json(&json!({ "data": orders() }))
        .send()
        .await
        .expect("Failed to reach server");
    assert_eq!(resp.status(), StatusCode::OK);

    let body: Value = resp.json().await.expect("Invalid JSON");
    assert_eq!(body["table"]["sourcePath"], "orders.edges");
    assert_eq!(body["chart"]["nameKey"], "name");
    assert_eq!(body["chart"]["valueKey"], "subtotal");
}

#[tokio::test]
#[ignore = "Requires running chatbi server"]
async fn test_export_csv() {
    let resp = client()
        .post(format!("{}/api/export/csv", base_url()))
        .json(&json!({ "data": orders(), "fileName": "orders" }))
        .send()
        .await
        .expect("Failed to reach server");
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()["content-disposition"],
        "attachment; filename=\"orders.csv\""
    );
    assert_eq!(
        resp.text().await.expect("Failed to read body"),
        "name,subtotal\n#1001,20\n#1002,5\n"
    );
}
