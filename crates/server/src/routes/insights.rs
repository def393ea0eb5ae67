//! Derived views of a raw query result: table rows, chart keys, CSV.

use axum::{
    Json, Router,
    http::header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use chatbi_core::{ChartKeys, ChartPoint, NormalizedRows, chart_points, normalize, pick_keys};

use crate::error::AppError;
use crate::services::{rows_to_csv, safe_file_name};
use crate::state::AppState;

/// Build the insights router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/insights", post(insights))
        .route("/api/export/csv", post(export_csv))
}

#[derive(Debug, Deserialize)]
struct InsightsRequest {
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Serialize)]
struct InsightsResponse {
    table: NormalizedRows,
    chart: ChartKeys,
    points: Vec<ChartPoint>,
}

/// POST /api/insights - Normalize a result and pick chart keys.
async fn insights(Json(request): Json<InsightsRequest>) -> Json<InsightsResponse> {
    let table = normalize(&request.data);
    let chart = pick_keys(&table.rows);
    let points = chart_points(&table.rows, &chart);

    Json(InsightsResponse {
        table,
        chart,
        points,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportRequest {
    #[serde(default)]
    data: Value,
    file_name: Option<String>,
}

/// POST /api/export/csv - Download the normalized rows as CSV.
async fn export_csv(Json(request): Json<ExportRequest>) -> Result<Response, AppError> {
    let table = normalize(&request.data);
    let body = rows_to_csv(&table.rows)?;
    let file_name = safe_file_name(request.file_name.as_deref());

    tracing::debug!(rows = table.rows.len(), file_name = %file_name, "CSV export");

    Ok((
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    )
        .into_response())
}
