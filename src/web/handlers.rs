//! HTTP request handlers.

use super::AppState;
use crate::dashboard::RenderedPanel;
use crate::panel::PanelDescriptor;
use crate::params::{
    parse_time_text, to_current_params, to_legacy_params, CurrentQueryParams, LegacyQueryParam,
    ParamError, TimeRange,
};
use crate::reshape::Row;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Shared
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub stop: Option<String>,
    /// Overrides the configured backend flag for this render.
    #[serde(default)]
    pub use_current: Option<bool>,
}

/// Resolve the request window. Missing bounds default to the configured
/// lookback ending now; unparseable bounds are treated as missing.
fn resolve_range(query: &RangeQuery, lookback_months: u32) -> Result<TimeRange, ParamError> {
    let stop = query
        .stop
        .as_deref()
        .and_then(parse_time_text)
        .unwrap_or_else(Utc::now);

    let start = match query.start.as_deref().and_then(parse_time_text) {
        Some(start) => start,
        None => TimeRange::lookback(stop, lookback_months)?.start(),
    };

    TimeRange::new(start, stop)
}

/// Status-tagged panel result as sent to the renderer.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PanelView {
    Ok {
        id: String,
        descriptor: PanelDescriptor,
    },
    Error {
        id: String,
        error: String,
    },
}

impl From<RenderedPanel> for PanelView {
    fn from(panel: RenderedPanel) -> Self {
        match panel.result {
            Ok(descriptor) => PanelView::Ok {
                id: panel.id,
                descriptor,
            },
            Err(e) => PanelView::Error {
                id: panel.id,
                error: e.to_string(),
            },
        }
    }
}

// ============================================================================
// API: Panels
// ============================================================================

#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub range: TimeRange,
    pub use_current: bool,
    pub panels: Vec<PanelView>,
}

pub async fn handle_get_panels(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    let range = match resolve_range(&query, state.config.lookback_months) {
        Ok(r) => r,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let use_current = query.use_current.unwrap_or(state.config.use_current_backend);

    let panels = state
        .dashboard
        .render(&range, use_current)
        .into_iter()
        .map(PanelView::from)
        .collect();

    Json(DashboardResponse {
        range,
        use_current,
        panels,
    })
    .into_response()
}

pub async fn handle_get_panel(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    let range = match resolve_range(&query, state.config.lookback_months) {
        Ok(r) => r,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let use_current = query.use_current.unwrap_or(state.config.use_current_backend);

    match state.dashboard.render_panel(&id, &range, use_current) {
        Some(panel) => Json(PanelView::from(panel)).into_response(),
        None => (StatusCode::NOT_FOUND, "Panel not found").into_response(),
    }
}

// ============================================================================
// API: Rows
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RowsResponse {
    pub rows: Vec<Row>,
    /// The y-axis value of each row as the panel displays it.
    pub formatted: Vec<Option<String>>,
    pub warnings: Vec<String>,
}

/// Run a panel's data reader over rows returned by its query.
pub async fn handle_read_rows(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RangeQuery>,
    Json(rows): Json<Vec<Row>>,
) -> impl IntoResponse {
    let range = match resolve_range(&query, state.config.lookback_months) {
        Ok(r) => r,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };
    let use_current = query.use_current.unwrap_or(state.config.use_current_backend);

    let descriptor = match state.dashboard.render_panel(&id, &range, use_current) {
        Some(RenderedPanel { result: Ok(d), .. }) => d,
        Some(RenderedPanel { result: Err(e), .. }) => {
            return (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response()
        }
        None => return (StatusCode::NOT_FOUND, "Panel not found").into_response(),
    };

    let read = match descriptor.read_rows(&rows) {
        Ok(r) => r,
        Err(e) => return (StatusCode::UNPROCESSABLE_ENTITY, e.to_string()).into_response(),
    };

    let formatted = read
        .rows
        .iter()
        .map(|row| {
            row.get(&descriptor.value_field)
                .and_then(Value::as_f64)
                .map(|v| descriptor.format_value(v))
        })
        .collect();

    Json(RowsResponse {
        rows: read.rows,
        formatted,
        warnings: read.missing.iter().map(|m| m.to_string()).collect(),
    })
    .into_response()
}

// ============================================================================
// API: Params
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ParamsResponse {
    pub range: TimeRange,
    pub legacy: Vec<LegacyQueryParam>,
    pub current: CurrentQueryParams,
}

/// Both engines' time params for the requested window.
pub async fn handle_get_params(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> impl IntoResponse {
    let range = match resolve_range(&query, state.config.lookback_months) {
        Ok(r) => r,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    let legacy = to_legacy_params(&range);
    match to_current_params(&legacy) {
        Ok(current) => Json(ParamsResponse {
            range,
            legacy,
            current,
        })
        .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::kpis::kpi_dashboard;
    use crate::web::routes;

    use axum::body::Body;
    use axum::http::Request;
    use axum::Router;
    use serde_json::json;
    use std::sync::Arc;
    use tower::ServiceExt;

    const RANGE: &str = "start=2024-09-01T00:00:00Z&stop=2025-03-01T00:00:00Z";

    fn app() -> Router {
        routes(AppState {
            config: ServerConfig::default(),
            dashboard: Arc::new(kpi_dashboard(&[])),
        })
    }

    async fn send(request: Request<Body>) -> (StatusCode, Value) {
        let resp = app().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn get(uri: &str) -> (StatusCode, Value) {
        send(Request::builder().uri(uri).body(Body::empty()).unwrap()).await
    }

    async fn post(uri: &str, body: Value) -> (StatusCode, Value) {
        send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    #[test]
    fn test_resolve_range_defaults() {
        let query = RangeQuery {
            start: None,
            stop: Some("2024-07-01T00:00:00Z".to_string()),
            use_current: None,
        };
        let range = resolve_range(&query, 6).unwrap();
        assert_eq!(range.start().to_rfc3339(), "2024-01-01T00:00:00+00:00");

        let inverted = RangeQuery {
            start: Some("2024-07-02".to_string()),
            stop: Some("2024-07-01".to_string()),
            use_current: None,
        };
        assert!(matches!(
            resolve_range(&inverted, 6),
            Err(ParamError::InvalidRange { .. })
        ));
    }

    #[tokio::test]
    async fn test_get_panels() {
        let (status, body) = get(&format!("/api/panels?{}", RANGE)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["use_current"], true);

        let panels = body["panels"].as_array().unwrap();
        assert_eq!(panels.len(), 10);
        assert!(panels.iter().all(|p| p["status"] == "ok"));
        assert_eq!(panels[0]["descriptor"]["yAxisRenderer"], "ratio");
    }

    #[tokio::test]
    async fn test_get_panels_with_legacy_flag() {
        let (status, body) = get(&format!("/api/panels?{}&use_current=false", RANGE)).await;
        assert_eq!(status, StatusCode::OK);

        let reverts = body["panels"]
            .as_array()
            .unwrap()
            .iter()
            .find(|p| p["id"] == "num_reverts")
            .unwrap();
        assert_eq!(reverts["descriptor"]["engine"], "legacy");
        assert_eq!(reverts["descriptor"]["queryParams"][0]["type"], "string");
    }

    #[tokio::test]
    async fn test_get_single_panel() {
        let (status, body) = get(&format!("/api/panels/strict_lag_historical?{}", RANGE)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["descriptor"]["queryParams"]["startTime"],
            "2024-10-01T00:00:00.000"
        );

        let (status, _) = get("/api/panels/no_such_metric").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = get("/api/panels?start=2025-01-01T00:00:00Z&stop=2024-01-01T00:00:00Z").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_read_rows_reshapes() {
        let rows = json!([
            {"bucket": "2024-05-01", "p25": 1, "p50": 2, "p75": 3, "p90": 4},
            {"bucket": "2024-05-08", "p25": 5, "p50": 6, "p75": 7},
        ]);
        let (status, body) = post("/api/panels/ttrs_percentiles/rows", rows).await;
        assert_eq!(status, StatusCode::OK);

        let out = body["rows"].as_array().unwrap();
        assert_eq!(out.len(), 8);
        assert_eq!(out[0]["percentile"], "p25");
        assert_eq!(out[0]["ttrs_mins"], 1);
        assert_eq!(out[7]["ttrs_mins"], Value::Null);

        assert_eq!(body["formatted"][3], "4");
        assert_eq!(body["formatted"][7], Value::Null);
        assert_eq!(body["warnings"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_read_rows_missing_time_field() {
        let rows = json!([{"num": 3, "code": "ghfirst"}]);
        let (status, _) = post("/api/panels/num_reverts/rows", rows).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_get_params() {
        let (status, body) = get("/api/params?start=2024-01-01T00:00:00Z&stop=2024-06-01T00:00:00Z").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["legacy"].as_array().unwrap().len(), 2);
        assert_eq!(body["legacy"][0]["value"], "2024-01-01T00:00:00Z");
        assert_eq!(body["current"]["startTime"], "2024-01-01T00:00:00.000");
        assert_eq!(body["current"]["stopTime"], "2024-06-01T00:00:00.000");
    }

    #[tokio::test]
    async fn test_get_params_ignores_five_digit_years() {
        let (status, body) = get("/api/params?start=2024-01-01T00:00:00Z&stop=%2B10000-01-01T00:00:00").await;
        assert_eq!(status, StatusCode::OK);

        let stop = body["current"]["stopTime"].as_str().unwrap();
        assert_eq!(stop.len(), "YYYY-MM-DDTHH:mm:ss.SSS".len());
        assert!(!stop.starts_with('+'));
        assert!(body["current"]["startTime"].as_str().unwrap() <= stop);
    }
}
