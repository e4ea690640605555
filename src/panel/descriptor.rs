//! Panel descriptor assembly.
//!
//! A descriptor is the complete record handed to the chart renderer: which
//! query to run on which engine, with which parameters, and how to read the
//! rows that come back.

use super::{Granularity, MetricOverride, PanelError, PanelSpec, QueryEngine, ValueFormat};
use crate::params::{
    merge, to_current_params, to_legacy_params, CurrentQueryParams, LegacyQueryParam,
    ParamError, TimeRange,
};
use crate::reshape::{reshape_with_report, FieldMissing, ReshapeRule, Row};

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

/// A parameter set in the schema of the engine it is bound for.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryParams {
    Legacy(Vec<LegacyQueryParam>),
    Current(CurrentQueryParams),
}

impl QueryParams {
    /// Time bounds for `range` in `engine`'s schema.
    pub fn for_engine(engine: QueryEngine, range: &TimeRange) -> Result<Self, ParamError> {
        let legacy = to_legacy_params(range);
        match engine {
            QueryEngine::Legacy => Ok(QueryParams::Legacy(legacy)),
            QueryEngine::Current => Ok(QueryParams::Current(to_current_params(&legacy)?)),
        }
    }

    pub fn engine(&self) -> QueryEngine {
        match self {
            QueryParams::Legacy(_) => QueryEngine::Legacy,
            QueryParams::Current(_) => QueryEngine::Current,
        }
    }
}

/// The renderer-facing record for one panel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PanelDescriptor {
    pub id: String,
    pub title: String,
    pub query_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_collection: Option<String>,
    pub engine: QueryEngine,
    pub query_params: QueryParams,
    pub granularity: Granularity,
    #[serde(rename = "timeFieldName")]
    pub time_field: String,
    #[serde(rename = "yAxisFieldName")]
    pub value_field: String,
    #[serde(rename = "groupByFieldName", skip_serializing_if = "Option::is_none")]
    pub group_by_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_axis_label: Option<String>,
    #[serde(rename = "timeFieldDisplayFormat", skip_serializing_if = "Option::is_none")]
    pub time_display_format: Option<String>,
    #[serde(rename = "yAxisRenderer")]
    pub value_format: ValueFormat,
    #[serde(rename = "dataReader", skip_serializing_if = "Option::is_none")]
    pub reshape: Option<ReshapeRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_options: Option<Value>,
}

/// Rows ready for the renderer, plus the series values that had no data.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelRows {
    pub rows: Vec<Row>,
    pub missing: Vec<FieldMissing>,
}

impl PanelDescriptor {
    pub fn format_value(&self, value: f64) -> String {
        self.value_format.render(value)
    }

    /// Apply the panel's reshape rule (identity if none) to query results.
    ///
    /// Every resulting row must carry the time and value fields.
    pub fn read_rows(&self, rows: &[Row]) -> Result<PanelRows, PanelError> {
        let (rows, missing) = match &self.reshape {
            Some(rule) => reshape_with_report(rows, rule),
            None => (rows.to_vec(), Vec::new()),
        };

        for (i, row) in rows.iter().enumerate() {
            for field in [&self.time_field, &self.value_field] {
                if !row.contains_key(field.as_str()) {
                    return Err(PanelError::MissingResultField {
                        panel: self.id.clone(),
                        field: field.clone(),
                        row: i,
                    });
                }
            }
        }

        Ok(PanelRows { rows, missing })
    }
}

fn query_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap())
}

/// Check the bindings of `spec` and its reshape rule.
pub fn validate_panel(spec: &PanelSpec, reshape: Option<&ReshapeRule>) -> Result<(), PanelError> {
    let invalid = |reason: String| PanelError::InvalidPanelSpec {
        panel: spec.id.clone(),
        reason,
    };

    if spec.time_field.trim().is_empty() {
        return Err(invalid("timeField is empty".to_string()));
    }
    if spec.value_field.trim().is_empty() {
        return Err(invalid("valueField is empty".to_string()));
    }
    if !query_name_pattern().is_match(&spec.query_name) {
        return Err(invalid(format!("query name {:?} is not an identifier", spec.query_name)));
    }

    if let Some(rule) = reshape {
        if rule.value_field != spec.value_field {
            return Err(invalid(format!(
                "reshape writes `{}` but the panel reads `{}`",
                rule.value_field, spec.value_field
            )));
        }
        if spec.group_by_field.as_deref() != Some(rule.label_field.as_str()) {
            return Err(invalid(format!(
                "reshape labels series in `{}` but the panel groups by {:?}",
                rule.label_field, spec.group_by_field
            )));
        }
    }

    Ok(())
}

/// Build the descriptor for one panel.
///
/// The engine comes from the panel's preference and `use_current`. The metric
/// override is laid over current engine params last, so a migration floor
/// always wins over the computed range. Legacy params carry the time bounds
/// only.
pub fn build_panel(
    spec: &PanelSpec,
    range: &TimeRange,
    use_current: bool,
    metric_override: Option<&MetricOverride>,
    reshape: Option<&ReshapeRule>,
) -> Result<PanelDescriptor, PanelError> {
    validate_panel(spec, reshape)?;

    let engine = spec.backend.resolve(use_current);
    let mut query_params = QueryParams::for_engine(engine, range).map_err(|source| PanelError::Params {
        panel: spec.id.clone(),
        source,
    })?;

    if let Some(entry) = metric_override {
        query_params = match query_params {
            QueryParams::Current(params) => QueryParams::Current(merge(&params, &entry.overlay(range))),
            legacy => {
                tracing::debug!("Panel {}: legacy engine, overrides not applied", spec.id);
                legacy
            }
        };
    }

    Ok(PanelDescriptor {
        id: spec.id.clone(),
        title: spec.title.clone(),
        query_name: spec.query_name.clone(),
        query_collection: spec.query_collection.clone(),
        engine: query_params.engine(),
        query_params,
        granularity: spec.granularity,
        time_field: spec.time_field.clone(),
        value_field: spec.value_field.clone(),
        group_by_field: spec.group_by_field.clone(),
        y_axis_label: spec.y_axis_label.clone(),
        time_display_format: spec.time_display_format.clone(),
        value_format: spec.value_format,
        reshape: reshape.cloned(),
        additional_options: spec.additional_options.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::panel::BackendPreference;
    use crate::params::{ParamType, ParamValue};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn range() -> TimeRange {
        TimeRange::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        )
        .unwrap()
    }

    fn spec() -> PanelSpec {
        PanelSpec::new("num_reverts", "# of reverts")
            .backend(BackendPreference::PreferCurrent)
            .fields("bucket", "num")
            .group_by("code")
    }

    fn row(v: Value) -> Row {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_prefer_current_follows_flag() {
        let current = build_panel(&spec(), &range(), true, None, None).unwrap();
        assert_eq!(current.engine, QueryEngine::Current);
        match &current.query_params {
            QueryParams::Current(p) => {
                assert_eq!(p.time_text("startTime"), Some("2024-01-01T00:00:00.000"));
            }
            other => panic!("expected current params, got {:?}", other),
        }

        let legacy = build_panel(&spec(), &range(), false, None, None).unwrap();
        assert_eq!(legacy.engine, QueryEngine::Legacy);
        match &legacy.query_params {
            QueryParams::Legacy(p) => {
                assert_eq!(p.len(), 2);
                assert!(p.iter().all(|param| param.param_type == ParamType::String));
            }
            other => panic!("expected legacy params, got {:?}", other),
        }
    }

    #[test]
    fn test_override_floor_wins() {
        let floor = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let entry = MetricOverride::new()
            .start_floor(floor)
            .param("repoFullName", "pytorch/pytorch");

        let panel = build_panel(&spec(), &range(), true, Some(&entry), None).unwrap();
        let json = serde_json::to_value(&panel.query_params).unwrap();
        assert_eq!(
            json,
            json!({
                "startTime": "2024-03-01T00:00:00.000",
                "stopTime": "2024-06-01T00:00:00.000",
                "repoFullName": "pytorch/pytorch",
            })
        );

    }

    #[test]
    fn test_override_skipped_on_legacy_engine() {
        let entry = MetricOverride::new()
            .start_floor(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap())
            .granularity(Granularity::Week)
            .param("workflowNames", ParamValue::list(["lint", "pull"]));

        let legacy = build_panel(&spec(), &range(), false, Some(&entry), None).unwrap();
        assert_eq!(legacy.engine, QueryEngine::Legacy);
        assert_eq!(
            legacy.query_params,
            QueryParams::Legacy(to_legacy_params(&range()))
        );
    }

    #[test]
    fn test_empty_fields_rejected() {
        let no_value = spec().fields("bucket", "");
        let err = build_panel(&no_value, &range(), true, None, None).unwrap_err();
        assert!(matches!(err, PanelError::InvalidPanelSpec { .. }));

        let no_time = spec().fields("  ", "num");
        assert!(matches!(
            build_panel(&no_time, &range(), true, None, None),
            Err(PanelError::InvalidPanelSpec { .. })
        ));

        let bad_query = PanelSpec::new("drop table;", "x").fields("bucket", "num");
        assert!(validate_panel(&bad_query, None).is_err());
    }

    #[test]
    fn test_reshape_rule_must_match_bindings() {
        let rule = ReshapeRule::percentiles("percentile", "ttrs_mins", &["p50"]);
        let ttrs = PanelSpec::new("ttrs_percentiles", "TTRS")
            .fields("bucket", "ttrs_mins")
            .group_by("percentile");
        assert!(validate_panel(&ttrs, Some(&rule)).is_ok());

        let wrong_value = ttrs.clone().fields("bucket", "minutes");
        assert!(validate_panel(&wrong_value, Some(&rule)).is_err());

        let mut no_group = ttrs.clone();
        no_group.group_by_field = None;
        assert!(validate_panel(&no_group, Some(&rule)).is_err());
    }

    #[test]
    fn test_renderer_record_shape() {
        let rule = ReshapeRule::percentiles("percentile", "num", &["p50"]);
        let spec = spec().group_by("percentile").y_axis_label("Hours").options(json!({"yAxis": {"max": 10}}));
        let panel = build_panel(&spec, &range(), true, None, Some(&rule)).unwrap();

        let json = serde_json::to_value(&panel).unwrap();
        assert_eq!(json["queryName"], "num_reverts");
        assert_eq!(json["engine"], "current");
        assert_eq!(json["granularity"], "week");
        assert_eq!(json["timeFieldName"], "bucket");
        assert_eq!(json["yAxisFieldName"], "num");
        assert_eq!(json["groupByFieldName"], "percentile");
        assert_eq!(json["yAxisLabel"], "Hours");
        assert_eq!(json["yAxisRenderer"], "plain");
        assert_eq!(json["dataReader"]["labelField"], "percentile");
        assert_eq!(json["additionalOptions"]["yAxis"]["max"], 10);
        assert!(json.get("queryCollection").is_none());
    }

    #[test]
    fn test_read_rows() {
        let plain = build_panel(&spec(), &range(), true, None, None).unwrap();
        let rows = vec![row(json!({"bucket": "2024-05-01", "num": 3, "code": "ghfirst"}))];
        let read = plain.read_rows(&rows).unwrap();
        assert_eq!(read.rows, rows);
        assert!(read.missing.is_empty());

        let missing_value = vec![row(json!({"bucket": "2024-05-01"}))];
        assert_eq!(
            plain.read_rows(&missing_value),
            Err(PanelError::MissingResultField {
                panel: "num_reverts".to_string(),
                field: "num".to_string(),
                row: 0,
            })
        );

        let rule = ReshapeRule::percentiles("percentile", "num", &["p25", "p50"]);
        let shaped_spec = spec().group_by("percentile");
        let shaped = build_panel(&shaped_spec, &range(), true, None, Some(&rule)).unwrap();
        let wide = vec![row(json!({"bucket": "2024-05-01", "p25": 1}))];
        let read = shaped.read_rows(&wide).unwrap();
        assert_eq!(read.rows.len(), 2);
        assert_eq!(read.rows[1]["num"], Value::Null);
        assert_eq!(read.missing.len(), 1);
    }
}
