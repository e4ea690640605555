//! Wide → long result reshaping.
//!
//! Some queries return one row per time bucket with a field per series
//! (`{bucket, p25, p50, ...}`), while the chart renderer groups series by a
//! label field. A [`ReshapeRule`] names the series to emit and where each one
//! reads its value from.

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

/// A result row: field name → value.
pub type Row = Map<String, Value>;

/// One output series and the wide-row field that feeds it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesTarget {
    pub series: String,
    pub source_field: String,
}

/// How to turn one wide row into one long row per series.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReshapeRule {
    /// Field that receives the series name on each long row.
    pub label_field: String,
    /// Field that receives the series value on each long row.
    pub value_field: String,
    pub targets: Vec<SeriesTarget>,
}

impl ReshapeRule {
    pub fn new(label_field: impl Into<String>, value_field: impl Into<String>) -> Self {
        Self {
            label_field: label_field.into(),
            value_field: value_field.into(),
            targets: Vec::new(),
        }
    }

    pub fn target(mut self, series: impl Into<String>, source_field: impl Into<String>) -> Self {
        self.targets.push(SeriesTarget {
            series: series.into(),
            source_field: source_field.into(),
        });
        self
    }

    /// A rule whose series names double as their source fields, e.g. `p50`.
    pub fn percentiles(label_field: &str, value_field: &str, labels: &[&str]) -> Self {
        labels
            .iter()
            .fold(Self::new(label_field, value_field), |rule, p| rule.target(*p, *p))
    }
}

/// A wide row lacked the source field for a series; the series got `null`.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("row {row}: no `{field}` field for series `{series}`")]
pub struct FieldMissing {
    pub row: usize,
    pub series: String,
    pub field: String,
}

/// Reshape `rows` by `rule`. See [`reshape_with_report`].
pub fn reshape(rows: &[Row], rule: &ReshapeRule) -> Vec<Row> {
    reshape_with_report(rows, rule).0
}

/// Reshape `rows` by `rule`, also returning every source field that was absent.
///
/// Emits exactly `rows.len() * rule.targets.len()` rows, grouped by input row
/// with series in rule order. Each output row is a copy of its input row with
/// the label and value fields overwritten. Missing source fields produce a
/// `null` value rather than an error: gaps in historical data are normal.
pub fn reshape_with_report(rows: &[Row], rule: &ReshapeRule) -> (Vec<Row>, Vec<FieldMissing>) {
    let mut out = Vec::with_capacity(rows.len() * rule.targets.len());
    let mut missing = Vec::new();

    for (i, row) in rows.iter().enumerate() {
        for target in &rule.targets {
            let value = match row.get(&target.source_field) {
                Some(v) => v.clone(),
                None => {
                    missing.push(FieldMissing {
                        row: i,
                        series: target.series.clone(),
                        field: target.source_field.clone(),
                    });
                    Value::Null
                }
            };

            let mut long = row.clone();
            long.insert(rule.label_field.clone(), Value::String(target.series.clone()));
            long.insert(rule.value_field.clone(), value);
            out.push(long);
        }
    }

    if !missing.is_empty() {
        tracing::debug!(
            "Reshape: {} series values missing across {} rows, emitted as null",
            missing.len(),
            rows.len()
        );
    }

    (out, missing)
}

/// Reshape rules keyed by metric id.
#[derive(Debug, Clone, Default)]
pub struct ReshapeTable {
    rules: HashMap<String, ReshapeRule>,
}

impl ReshapeTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, metric: impl Into<String>, rule: ReshapeRule) -> Self {
        self.rules.insert(metric.into(), rule);
        self
    }

    pub fn get(&self, metric: &str) -> Option<&ReshapeRule> {
        self.rules.get(metric)
    }
}
