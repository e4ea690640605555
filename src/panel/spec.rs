//! Declarative panel definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Time bucketing unit a query aggregates by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Day,
    Week,
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Day => "day",
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }
}

/// The engine a panel's query runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryEngine {
    Legacy,
    Current,
}

/// Which engine a panel wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendPreference {
    Legacy,
    Current,
    /// Follow the per-render backend flag. Lets metrics migrate one at a time.
    PreferCurrent,
}

impl BackendPreference {
    pub fn resolve(self, use_current: bool) -> QueryEngine {
        match self {
            BackendPreference::Legacy => QueryEngine::Legacy,
            BackendPreference::Current => QueryEngine::Current,
            BackendPreference::PreferCurrent if use_current => QueryEngine::Current,
            BackendPreference::PreferCurrent => QueryEngine::Legacy,
        }
    }
}

/// How y-axis values are displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueFormat {
    /// The number as is.
    Plain,
    /// Already a percentage: `12.5` → `12.5 %`.
    Percent,
    /// A fraction shown as a percentage: `0.125` → `12.5 %`.
    Ratio,
}

impl ValueFormat {
    pub fn render(&self, value: f64) -> String {
        match self {
            ValueFormat::Plain => format!("{}", value),
            ValueFormat::Percent => format!("{} %", value),
            ValueFormat::Ratio => format!("{} %", value * 100.0),
        }
    }
}

/// One chart on the dashboard, before parameters are resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PanelSpec {
    /// Metric id; keys the override and reshape tables.
    pub id: String,
    pub title: String,
    pub query_name: String,
    pub query_collection: Option<String>,
    pub backend: BackendPreference,
    pub granularity: Granularity,
    pub time_field: String,
    pub value_field: String,
    pub group_by_field: Option<String>,
    pub y_axis_label: Option<String>,
    pub time_display_format: Option<String>,
    pub value_format: ValueFormat,
    /// Passed to the renderer verbatim.
    pub additional_options: Option<Value>,
}

impl PanelSpec {
    /// A current-engine panel whose metric id is its query name.
    pub fn new(query_name: impl Into<String>, title: impl Into<String>) -> Self {
        let query_name = query_name.into();
        Self {
            id: query_name.clone(),
            title: title.into(),
            query_name,
            query_collection: None,
            backend: BackendPreference::Current,
            granularity: Granularity::Week,
            time_field: String::new(),
            value_field: String::new(),
            group_by_field: None,
            y_axis_label: None,
            time_display_format: None,
            value_format: ValueFormat::Plain,
            additional_options: None,
        }
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.query_collection = Some(collection.into());
        self
    }

    pub fn backend(mut self, backend: BackendPreference) -> Self {
        self.backend = backend;
        self
    }

    pub fn granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = granularity;
        self
    }

    pub fn fields(mut self, time_field: impl Into<String>, value_field: impl Into<String>) -> Self {
        self.time_field = time_field.into();
        self.value_field = value_field.into();
        self
    }

    pub fn group_by(mut self, field: impl Into<String>) -> Self {
        self.group_by_field = Some(field.into());
        self
    }

    pub fn y_axis_label(mut self, label: impl Into<String>) -> Self {
        self.y_axis_label = Some(label.into());
        self
    }

    pub fn time_display_format(mut self, format: impl Into<String>) -> Self {
        self.time_display_format = Some(format.into());
        self
    }

    pub fn value_format(mut self, format: ValueFormat) -> Self {
        self.value_format = format;
        self
    }

    pub fn options(mut self, options: Value) -> Self {
        self.additional_options = Some(options);
        self
    }
}
