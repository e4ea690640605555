//! Per-metric parameter overrides.

use super::Granularity;
use crate::params::{ParamMap, ParamValue, TimeRange, START_TIME};

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Parameters a metric lays over its computed engine params.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricOverride {
    /// Earliest start the metric has data for (e.g. a migration cutover).
    pub start_floor: Option<DateTime<Utc>>,
    /// Filters and extra query params, e.g. `repoFullName` or `one_bucket`.
    pub params: ParamMap,
    pub granularity: Option<Granularity>,
}

impl MetricOverride {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_floor(mut self, floor: DateTime<Utc>) -> Self {
        self.start_floor = Some(floor);
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn granularity(mut self, granularity: Granularity) -> Self {
        self.granularity = Some(granularity);
        self
    }

    /// The entries to lay over the params computed for `range`.
    ///
    /// The start floor is conditional: it only replaces `startTime` when the
    /// computed start is earlier than the floor.
    pub fn overlay(&self, range: &TimeRange) -> ParamMap {
        let mut overlay = self.params.clone();

        if let Some(granularity) = self.granularity {
            overlay.insert("granularity".to_string(), ParamValue::from(granularity.as_str()));
        }

        if let Some(floor) = self.start_floor {
            if range.start() < floor {
                overlay.insert(START_TIME.to_string(), ParamValue::Timestamp(floor));
            } else {
                // Once the window moves past the floor it never applies again.
                tracing::debug!(
                    "Override: start floor {} inert, window already starts at {}",
                    floor,
                    range.start()
                );
            }
        }

        overlay
    }
}

/// Overrides keyed by metric id.
#[derive(Debug, Clone, Default)]
pub struct OverrideTable {
    entries: HashMap<String, MetricOverride>,
}

impl OverrideTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, metric: impl Into<String>, entry: MetricOverride) -> Self {
        self.entries.insert(metric.into(), entry);
        self
    }

    pub fn get(&self, metric: &str) -> Option<&MetricOverride> {
        self.entries.get(metric)
    }

    /// Set or replace the start floor for `metric`, keeping its other overrides.
    pub fn set_start_floor(&mut self, metric: &str, floor: DateTime<Utc>) {
        self.entries.entry(metric.to_string()).or_default().start_floor = Some(floor);
    }
}
