//! Current engine parameter schema.

use super::{
    is_supported_time, LegacyQueryParam, ParamError, ParamMap, ParamValue, START_TIME, STOP_TIME,
};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Time bounds format expected by the current engine (UTC, milliseconds).
pub const CURRENT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Parameter map for the current engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CurrentQueryParams(BTreeMap<String, ParamValue>);

impl CurrentQueryParams {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The formatted time bound, if present as text.
    pub fn time_text(&self, name: &str) -> Option<&str> {
        match self.0.get(name) {
            Some(ParamValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

/// Format a timestamp the way the current engine expects it.
pub fn format_current_time(dt: DateTime<Utc>) -> String {
    dt.format(CURRENT_TIME_FORMAT).to_string()
}

/// Parse time text in the current format, RFC 3339, or a bare `YYYY-MM-DD`.
/// Times outside years 0000-9999 are rejected.
pub fn parse_time_text(s: &str) -> Option<DateTime<Utc>> {
    parse_any_time_text(s).filter(|dt| is_supported_time(*dt))
}

fn parse_any_time_text(s: &str) -> Option<DateTime<Utc>> {
    let formats = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}

fn is_time_param(name: &str) -> bool {
    name == START_TIME || name == STOP_TIME
}

fn normalize_time(name: &str, value: &ParamValue) -> Result<ParamValue, ParamError> {
    let dt = match value {
        ParamValue::Timestamp(dt) => Some(*dt).filter(|dt| is_supported_time(*dt)),
        ParamValue::Text(s) => parse_time_text(s),
        _ => None,
    };

    dt.map(|dt| ParamValue::Text(format_current_time(dt)))
        .ok_or_else(|| ParamError::InvalidTimestamp {
            name: name.to_string(),
            value: value.to_string(),
        })
}

/// Convert legacy params into the current engine's map.
///
/// `startTime` and `stopTime` are formatted with [`CURRENT_TIME_FORMAT`];
/// every other param passes through untouched. Text already in the output
/// format comes back unchanged, so the conversion can be re-applied safely.
pub fn to_current_params(params: &[LegacyQueryParam]) -> Result<CurrentQueryParams, ParamError> {
    let mut out = BTreeMap::new();

    for p in params {
        if out.contains_key(&p.name) {
            return Err(ParamError::DuplicateParam(p.name.clone()));
        }

        let value = if is_time_param(&p.name) {
            normalize_time(&p.name, &p.value)?
        } else {
            p.value.clone()
        };
        out.insert(p.name.clone(), value);
    }

    for required in [START_TIME, STOP_TIME] {
        if !out.contains_key(required) {
            return Err(ParamError::MissingRequiredParam(required.to_string()));
        }
    }

    Ok(CurrentQueryParams(out))
}

/// Right-biased shallow merge: overlay keys win, other base keys are kept.
///
/// Timestamps in the overlay are formatted for the current engine.
pub fn merge(base: &CurrentQueryParams, overlay: &ParamMap) -> CurrentQueryParams {
    let mut merged = base.0.clone();

    for (name, value) in overlay {
        let value = match value {
            ParamValue::Timestamp(dt) => ParamValue::Text(format_current_time(*dt)),
            other => other.clone(),
        };
        merged.insert(name.clone(), value);
    }

    CurrentQueryParams(merged)
}
