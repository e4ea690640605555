//! Query parameter schemas and the time-range adapter.
//!
//! The legacy engine takes a list of typed `{name, type, value}` params. The
//! current engine takes a flat name → value map whose time bounds are already
//! formatted as UTC strings.

mod current;
mod legacy;

pub use current::*;
pub use legacy::*;

use chrono::{DateTime, Datelike, Months, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub const START_TIME: &str = "startTime";
pub const STOP_TIME: &str = "stopTime";

/// Years that format as exactly four digits, keeping formatted bounds
/// lexicographically ordered.
pub const MIN_YEAR: i32 = 0;
pub const MAX_YEAR: i32 = 9999;

/// Whether `dt` falls in `MIN_YEAR..=MAX_YEAR`.
pub fn is_supported_time(dt: DateTime<Utc>) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&dt.year())
}

/// The first instant of `MIN_YEAR`.
pub fn earliest_supported_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(MIN_YEAR, 1, 1, 0, 0, 0).unwrap()
}

/// Parameter adapter error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("missing required parameter `{0}`")]
    MissingRequiredParam(String),
    #[error("duplicate parameter `{0}`")]
    DuplicateParam(String),
    #[error("parameter `{name}` is not a timestamp: {value}")]
    InvalidTimestamp { name: String, value: String },
    #[error("time {0} is outside years 0000-9999")]
    OutOfRange(DateTime<Utc>),
    #[error("invalid time range: start {start} is after stop {stop}")]
    InvalidRange {
        start: DateTime<Utc>,
        stop: DateTime<Utc>,
    },
}

/// A dashboard time window. `start <= stop` always holds, and both bounds
/// lie in `MIN_YEAR..=MAX_YEAR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    start: DateTime<Utc>,
    stop: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> Result<Self, ParamError> {
        for bound in [start, stop] {
            if !is_supported_time(bound) {
                return Err(ParamError::OutOfRange(bound));
            }
        }
        if start > stop {
            return Err(ParamError::InvalidRange { start, stop });
        }
        Ok(Self { start, stop })
    }

    /// The window of `months` calendar months ending at `now`. The start is
    /// clamped to the first instant of `MIN_YEAR`.
    pub fn lookback(now: DateTime<Utc>, months: u32) -> Result<Self, ParamError> {
        let earliest = earliest_supported_time();
        let start = now
            .checked_sub_months(Months::new(months))
            .filter(|start| *start >= earliest)
            .unwrap_or(earliest);
        Self::new(start, now)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn stop(&self) -> DateTime<Utc> {
        self.stop
    }
}

/// Declared type of a legacy parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Int,
    Float,
    Bool,
}

/// A parameter value as understood by either engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Opaque point in time; each engine adapter decides how to format it.
    Timestamp(DateTime<Utc>),
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<String>),
}

impl ParamValue {
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParamValue::List(items.into_iter().map(Into::into).collect())
    }

    /// The legacy type tag for this value. Timestamps and lists travel as strings.
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Timestamp(_) | ParamValue::Text(_) | ParamValue::List(_) => ParamType::String,
            ParamValue::Int(_) => ParamType::Int,
            ParamValue::Float(_) => ParamType::Float,
            ParamValue::Bool(_) => ParamType::Bool,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Timestamp(dt) => write!(f, "{}", dt.to_rfc3339()),
            ParamValue::Text(s) => write!(f, "{:?}", s),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Float(x) => write!(f, "{}", x),
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::List(items) => write!(f, "{:?}", items),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Text(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for ParamValue {
    fn from(value: DateTime<Utc>) -> Self {
        ParamValue::Timestamp(value)
    }
}

/// Name → value entries laid over an engine parameter set.
pub type ParamMap = BTreeMap<String, ParamValue>;
