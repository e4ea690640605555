//! Legacy engine parameter schema.

use super::{ParamType, ParamValue, TimeRange, START_TIME, STOP_TIME};

use serde::Serialize;

/// One typed parameter for the legacy engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegacyQueryParam {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub value: ParamValue,
}

impl LegacyQueryParam {
    /// Create a param whose type tag is inferred from the value.
    pub fn new(name: impl Into<String>, value: ParamValue) -> Self {
        Self {
            name: name.into(),
            param_type: value.param_type(),
            value,
        }
    }
}

/// Build the legacy time bounds for `range`.
///
/// The endpoints are carried unformatted; formatting belongs to whichever
/// engine adapter consumes them.
pub fn to_legacy_params(range: &TimeRange) -> Vec<LegacyQueryParam> {
    vec![
        LegacyQueryParam {
            name: START_TIME.to_string(),
            param_type: ParamType::String,
            value: ParamValue::Timestamp(range.start()),
        },
        LegacyQueryParam {
            name: STOP_TIME.to_string(),
            param_type: ParamType::String,
            value: ParamValue::Timestamp(range.stop()),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_legacy_time_params() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let stop = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let range = TimeRange::new(start, stop).unwrap();

        let params = to_legacy_params(&range);
        assert_eq!(
            params,
            vec![
                LegacyQueryParam {
                    name: "startTime".to_string(),
                    param_type: ParamType::String,
                    value: ParamValue::Timestamp(start),
                },
                LegacyQueryParam {
                    name: "stopTime".to_string(),
                    param_type: ParamType::String,
                    value: ParamValue::Timestamp(stop),
                },
            ]
        );

        let json = serde_json::to_value(&params[0]).unwrap();
        assert_eq!(json["name"], "startTime");
        assert_eq!(json["type"], "string");
    }
}
