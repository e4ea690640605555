//! Configuration module for kpiboard.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::params::is_supported_time;

use chrono::{DateTime, NaiveDate, Utc};
use std::env;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Length of the dashboard window in months (default: 6)
    pub lookback_months: u32,
    /// Prefer the current query engine for panels that support both (default: true)
    pub use_current_backend: bool,
    /// Per-metric start floors laid over the built-in override table
    pub start_floors: Vec<(String, DateTime<Utc>)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            lookback_months: 6,
            use_current_backend: true,
            start_floors: Vec::new(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `KPIBOARD_HTTP_PORT`: HTTP port (default: 8080)
    /// - `KPIBOARD_LOOKBACK_MONTHS`: dashboard window in months (default: 6)
    /// - `KPIBOARD_USE_CURRENT_BACKEND`: `true`/`false` (default: true)
    /// - `KPIBOARD_START_FLOORS`: `metric=YYYY-MM-DD,...` (default: none)
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(port_str) = env::var("KPIBOARD_HTTP_PORT") {
            match port_str.parse() {
                Ok(port) => cfg.http_port = port,
                Err(_) => tracing::warn!("Ignoring invalid KPIBOARD_HTTP_PORT {:?}", port_str),
            }
        }

        if let Ok(months_str) = env::var("KPIBOARD_LOOKBACK_MONTHS") {
            match months_str.parse() {
                Ok(months) if months > 0 => cfg.lookback_months = months,
                _ => tracing::warn!("Ignoring invalid KPIBOARD_LOOKBACK_MONTHS {:?}", months_str),
            }
        }

        if let Ok(flag_str) = env::var("KPIBOARD_USE_CURRENT_BACKEND") {
            match parse_flag(&flag_str) {
                Some(flag) => cfg.use_current_backend = flag,
                None => tracing::warn!("Ignoring invalid KPIBOARD_USE_CURRENT_BACKEND {:?}", flag_str),
            }
        }

        if let Ok(floors_str) = env::var("KPIBOARD_START_FLOORS") {
            cfg.start_floors = parse_start_floors(&floors_str);
        }

        cfg
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse `metric=YYYY-MM-DD` pairs separated by commas. Bad entries are skipped.
pub fn parse_start_floors(s: &str) -> Vec<(String, DateTime<Utc>)> {
    s.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let parsed = entry.split_once('=').and_then(|(metric, date)| {
                let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
                let midnight = date.and_hms_opt(0, 0, 0)?;
                let floor = DateTime::from_naive_utc_and_offset(midnight, Utc);
                is_supported_time(floor).then(|| (metric.trim().to_string(), floor))
            });
            if parsed.is_none() {
                tracing::warn!("Ignoring invalid start floor {:?}", entry);
            }
            parsed
        })
        .filter(|(metric, _)| !metric.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.lookback_months, 6);
        assert!(cfg.use_current_backend);
        assert!(cfg.start_floors.is_empty());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_parse_start_floors() {
        let floors = parse_start_floors("strict_lag_historical=2024-10-01, bogus, x=2024-13-01,,num_reverts = 2023-01-15");
        assert_eq!(
            floors,
            vec![
                (
                    "strict_lag_historical".to_string(),
                    Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap()
                ),
                (
                    "num_reverts".to_string(),
                    Utc.with_ymd_and_hms(2023, 1, 15, 0, 0, 0).unwrap()
                ),
            ]
        );
        assert!(parse_start_floors("").is_empty());
        assert!(parse_start_floors("far=+10000-01-01").is_empty());
    }
}
