//! kpiboard - CI KPI dashboard
//!
//! Translates one dashboard time range into the parameter schemas of the
//! legacy and current query engines, applies per-metric overrides, and
//! reshapes wide query results into the long rows the chart renderer wants.

pub mod config;
pub mod dashboard;
pub mod kpis;
pub mod panel;
pub mod params;
pub mod reshape;
pub mod web;
