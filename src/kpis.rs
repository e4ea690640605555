//! The CI KPI dashboard: panels, overrides and reshape rules.

use crate::dashboard::Dashboard;
use crate::panel::{
    BackendPreference, Granularity, MetricOverride, OverrideTable, PanelSpec, ValueFormat,
};
use crate::params::ParamValue;
use crate::reshape::{ReshapeRule, ReshapeTable};

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

const PYTORCH_REPO: &str = "pytorch/pytorch";

/// Percentiles the time-to-red-signal query returns per bucket.
pub const TTRS_PERCENTILES: [&str; 4] = ["p25", "p50", "p75", "p90"];

/// Strict-lag history starts at the ClickHouse migration.
fn strict_lag_cutover() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap()
}

/// All panels, in display order.
pub fn kpi_panels() -> Vec<PanelSpec> {
    vec![
        PanelSpec::new("master_commit_red_percent", "% of commits red on trunk (Weekly)")
            .collection("metrics")
            .backend(BackendPreference::PreferCurrent)
            .fields("granularity_bucket", "metric")
            .group_by("name")
            .value_format(ValueFormat::Ratio),
        PanelSpec::new("number_of_force_pushes_historical", "# of force merges (Weekly)")
            .collection("pytorch_dev_infra_kpis")
            .fields("bucket", "count"),
        PanelSpec::new("ttrs_percentiles", "Time to Red Signal - (Weekly, pull workflow)")
            .fields("bucket", "ttrs_mins")
            .group_by("percentile"),
        PanelSpec::new("weekly_force_merge_stats", "% of force merges (Weekly, 2 week rolling avg)")
            .collection("commons")
            .fields("granularity_bucket", "metric")
            .group_by("name")
            .value_format(ValueFormat::Percent),
        PanelSpec::new("time_to_signal", "Avg time-to-signal - E2E (Weekly)")
            .collection("pytorch_dev_infra_kpis")
            .backend(BackendPreference::PreferCurrent)
            .fields("week_bucket", "avg_tts")
            .y_axis_label("Hours")
            .group_by("branch"),
        PanelSpec::new("num_reverts", "# of reverts (2 week moving avg)")
            .collection("pytorch_dev_infra_kpis")
            .backend(BackendPreference::PreferCurrent)
            .fields("bucket", "num")
            .group_by("code"),
        PanelSpec::new("strict_lag_historical", "viable/strict lag (Daily)")
            .collection("pytorch_dev_infra_kpis")
            .granularity(Granularity::Day)
            .fields("push_time", "diff_hr")
            .y_axis_label("Hours")
            .options(json!({ "yAxis": { "max": 10 } })),
        PanelSpec::new("external_contribution_stats", "Weekly external PR count (4 week moving average)")
            .collection("metrics")
            .fields("granularity_bucket", "pr_count")
            .options(json!({ "yAxis": { "scale": true } })),
        PanelSpec::new("monthly_contribution_stats", "Monthly external PR count")
            .collection("pytorch_dev_infra_kpis")
            .granularity(Granularity::Month)
            .fields("year_and_month", "pr_count")
            .time_display_format("MMMM YYYY")
            .options(json!({ "yAxis": { "scale": true } })),
        PanelSpec::new("disabled_test_historical", "Total number of open disabled tests (Daily)")
            .collection("metrics")
            .granularity(Granularity::Day)
            .fields("granularity_bucket", "number_of_open_disabled_tests"),
    ]
}

/// Query parameter overrides per metric.
pub fn kpi_overrides() -> OverrideTable {
    OverrideTable::new()
        .with(
            "master_commit_red_percent",
            MetricOverride::new()
                .granularity(Granularity::Week)
                .param("workflowNames", ParamValue::list(["lint", "pull", "trunk"])),
        )
        .with(
            "ttrs_percentiles",
            MetricOverride::new()
                .param("one_bucket", false)
                .param("percentile_to_get", 0i64)
                .param("workflow", "pull"),
        )
        .with(
            "weekly_force_merge_stats",
            MetricOverride::new()
                .granularity(Granularity::Week)
                .param("one_bucket", false)
                .param("merge_type", ""),
        )
        .with(
            "strict_lag_historical",
            MetricOverride::new()
                .start_floor(strict_lag_cutover())
                .param("repoFullName", PYTORCH_REPO),
        )
        .with(
            "disabled_test_historical",
            MetricOverride::new().param("repo", PYTORCH_REPO),
        )
}

/// Wide → long rules per metric.
pub fn kpi_reshapes() -> ReshapeTable {
    ReshapeTable::new().with(
        "ttrs_percentiles",
        ReshapeRule::percentiles("percentile", "ttrs_mins", &TTRS_PERCENTILES),
    )
}

/// The KPI dashboard, with `start_floors` replacing or adding floors.
pub fn kpi_dashboard(start_floors: &[(String, DateTime<Utc>)]) -> Dashboard {
    let mut overrides = kpi_overrides();
    for (metric, floor) in start_floors {
        tracing::info!("Using start floor {} for {}", floor.format("%Y-%m-%d"), metric);
        overrides.set_start_floor(metric, *floor);
    }

    Dashboard::new(kpi_panels(), overrides, kpi_reshapes())
}
