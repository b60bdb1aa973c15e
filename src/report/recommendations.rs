use std::collections::HashSet;

use super::{CapacityReport, MetricTrend, ReportSummary, TestCaseResult};
use crate::types::{Confidence, Status};

/// Warning count above which scaling the infrastructure is recommended.
pub const SCALING_WARNING_THRESHOLD: usize = 5;

fn trend_line(t: &MetricTrend) -> String {
    if t.degrading {
        format!(
            "{}: `{}` is trending worse ({:+.1}% across recent runs, {} confidence); profile recent changes on this path",
            t.test_case, t.metric, t.trend.percent_change, t.trend.confidence
        )
    } else {
        format!(
            "{}: `{}` is trending {} ({:+.1}% across recent runs, {} confidence); review whether its budget still fits",
            t.test_case, t.metric, t.presented_direction, t.trend.percent_change, t.trend.confidence
        )
    }
}

fn capacity_lines(capacity: &CapacityReport) -> Vec<String> {
    let Some(selection) = &capacity.selection else {
        return Vec::new();
    };
    let mut lines = Vec::new();
    let horizon = capacity.horizon_days;

    if !selection.fits {
        let over: Vec<&str> = capacity
            .projections
            .iter()
            .filter(|p| {
                selection
                    .chosen
                    .limits
                    .get(&p.resource)
                    .is_some_and(|limit| p.projected_value > *limit)
            })
            .map(|p| p.resource.as_str())
            .collect();
        lines.push(format!(
            "Projected usage over {:.0} days exceeds the limits of every plan (largest: `{}`) for {}; negotiate custom limits or reduce usage",
            horizon,
            selection.chosen.name,
            over.join(", ")
        ));
        return lines;
    }

    match capacity.current_plan.as_deref() {
        Some(current) if current != selection.chosen.name => lines.push(format!(
            "Projected usage over {:.0} days needs the `{}` plan (currently `{}`), estimated ${:.2}/month",
            horizon,
            selection.chosen.name,
            current,
            selection.total_monthly_cost()
        )),
        _ => {}
    }
    if selection.overage_cost > 0.0 {
        lines.push(format!(
            "Expect about ${:.2}/month in overage charges on the `{}` plan within {:.0} days",
            selection.overage_cost, selection.chosen.name, horizon
        ));
    }
    lines
}

/// Deterministic recommendation set for a report. Order is stable and
/// duplicates are dropped.
pub fn build_recommendations(
    summary: &ReportSummary,
    results: &[TestCaseResult],
    flagged: &[MetricTrend],
    capacity: &CapacityReport,
) -> Vec<String> {
    let mut lines = Vec::new();

    if summary.total_violations > 0 {
        let failing: Vec<String> = results
            .iter()
            .flat_map(|r| {
                r.outcomes
                    .iter()
                    .filter(|o| o.status == Status::Fail)
                    .map(move |o| format!("{}/{}", r.name, o.metric))
            })
            .collect();
        lines.push(format!(
            "Resolve {} budget violation(s) before release: {}",
            summary.total_violations,
            failing.join(", ")
        ));
    }

    let sustained: Vec<&MetricTrend> = flagged
        .iter()
        .filter(|t| t.degrading && t.trend.confidence == Confidence::High)
        .collect();
    if !sustained.is_empty() {
        let metrics: Vec<String> = sustained
            .iter()
            .map(|t| format!("{}/{}", t.test_case, t.metric))
            .collect();
        lines.push(format!(
            "Sustained degradation in {} metric(s) ({}): review capacity headroom and optimize the affected paths",
            sustained.len(),
            metrics.join(", ")
        ));
    }

    if summary.total_warnings > SCALING_WARNING_THRESHOLD {
        lines.push(format!(
            "{} warnings across the suite: plan infrastructure scaling (instances, database tier, caching) before budgets are breached",
            summary.total_warnings
        ));
    }

    lines.extend(flagged.iter().map(trend_line));
    lines.extend(capacity_lines(capacity));

    let mut seen = HashSet::new();
    lines.retain(|l| seen.insert(l.clone()));
    lines
}
