use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::budgets::BudgetRegistry;
use crate::metrics::{analyze, evaluate_metric, presented_direction, project_resource, score, select_tier, TrendSeries, MIN_TREND_POINTS};
use crate::types::*;

mod recommendations;

pub use recommendations::build_recommendations;

/// Trend of one budgeted metric within one test case.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricTrend {
    pub test_case: String,
    pub metric: String,
    pub polarity: Polarity,
    #[serde(flatten)]
    pub trend: TrendResult,
    /// Direction inverted for higher-is-better metrics.
    pub presented_direction: TrendDirection,
    pub flagged: bool,
    /// Flagged and degrading under the active polarity setting.
    pub degrading: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub name: String,
    pub status: Status,
    pub outcomes: Vec<EvaluationOutcome>,
    pub trends: Vec<MetricTrend>,
}

impl TestCaseResult {
    pub fn count(&self, status: Status) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    pub fn flagged_trends(&self) -> impl Iterator<Item = &MetricTrend> {
        self.trends.iter().filter(|t| t.flagged)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityReport {
    pub horizon_days: f64,
    pub projections: Vec<CapacityProjection>,
    pub selection: Option<TierSelection>,
    pub current_plan: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_tests: usize,
    pub total_violations: usize,
    /// Metric warnings plus flagged degrading trends. Flagged improving trends
    /// are reported but never counted.
    pub total_warnings: usize,
    pub degrading_trends: usize,
    pub passed: usize,
    pub warned: usize,
    pub failed: usize,
}

impl ReportSummary {
    pub fn total_issues(&self) -> usize {
        self.total_violations + self.total_warnings
    }

    pub fn has_issues(&self) -> bool {
        self.total_issues() > 0
    }
}

/// Write-once result of one engine invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub threshold_level: TierLevel,
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    pub test_case_results: Vec<TestCaseResult>,
    /// Flagged trends across all test cases.
    pub trends: Vec<MetricTrend>,
    pub capacity: CapacityReport,
    pub recommendations: Vec<String>,
    pub health_score: u8,
}

impl Report {
    pub fn has_issues(&self) -> bool {
        self.summary.has_issues()
    }

    /// 0 clean, 1 any violation, 2 warnings only. An improving trend alone
    /// never raises the code.
    pub fn exit_code(&self) -> i32 {
        if self.summary.total_violations > 0 {
            1
        } else if self.summary.total_warnings > 0 {
            2
        } else {
            0
        }
    }
}

/// Runs the evaluator, analyzer and projector over loaded inputs and folds
/// the results into a `Report`. Holds only borrowed, read-only configuration.
pub struct ReportAssembler<'a> {
    registry: &'a BudgetRegistry,
    plans: &'a [PlanTier],
    level: TierLevel,
    horizon_days: f64,
    polarity_aware: bool,
    current_plan: Option<&'a str>,
}

impl<'a> ReportAssembler<'a> {
    pub fn new(registry: &'a BudgetRegistry, plans: &'a [PlanTier], level: TierLevel) -> Self {
        Self {
            registry,
            plans,
            level,
            horizon_days: Config::default().capacity_horizon_days,
            polarity_aware: false,
            current_plan: None,
        }
    }

    pub fn from_config(cfg: &'a Config, registry: &'a BudgetRegistry, plans: &'a [PlanTier]) -> Self {
        Self::new(registry, plans, cfg.threshold_level)
            .with_horizon_days(cfg.capacity_horizon_days)
            .with_polarity_aware(cfg.polarity_aware_trends)
            .with_current_plan(cfg.current_plan.as_deref())
    }

    pub fn with_horizon_days(mut self, days: f64) -> Self {
        self.horizon_days = days;
        self
    }

    pub fn with_polarity_aware(mut self, enabled: bool) -> Self {
        self.polarity_aware = enabled;
        self
    }

    pub fn with_current_plan(mut self, plan: Option<&'a str>) -> Self {
        self.current_plan = plan;
        self
    }

    /// Evaluate one test case. `None` when it has no snapshot at all.
    pub fn evaluate_test_case(&self, input: &TestCaseInput) -> Option<TestCaseResult> {
        let Some(current) = input.current() else {
            warn!("Test case {} has no snapshots, skipping", input.name);
            return None;
        };

        let mut outcomes = Vec::new();
        for (metric, value) in &current.metrics {
            match evaluate_metric(self.registry, metric, *value, self.level) {
                Some(outcome) => outcomes.push(outcome),
                None => debug!("{}: unusable value {} for {}, skipping", input.name, value, metric),
            }
        }

        let mut trends = Vec::new();
        for (metric, budget) in self.registry.iter() {
            let series = TrendSeries::from_snapshots(metric, &input.history);
            let values = series.values();
            if values.len() < MIN_TREND_POINTS {
                continue;
            }
            let trend = analyze(&values);
            let polarity = budget.polarity();
            let presented = presented_direction(trend.direction, polarity);
            let effective = if self.polarity_aware { presented } else { trend.direction };
            let flagged = trend.is_flagged();
            trends.push(MetricTrend {
                test_case: input.name.clone(),
                metric: metric.to_string(),
                polarity,
                trend,
                presented_direction: presented,
                flagged,
                degrading: flagged && effective == TrendDirection::Degrading,
            });
        }

        let metric_status = Status::worst(outcomes.iter().map(|o| o.status));
        let status = if metric_status == Status::Pass && trends.iter().any(|t| t.degrading) {
            Status::Warning
        } else {
            metric_status
        };

        Some(TestCaseResult {
            name: input.name.clone(),
            status,
            outcomes,
            trends,
        })
    }

    pub fn assess_capacity(&self, usage: &[ResourceUsage]) -> CapacityReport {
        let projections: Vec<CapacityProjection> = usage
            .iter()
            .filter_map(|u| {
                let projection = project_resource(u, self.horizon_days);
                if projection.is_none() {
                    warn!("No usable readings for resource {}, skipping projection", u.resource);
                }
                projection
            })
            .collect();

        let selection = if projections.is_empty() {
            None
        } else {
            let projected: BTreeMap<String, f64> = projections
                .iter()
                .map(|p| (p.resource.clone(), p.projected_value))
                .collect();
            let selection = select_tier(&projected, self.plans);
            if selection.is_none() {
                warn!("No plan tiers configured, skipping plan selection");
            }
            selection
        };

        CapacityReport {
            horizon_days: self.horizon_days,
            projections,
            selection,
            current_plan: self.current_plan.map(str::to_string),
        }
    }

    pub fn assemble(&self, test_cases: &[TestCaseInput], resources: &[ResourceUsage]) -> Report {
        let results: Vec<TestCaseResult> = test_cases
            .iter()
            .filter_map(|tc| self.evaluate_test_case(tc))
            .collect();

        let mut summary = ReportSummary {
            total_tests: results.len(),
            ..ReportSummary::default()
        };
        for r in &results {
            summary.total_violations += r.count(Status::Fail);
            summary.total_warnings += r.count(Status::Warning) + r.flagged_trends().filter(|t| t.degrading).count();
            summary.degrading_trends += r.trends.iter().filter(|t| t.degrading).count();
            match r.status {
                Status::Fail => summary.failed += 1,
                Status::Warning => summary.warned += 1,
                _ => summary.passed += 1,
            }
        }

        let trends: Vec<MetricTrend> = results
            .iter()
            .flat_map(|r| r.flagged_trends().cloned())
            .collect();
        let capacity = self.assess_capacity(resources);
        let recommendations = build_recommendations(&summary, &results, &trends, &capacity);
        let health_score = score(summary.total_violations, summary.total_warnings, summary.degrading_trends);

        info!(
            "Assembled report: {} tests, {} violations, {} warnings, health {}",
            summary.total_tests, summary.total_violations, summary.total_warnings, health_score
        );

        Report {
            threshold_level: self.level,
            generated_at: Utc::now(),
            summary,
            test_case_results: results,
            trends,
            capacity,
            recommendations,
            health_score,
        }
    }
}

pub fn write_report(report: &Report, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report).context("Failed to serialize report")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn registry() -> BudgetRegistry {
        BudgetRegistry::new()
            .with_budget("api.p95", TierBudget::LowerIsBetter { strict: 300.0, normal: 500.0, relaxed: 800.0 })
            .with_budget("api.rps", TierBudget::HigherIsBetter { min: 100.0, target: 200.0, max: 500.0 })
    }

    fn history(name: &str, runs: &[&[(&str, f64)]]) -> TestCaseInput {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let snapshots = runs
            .iter()
            .enumerate()
            .map(|(i, metrics)| RunSnapshot {
                run_id: format!("run-{}", i),
                timestamp: start + Duration::hours(i as i64),
                metrics: metrics.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
            })
            .collect();
        TestCaseInput::new(name, snapshots)
    }

    #[test]
    fn test_evaluate_test_case_statuses() {
        let registry = registry();
        let assembler = ReportAssembler::new(&registry, &[], TierLevel::Strict);

        let input = history("checkout", &[&[("api.p95", 550.0), ("api.rps", 250.0), ("vus", 20.0)]]);
        let result = assembler.evaluate_test_case(&input).unwrap();
        assert_eq!(result.status, Status::Fail);
        assert_eq!(result.count(Status::Fail), 1);
        assert_eq!(result.count(Status::Pass), 1);
        assert_eq!(result.count(Status::Unknown), 1);
        assert!(result.trends.is_empty());
    }

    #[test]
    fn test_unusable_values_are_skipped_not_failed() {
        let registry = registry();
        let assembler = ReportAssembler::new(&registry, &[], TierLevel::Normal);
        let input = history("search", &[&[("api.p95", f64::NAN), ("api.rps", -5.0)]]);

        let result = assembler.evaluate_test_case(&input).unwrap();
        assert!(result.outcomes.is_empty());
        assert_eq!(result.status, Status::Pass);
    }

    #[test]
    fn test_flagged_degrading_trend_warns() {
        let registry = registry();
        let assembler = ReportAssembler::new(&registry, &[], TierLevel::Normal);
        let input = history(
            "checkout",
            &[&[("api.p95", 100.0)], &[("api.p95", 110.0)], &[("api.p95", 120.0)], &[("api.p95", 130.0)]],
        );

        let result = assembler.evaluate_test_case(&input).unwrap();
        assert_eq!(result.count(Status::Pass), 1);
        assert_eq!(result.trends.len(), 1);
        let trend = &result.trends[0];
        assert!(trend.flagged);
        assert!(trend.degrading);
        assert_eq!(trend.trend.direction, TrendDirection::Degrading);
        assert_eq!(result.status, Status::Warning);
    }

    #[test]
    fn test_polarity_aware_trends() {
        let registry = registry();
        let runs: &[&[(&str, f64)]] = &[&[("api.rps", 200.0)], &[("api.rps", 220.0)], &[("api.rps", 240.0)]];

        let raw = ReportAssembler::new(&registry, &[], TierLevel::Normal);
        let trend = raw.evaluate_test_case(&history("feed", runs)).unwrap().trends[0].clone();
        assert_eq!(trend.trend.direction, TrendDirection::Degrading);
        assert_eq!(trend.presented_direction, TrendDirection::Improving);
        assert!(trend.degrading);

        let aware = ReportAssembler::new(&registry, &[], TierLevel::Normal).with_polarity_aware(true);
        let result = aware.evaluate_test_case(&history("feed", runs)).unwrap();
        assert!(result.trends[0].flagged);
        assert!(!result.trends[0].degrading);
        assert_eq!(result.status, Status::Pass);
    }

    #[test]
    fn test_assemble_summary_and_score() {
        let registry = registry();
        let assembler = ReportAssembler::new(&registry, &[], TierLevel::Strict);
        let cases = vec![
            history("fail", &[&[("api.p95", 550.0)]]),
            history("warn", &[&[("api.p95", 350.0), ("api.rps", 150.0)]]),
            history("pass", &[&[("api.p95", 100.0)]]),
            TestCaseInput::new("empty", Vec::new()),
        ];

        let report = assembler.assemble(&cases, &[]);
        assert_eq!(report.summary.total_tests, 3);
        assert_eq!(report.summary.total_violations, 1);
        assert_eq!(report.summary.total_warnings, 2);
        assert_eq!(report.summary.degrading_trends, 0);
        assert_eq!((report.summary.failed, report.summary.warned, report.summary.passed), (1, 1, 1));
        assert_eq!(report.health_score, score(1, 2, 0));
        assert_eq!(report.health_score, 75);
        assert_eq!(report.exit_code(), 1);
        assert!(report.has_issues());
        assert!(report.capacity.projections.is_empty());
        assert!(report.capacity.selection.is_none());
    }

    #[test]
    fn test_exit_codes() {
        let registry = registry();
        let assembler = ReportAssembler::new(&registry, &[], TierLevel::Normal);

        let clean = assembler.assemble(&[history("ok", &[&[("api.p95", 100.0)]])], &[]);
        assert_eq!(clean.exit_code(), 0);
        assert_eq!(clean.health_score, 100);
        assert!(!clean.has_issues());

        let warned = assembler.assemble(&[history("slow", &[&[("api.p95", 550.0)]])], &[]);
        assert_eq!(warned.exit_code(), 2);
    }

    #[test]
    fn test_improving_trend_alone_is_not_a_warning() {
        let registry = registry();
        let assembler = ReportAssembler::new(&registry, &[], TierLevel::Normal);
        let input = history(
            "checkout",
            &[&[("api.p95", 200.0)], &[("api.p95", 180.0)], &[("api.p95", 160.0)], &[("api.p95", 140.0)]],
        );

        let report = assembler.assemble(&[input], &[]);
        assert_eq!(report.trends.len(), 1);
        assert!(report.trends[0].flagged);
        assert!(!report.trends[0].degrading);
        assert_eq!(report.test_case_results[0].status, Status::Pass);
        assert_eq!(report.summary.total_warnings, 0);
        assert_eq!(report.summary.degrading_trends, 0);
        assert_eq!(report.health_score, 100);
        assert_eq!(report.exit_code(), 0);
        assert!(!report.has_issues());
        // still surfaced for the reader
        assert!(report.recommendations[0].contains("`api.p95` is trending improving"));
    }

    #[test]
    fn test_assess_capacity() {
        let registry = registry();
        let plans = vec![
            PlanTier {
                name: "small".to_string(),
                monthly_cost: 0.0,
                limits: BTreeMap::from([("storage".to_string(), 100.0)]),
                overage_rate_per_unit: BTreeMap::new(),
            },
            PlanTier {
                name: "large".to_string(),
                monthly_cost: 25.0,
                limits: BTreeMap::from([("storage".to_string(), 500.0)]),
                overage_rate_per_unit: BTreeMap::new(),
            },
        ];
        let assembler = ReportAssembler::new(&registry, &plans, TierLevel::Normal)
            .with_horizon_days(90.0)
            .with_current_plan(Some("small"));

        let usage = ResourceUsage {
            resource: "storage".to_string(),
            samples: vec![MetricSample {
                metric_name: "storage".to_string(),
                value: 50.0,
                timestamp: Utc::now(),
            }],
            growth_per_day: Some(2.0),
        };

        let capacity = assembler.assess_capacity(&[usage]);
        assert_eq!(capacity.projections.len(), 1);
        assert_eq!(capacity.projections[0].projected_value, 230.0);
        let selection = capacity.selection.unwrap();
        assert_eq!(selection.chosen.name, "large");
        assert!(selection.fits);
        assert_eq!(capacity.current_plan.as_deref(), Some("small"));
    }

    #[test]
    fn test_write_report() {
        let registry = registry();
        let report = ReportAssembler::new(&registry, &[], TierLevel::Relaxed)
            .assemble(&[history("ok", &[&[("api.p95", 100.0)]])], &[]);

        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("report.json");
        write_report(&report, &path).unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["thresholdLevel"], "relaxed");
        assert_eq!(written["summary"]["totalTests"], 1);
        assert_eq!(written["healthScore"], 100);
        assert!(written["recommendations"].is_array());
        assert_eq!(written["testCaseResults"][0]["outcomes"][0]["thresholdUsed"], 800.0);
    }
}
