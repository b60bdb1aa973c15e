use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub results_dir: PathBuf,
    pub report_path: PathBuf,
    pub threshold_level: TierLevel,
    pub trend_window: usize,
    pub capacity_horizon_days: f64,
    pub current_plan: Option<String>,
    pub slack_webhook_url: Option<String>,
    pub budgets_path: Option<PathBuf>,
    pub plans_path: Option<PathBuf>,
    pub polarity_aware_trends: bool,
    pub project_name: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            results_dir: PathBuf::from("./results"),
            report_path: PathBuf::from("./performance-report.json"),
            threshold_level: TierLevel::Normal,
            trend_window: 10,
            capacity_horizon_days: 90.0,
            current_plan: None,
            slack_webhook_url: None,
            budgets_path: None,
            plans_path: None,
            polarity_aware_trends: false,
            project_name: None,
        }
    }
}

/// Stringency setting selecting which column of a lower-is-better budget applies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TierLevel {
    Strict,
    #[default]
    Normal,
    Relaxed,
}

impl TierLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TierLevel::Strict => "strict",
            TierLevel::Normal => "normal",
            TierLevel::Relaxed => "relaxed",
        }
    }
}

impl fmt::Display for TierLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds for one metric. Exactly one shape applies per metric.
///
/// Deserializes from either `{strict, normal, relaxed}` or `{min, target, max}`;
/// an object matching neither shape is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TierBudget {
    LowerIsBetter { strict: f64, normal: f64, relaxed: f64 },
    HigherIsBetter { min: f64, target: f64, max: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    LowerIsBetter,
    HigherIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pass,
    Warning,
    Fail,
    /// No budget registered for the metric.
    Unknown,
}

impl Status {
    /// Rank used to pick the worst of several statuses. `Unknown` never wins.
    pub fn severity(&self) -> u8 {
        match self {
            Status::Unknown | Status::Pass => 0,
            Status::Warning => 1,
            Status::Fail => 2,
        }
    }

    pub fn worst<I: IntoIterator<Item = Status>>(statuses: I) -> Status {
        statuses
            .into_iter()
            .filter(|s| *s != Status::Unknown)
            .max_by_key(|s| s.severity())
            .unwrap_or(Status::Pass)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Pass => "pass",
            Status::Warning => "warning",
            Status::Fail => "fail",
            Status::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationOutcome {
    pub metric: String,
    pub status: Status,
    pub observed: f64,
    pub threshold_used: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSample {
    pub metric_name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Stable,
    Degrading,
    Improving,
    InsufficientData,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrendDirection::Stable => "stable",
            TrendDirection::Degrading => "degrading",
            TrendDirection::Improving => "improving",
            TrendDirection::InsufficientData => "insufficient data",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendResult {
    pub direction: TrendDirection,
    pub confidence: Confidence,
    pub slope: f64,
    pub r_squared: f64,
    pub projected_next: f64,
    pub percent_change: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityProjection {
    pub resource: String,
    pub current_value: f64,
    pub horizon_days: f64,
    pub projected_value: f64,
    pub growth_per_day: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanTier {
    pub name: String,
    pub monthly_cost: f64,
    pub limits: BTreeMap<String, f64>,
    #[serde(default)]
    pub overage_rate_per_unit: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierSelection {
    pub chosen: PlanTier,
    pub fits: bool,
    pub overage_cost: f64,
}

impl TierSelection {
    pub fn total_monthly_cost(&self) -> f64 {
        self.chosen.monthly_cost + self.overage_cost
    }
}

/// Flattened `{metric: value}` view of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSnapshot {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub metrics: BTreeMap<String, f64>,
}

/// One test case with its chronologically ordered run history; the last run is current.
#[derive(Debug, Clone)]
pub struct TestCaseInput {
    pub name: String,
    pub history: Vec<RunSnapshot>,
}

impl TestCaseInput {
    pub fn new(name: impl Into<String>, mut history: Vec<RunSnapshot>) -> Self {
        history.sort_by_key(|s| s.timestamp);
        Self {
            name: name.into(),
            history,
        }
    }

    pub fn current(&self) -> Option<&RunSnapshot> {
        self.history.last()
    }
}

/// Usage history of one resource, with an optional externally supplied growth rate.
#[derive(Debug, Clone)]
pub struct ResourceUsage {
    pub resource: String,
    pub samples: Vec<MetricSample>,
    pub growth_per_day: Option<f64>,
}

#[derive(Serialize)]
pub struct SlackPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    pub blocks: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_worst_status_ignores_unknown() {
        assert_eq!(Status::worst([Status::Pass, Status::Unknown]), Status::Pass);
        assert_eq!(Status::worst([Status::Warning, Status::Pass]), Status::Warning);
        assert_eq!(Status::worst([Status::Warning, Status::Fail, Status::Pass]), Status::Fail);
        assert_eq!(Status::worst([Status::Unknown]), Status::Pass);
        assert_eq!(Status::worst(Vec::new()), Status::Pass);
    }

    #[test]
    fn test_budget_deserializes_either_shape() {
        let lower: TierBudget =
            serde_json::from_str(r#"{"strict": 300, "normal": 500, "relaxed": 800}"#).unwrap();
        assert_eq!(
            lower,
            TierBudget::LowerIsBetter { strict: 300.0, normal: 500.0, relaxed: 800.0 }
        );

        let higher: TierBudget =
            serde_json::from_str(r#"{"min": 100, "target": 200, "max": 500}"#).unwrap();
        assert_eq!(
            higher,
            TierBudget::HigherIsBetter { min: 100.0, target: 200.0, max: 500.0 }
        );

        let neither = serde_json::from_str::<TierBudget>(r#"{"threshold": 5}"#);
        assert!(neither.is_err());
    }

    #[test]
    fn test_test_case_input_sorts_history() {
        let at = |s: i64| Utc.timestamp_opt(s, 0).unwrap();
        let input = TestCaseInput::new(
            "checkout",
            vec![
                RunSnapshot { run_id: "b".into(), timestamp: at(200), metrics: BTreeMap::new() },
                RunSnapshot { run_id: "a".into(), timestamp: at(100), metrics: BTreeMap::new() },
            ],
        );
        assert_eq!(input.current().unwrap().run_id, "b");
        assert_eq!(input.history[0].run_id, "a");
    }

    #[test]
    fn test_tier_level_display() {
        assert_eq!(TierLevel::default(), TierLevel::Normal);
        assert_eq!(TierLevel::Strict.to_string(), "strict");
        assert_eq!(serde_json::to_string(&TierLevel::Relaxed).unwrap(), "\"relaxed\"");
    }
}
