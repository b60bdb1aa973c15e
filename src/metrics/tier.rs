use crate::budgets::BudgetRegistry;
use crate::parsing::usable_value;
use crate::types::{EvaluationOutcome, Polarity, Status, TierBudget, TierLevel};

/// Multiplier above a lower-is-better threshold still reported as a warning.
pub const APPROACHING_BUDGET_MARGIN: f64 = 1.2;

impl TierBudget {
    pub fn polarity(&self) -> Polarity {
        match self {
            TierBudget::LowerIsBetter { .. } => Polarity::LowerIsBetter,
            TierBudget::HigherIsBetter { .. } => Polarity::HigherIsBetter,
        }
    }

    /// Threshold the evaluator compares against. Higher-is-better budgets use
    /// `target` at every level.
    pub fn threshold(&self, level: TierLevel) -> f64 {
        match (self, level) {
            (TierBudget::LowerIsBetter { strict, .. }, TierLevel::Strict) => *strict,
            (TierBudget::LowerIsBetter { normal, .. }, TierLevel::Normal) => *normal,
            (TierBudget::LowerIsBetter { relaxed, .. }, TierLevel::Relaxed) => *relaxed,
            (TierBudget::HigherIsBetter { target, .. }, _) => *target,
        }
    }
}

pub fn evaluate(value: f64, budget: &TierBudget, level: TierLevel) -> Status {
    match budget {
        TierBudget::LowerIsBetter { .. } => {
            let threshold = budget.threshold(level);
            if value <= threshold {
                Status::Pass
            } else if value <= threshold * APPROACHING_BUDGET_MARGIN {
                Status::Warning
            } else {
                Status::Fail
            }
        }
        TierBudget::HigherIsBetter { min, target, .. } => {
            if value >= *target {
                Status::Pass
            } else if value >= *min {
                Status::Warning
            } else {
                Status::Fail
            }
        }
    }
}

/// Evaluate one observed metric against the registry.
///
/// Returns `None` when the reading is unusable (NaN, infinite, negative); such
/// readings are skipped rather than failed. Unregistered metrics yield an
/// `Unknown` outcome.
pub fn evaluate_metric(
    registry: &BudgetRegistry,
    metric: &str,
    value: f64,
    level: TierLevel,
) -> Option<EvaluationOutcome> {
    let observed = usable_value(value)?;
    let outcome = match registry.get(metric) {
        Some(budget) => EvaluationOutcome {
            metric: metric.to_string(),
            status: evaluate(observed, budget, level),
            observed,
            threshold_used: Some(budget.threshold(level)),
        },
        None => EvaluationOutcome {
            metric: metric.to_string(),
            status: Status::Unknown,
            observed,
            threshold_used: None,
        },
    };
    Some(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LATENCY: TierBudget = TierBudget::LowerIsBetter { strict: 300.0, normal: 500.0, relaxed: 800.0 };
    const THROUGHPUT: TierBudget = TierBudget::HigherIsBetter { min: 100.0, target: 200.0, max: 500.0 };

    #[test]
    fn test_lower_is_better_boundaries() {
        for level in [TierLevel::Strict, TierLevel::Normal, TierLevel::Relaxed] {
            let threshold = LATENCY.threshold(level);
            assert_eq!(evaluate(threshold, &LATENCY, level), Status::Pass);
            assert_eq!(evaluate(threshold * 1.1, &LATENCY, level), Status::Warning);
            assert_eq!(evaluate(threshold * 1.2, &LATENCY, level), Status::Warning);
            assert_eq!(evaluate(threshold * 1.2 + 0.001, &LATENCY, level), Status::Fail);
        }
    }

    #[test]
    fn test_strict_level_scenario() {
        // 550 > 300 * 1.2 = 360
        assert_eq!(evaluate(550.0, &LATENCY, TierLevel::Strict), Status::Fail);
        assert_eq!(evaluate(550.0, &LATENCY, TierLevel::Normal), Status::Warning);
        assert_eq!(evaluate(550.0, &LATENCY, TierLevel::Relaxed), Status::Pass);
    }

    #[test]
    fn test_higher_is_better_boundaries() {
        for level in [TierLevel::Strict, TierLevel::Normal, TierLevel::Relaxed] {
            assert_eq!(evaluate(200.0, &THROUGHPUT, level), Status::Pass);
            assert_eq!(evaluate(100.0, &THROUGHPUT, level), Status::Warning);
            assert_eq!(evaluate(99.999, &THROUGHPUT, level), Status::Fail);
        }
        // below min
        assert_eq!(evaluate(80.0, &THROUGHPUT, TierLevel::Normal), Status::Fail);
    }

    #[test]
    fn test_max_is_not_a_ceiling() {
        assert_eq!(evaluate(10_000.0, &THROUGHPUT, TierLevel::Strict), Status::Pass);
    }

    #[test]
    fn test_polarity_and_threshold() {
        assert_eq!(LATENCY.polarity(), Polarity::LowerIsBetter);
        assert_eq!(THROUGHPUT.polarity(), Polarity::HigherIsBetter);
        assert_eq!(LATENCY.threshold(TierLevel::Relaxed), 800.0);
        assert_eq!(THROUGHPUT.threshold(TierLevel::Strict), 200.0);
    }

    #[test]
    fn test_evaluate_metric_unknown_and_skipped() {
        let registry = BudgetRegistry::new().with_budget("api.p95", LATENCY);

        let outcome = evaluate_metric(&registry, "api.p95", 320.0, TierLevel::Strict).unwrap();
        assert_eq!(outcome.status, Status::Warning);
        assert_eq!(outcome.threshold_used, Some(300.0));
        assert_eq!(outcome.observed, 320.0);

        let unknown = evaluate_metric(&registry, "vus", 50.0, TierLevel::Normal).unwrap();
        assert_eq!(unknown.status, Status::Unknown);
        assert_eq!(unknown.threshold_used, None);

        assert!(evaluate_metric(&registry, "api.p95", f64::NAN, TierLevel::Normal).is_none());
        assert!(evaluate_metric(&registry, "api.p95", -1.0, TierLevel::Normal).is_none());
    }
}
