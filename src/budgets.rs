use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::types::{PlanTier, TierBudget};

/// Budgets keyed by flattened metric name (`<metric>.<stat>`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BudgetRegistry {
    budgets: BTreeMap<String, TierBudget>,
}

impl BudgetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_budget(mut self, metric: impl Into<String>, budget: TierBudget) -> Self {
        self.budgets.insert(metric.into(), budget);
        self
    }

    pub fn get(&self, metric: &str) -> Option<&TierBudget> {
        self.budgets.get(metric)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TierBudget)> {
        self.budgets.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.budgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.budgets.is_empty()
    }

    /// Built-in budgets for the API, database and AI generation load tests.
    pub fn defaults() -> Self {
        use TierBudget::{HigherIsBetter, LowerIsBetter};

        Self::new()
            .with_budget("http_req_duration.p95", LowerIsBetter { strict: 300.0, normal: 500.0, relaxed: 800.0 })
            .with_budget("http_req_duration.p99", LowerIsBetter { strict: 500.0, normal: 1000.0, relaxed: 1500.0 })
            .with_budget("http_req_duration.avg", LowerIsBetter { strict: 150.0, normal: 250.0, relaxed: 400.0 })
            .with_budget("http_req_failed.rate", LowerIsBetter { strict: 0.001, normal: 0.01, relaxed: 0.05 })
            .with_budget("db_query_duration.p95", LowerIsBetter { strict: 50.0, normal: 100.0, relaxed: 200.0 })
            .with_budget("ai_generation_duration.p95", LowerIsBetter { strict: 3000.0, normal: 5000.0, relaxed: 10000.0 })
            .with_budget("http_reqs.rate", HigherIsBetter { min: 100.0, target: 200.0, max: 500.0 })
            .with_budget("checks.rate", HigherIsBetter { min: 0.95, target: 0.99, max: 1.0 })
            .with_budget("cache_hit_ratio.rate", HigherIsBetter { min: 0.7, target: 0.9, max: 1.0 })
    }
}

/// Built-in plan table, cheapest first.
pub fn default_plan_tiers() -> Vec<PlanTier> {
    let limits = |pairs: &[(&str, f64)]| -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    };

    vec![
        PlanTier {
            name: "free".to_string(),
            monthly_cost: 0.0,
            limits: limits(&[("database_gb", 0.5), ("storage_gb", 1.0), ("bandwidth_gb", 2.0), ("monthly_active_users", 50_000.0)]),
            overage_rate_per_unit: BTreeMap::new(),
        },
        PlanTier {
            name: "pro".to_string(),
            monthly_cost: 25.0,
            limits: limits(&[("database_gb", 8.0), ("storage_gb", 100.0), ("bandwidth_gb", 250.0), ("monthly_active_users", 100_000.0)]),
            overage_rate_per_unit: limits(&[("database_gb", 0.125), ("storage_gb", 0.021), ("bandwidth_gb", 0.09), ("monthly_active_users", 0.00325)]),
        },
        PlanTier {
            name: "team".to_string(),
            monthly_cost: 599.0,
            limits: limits(&[("database_gb", 64.0), ("storage_gb", 1_000.0), ("bandwidth_gb", 2_500.0), ("monthly_active_users", 1_000_000.0)]),
            overage_rate_per_unit: limits(&[("database_gb", 0.125), ("storage_gb", 0.021), ("bandwidth_gb", 0.09), ("monthly_active_users", 0.00325)]),
        },
    ]
}

pub fn load_budget_registry(path: &Path) -> Result<BudgetRegistry> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read budgets file {}", path.display()))?;
    let registry: BudgetRegistry = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid budgets file {}", path.display()))?;
    Ok(registry)
}

pub fn load_plan_tiers(path: &Path) -> Result<Vec<PlanTier>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read plans file {}", path.display()))?;
    let tiers: Vec<PlanTier> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid plans file {}", path.display()))?;
    if tiers.is_empty() {
        return Err(anyhow!("Plans file {} defines no tiers", path.display()));
    }
    Ok(tiers)
}
