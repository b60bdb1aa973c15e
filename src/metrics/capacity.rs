use std::collections::BTreeMap;

use crate::metrics::trend::analyze;
use crate::parsing::{trend_value, usable_value};
use crate::types::{CapacityProjection, MetricSample, PlanTier, ResourceUsage, TierSelection};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Extrapolate `current` by `horizon_days`. Never projects below `current`:
/// sizing is worst-case, so shrinking usage counts as zero growth.
pub fn project(current: f64, growth_per_day: f64, horizon_days: f64) -> f64 {
    (current + growth_per_day * horizon_days).max(current)
}

/// Daily growth fitted over a resource's samples.
///
/// The regression runs over sample indices, so its slope is rescaled by the
/// mean spacing between samples in days. Zero spacing counts each step as a day.
pub fn fitted_growth_per_day(samples: &[MetricSample]) -> f64 {
    let mut usable: Vec<&MetricSample> = samples
        .iter()
        .filter(|s| trend_value(s.value).is_some())
        .collect();
    usable.sort_by_key(|s| s.timestamp);

    let values: Vec<f64> = usable.iter().map(|s| s.value).collect();
    let trend = analyze(&values);
    if trend.slope == 0.0 {
        return 0.0;
    }

    let (first, last) = (usable[0].timestamp, usable[usable.len() - 1].timestamp);
    let span_days = (last - first).num_seconds() as f64 / SECONDS_PER_DAY;
    let spacing_days = span_days / (usable.len() - 1) as f64;
    if spacing_days > 0.0 {
        trend.slope / spacing_days
    } else {
        trend.slope
    }
}

/// Project one resource. Uses the supplied growth rate when present, otherwise
/// fits one. Returns `None` when the resource has no usable reading.
pub fn project_resource(usage: &ResourceUsage, horizon_days: f64) -> Option<CapacityProjection> {
    let current = usage
        .samples
        .iter()
        .filter(|s| usable_value(s.value).is_some())
        .max_by_key(|s| s.timestamp)?
        .value;

    let growth_per_day = usage
        .growth_per_day
        .filter(|g| g.is_finite())
        .unwrap_or_else(|| fitted_growth_per_day(&usage.samples));

    Some(CapacityProjection {
        resource: usage.resource.clone(),
        current_value: current,
        horizon_days,
        projected_value: project(current, growth_per_day, horizon_days),
        growth_per_day,
    })
}

fn overage_cost(projections: &BTreeMap<String, f64>, tier: &PlanTier) -> f64 {
    projections
        .iter()
        .filter_map(|(resource, projected)| {
            let limit = tier.limits.get(resource)?;
            let rate = tier.overage_rate_per_unit.get(resource)?;
            Some((projected - limit).max(0.0) * rate)
        })
        .sum()
}

/// A resource without a declared limit is unlimited on that tier.
fn tier_fits(projections: &BTreeMap<String, f64>, tier: &PlanTier) -> bool {
    projections.iter().all(|(resource, projected)| {
        match tier.limits.get(resource) {
            Some(limit) => {
                projected <= limit || tier.overage_rate_per_unit.contains_key(resource)
            }
            None => true,
        }
    })
}

/// Pick the plan with the lowest `monthly_cost + overage` among those that fit.
///
/// Tiers are considered cheapest first and ties keep the cheaper base plan.
/// When nothing fits the most expensive tier is returned with `fits == false`.
/// Returns `None` only for an empty tier list.
pub fn select_tier(projections: &BTreeMap<String, f64>, tiers: &[PlanTier]) -> Option<TierSelection> {
    let mut ordered: Vec<&PlanTier> = tiers.iter().collect();
    ordered.sort_by(|a, b| a.monthly_cost.total_cmp(&b.monthly_cost));

    let mut best: Option<TierSelection> = None;
    for tier in &ordered {
        if !tier_fits(projections, tier) {
            continue;
        }
        let candidate = TierSelection {
            chosen: (*tier).clone(),
            fits: true,
            overage_cost: overage_cost(projections, tier),
        };
        let better = match &best {
            Some(current) => candidate.total_monthly_cost() < current.total_monthly_cost(),
            None => true,
        };
        if better {
            best = Some(candidate);
        }
    }

    best.or_else(|| {
        ordered.last().map(|tier| TierSelection {
            chosen: (*tier).clone(),
            fits: false,
            overage_cost: overage_cost(projections, tier),
        })
    })
}
