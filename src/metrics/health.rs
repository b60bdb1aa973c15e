const VIOLATION_WEIGHT: i64 = 15;
const WARNING_WEIGHT: i64 = 5;
const DEGRADING_TREND_WEIGHT: i64 = 10;

/// Fold the three report counts into a 0-100 score. The only place the
/// weights live; callers pass counts, never partial scores.
pub fn score(violations: usize, warnings: usize, degrading_trends: usize) -> u8 {
    let penalty = |count: usize, weight: i64| i64::try_from(count).unwrap_or(i64::MAX).saturating_mul(weight);
    let raw = 100_i64
        .saturating_sub(penalty(violations, VIOLATION_WEIGHT))
        .saturating_sub(penalty(warnings, WARNING_WEIGHT))
        .saturating_sub(penalty(degrading_trends, DEGRADING_TREND_WEIGHT));
    raw.clamp(0, 100) as u8
}
