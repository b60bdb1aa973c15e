// Engine primitives: pure functions over values and static configuration
pub mod tier;
pub mod trend;
pub mod capacity;
pub mod health;

// Re-export commonly used items
pub use tier::{evaluate, evaluate_metric, APPROACHING_BUDGET_MARGIN};
pub use trend::{analyze, presented_direction, TrendSeries, MIN_TREND_POINTS};
pub use capacity::{fitted_growth_per_day, project, project_resource, select_tier};
pub use health::score;
