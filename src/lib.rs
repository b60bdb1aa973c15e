// Public modules
pub mod types;
pub mod config;
pub mod parsing;
pub mod budgets;
pub mod metrics;
pub mod collector;
pub mod report;
pub mod slack;

// Re-export commonly used items
pub use types::*;
pub use config::{load_config, load_config_with_env, EnvironmentProvider, SystemEnvironment, MockEnvironment};
pub use parsing::{usable_value, trend_value, parse_threshold_level, flatten_snapshot, flatten_resources};
pub use budgets::{BudgetRegistry, default_plan_tiers, load_budget_registry, load_plan_tiers};
pub use metrics::*;
pub use collector::{SnapshotStore, SnapshotError};
pub use report::{Report, ReportAssembler, ReportSummary, TestCaseResult, MetricTrend, CapacityReport, write_report};
pub use slack::{build_slack_payload, send_to_slack};
