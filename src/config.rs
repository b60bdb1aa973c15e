use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

use crate::parsing::{parse_bool, parse_threshold_level};
use crate::types::{Config, TierLevel};

/// Trait for abstracting environment variable access
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;
}

/// Production implementation using std::env
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    pub fn set_var<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set_var(key, value);
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn load_config() -> Result<Config> {
    load_config_with_env(&SystemEnvironment)
}

fn non_empty<E: EnvironmentProvider>(env: &E, key: &str) -> Option<String> {
    env.get_var(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn load_config_with_env<E: EnvironmentProvider>(env: &E) -> Result<Config> {
    let defaults = Config::default();

    let results_dir = non_empty(env, "RESULTS_DIR")
        .map(PathBuf::from)
        .unwrap_or(defaults.results_dir);

    let report_path = non_empty(env, "REPORT_PATH")
        .map(PathBuf::from)
        .unwrap_or(defaults.report_path);

    // Unrecognised levels fall back to normal rather than aborting the run.
    let threshold_level = match env.get_var("THRESHOLD_LEVEL") {
        Some(raw) => parse_threshold_level(&raw).unwrap_or_else(|| {
            if !raw.trim().is_empty() {
                warn!("Unrecognized THRESHOLD_LEVEL {:?}, using normal", raw);
            }
            TierLevel::Normal
        }),
        None => TierLevel::Normal,
    };

    let trend_window: usize = env.get_var("TREND_WINDOW")
        .and_then(|v| v.trim().parse().ok())
        .filter(|w| *w > 0)
        .unwrap_or(defaults.trend_window);

    let capacity_horizon_days: f64 = match non_empty(env, "CAPACITY_HORIZON_DAYS") {
        Some(v) => v.parse().context("Invalid CAPACITY_HORIZON_DAYS")?,
        None => defaults.capacity_horizon_days,
    };
    if !capacity_horizon_days.is_finite() || capacity_horizon_days < 0.0 {
        return Err(anyhow!("CAPACITY_HORIZON_DAYS must be a non-negative number of days"));
    }

    let polarity_aware_trends = env.get_var("TREND_POLARITY_AWARE")
        .map(|v| parse_bool(v.trim()))
        .unwrap_or(false);

    Ok(Config {
        results_dir,
        report_path,
        threshold_level,
        trend_window,
        capacity_horizon_days,
        current_plan: non_empty(env, "CURRENT_PLAN"),
        slack_webhook_url: non_empty(env, "SLACK_WEBHOOK_URL"),
        budgets_path: non_empty(env, "BUDGETS_PATH").map(PathBuf::from),
        plans_path: non_empty(env, "PLANS_PATH").map(PathBuf::from),
        polarity_aware_trends,
        project_name: non_empty(env, "PROJECT_NAME"),
    })
}
