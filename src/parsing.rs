use serde_json::Value;
use std::collections::BTreeMap;

use crate::types::TierLevel;

/// A reading the evaluator can use: finite and non-negative.
pub fn usable_value(v: f64) -> Option<f64> {
    if v.is_finite() && v >= 0.0 {
        Some(v)
    } else {
        None
    }
}

/// A reading the trend analyzer can use: finite and strictly positive.
pub fn trend_value(v: f64) -> Option<f64> {
    if v.is_finite() && v > 0.0 {
        Some(v)
    } else {
        None
    }
}

pub fn parse_threshold_level(s: &str) -> Option<TierLevel> {
    match s.trim().to_ascii_lowercase().as_str() {
        "strict" => Some(TierLevel::Strict),
        "normal" => Some(TierLevel::Normal),
        "relaxed" => Some(TierLevel::Relaxed),
        _ => None,
    }
}

pub fn parse_bool(s: &str) -> bool {
    matches!(s, "1" | "true" | "TRUE" | "True")
}

/// Normalise k6-style stat keys: `p(95)` -> `p95`.
fn normalize_stat_key(key: &str) -> String {
    key.chars().filter(|c| *c != '(' && *c != ')').collect()
}

/// Flatten a run snapshot into `{"<metric>.<stat>": value}`.
///
/// Accepts stats directly under each metric or nested under a `values` object.
/// A metric given as a bare number is kept under its own name. Values from the
/// `state` object are kept as `state.<key>`. Non-numeric entries are dropped.
pub fn flatten_snapshot(doc: &Value) -> BTreeMap<String, f64> {
    let mut flat = BTreeMap::new();

    if let Some(metrics) = doc.get("metrics").and_then(Value::as_object) {
        for (name, body) in metrics {
            if let Some(v) = body.as_f64() {
                flat.insert(name.clone(), v);
                continue;
            }
            let stats = body
                .get("values")
                .and_then(Value::as_object)
                .or_else(|| body.as_object());
            let Some(stats) = stats else { continue };
            for (stat, v) in stats {
                if let Some(v) = v.as_f64() {
                    flat.insert(format!("{}.{}", name, normalize_stat_key(stat)), v);
                }
            }
        }
    }

    if let Some(state) = doc.get("state").and_then(Value::as_object) {
        for (key, v) in state {
            if let Some(v) = v.as_f64() {
                flat.insert(format!("state.{}", key), v);
            }
        }
    }

    flat
}

/// Extract `{resource: value}` from a resource-usage snapshot's `resources` object.
pub fn flatten_resources(doc: &Value) -> BTreeMap<String, f64> {
    doc.get("resources")
        .and_then(Value::as_object)
        .map(|resources| {
            resources
                .iter()
                .filter_map(|(name, v)| v.as_f64().map(|v| (name.clone(), v)))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usable_value() {
        assert_eq!(usable_value(0.0), Some(0.0));
        assert_eq!(usable_value(12.5), Some(12.5));
        assert_eq!(usable_value(-1.0), None);
        assert_eq!(usable_value(f64::NAN), None);
        assert_eq!(usable_value(f64::INFINITY), None);
    }

    #[test]
    fn test_trend_value_drops_zero() {
        assert_eq!(trend_value(0.0), None);
        assert_eq!(trend_value(0.5), Some(0.5));
        assert_eq!(trend_value(-3.0), None);
        assert_eq!(trend_value(f64::NAN), None);
    }

    #[test]
    fn test_parse_threshold_level() {
        assert_eq!(parse_threshold_level("strict"), Some(TierLevel::Strict));
        assert_eq!(parse_threshold_level(" Relaxed "), Some(TierLevel::Relaxed));
        assert_eq!(parse_threshold_level("NORMAL"), Some(TierLevel::Normal));
        assert_eq!(parse_threshold_level("lenient"), None);
        assert_eq!(parse_threshold_level(""), None);
    }

    #[test]
    fn test_flatten_snapshot() {
        let doc = json!({
            "metrics": {
                "http_req_duration": { "p95": 420.5, "p99": 900, "avg": 210.1 },
                "http_req_failed": { "rate": 0.002 },
                "vus": 50,
                "checks": { "values": { "rate": 0.99, "p(90)": 1.0 } },
                "label": { "kind": "trend" }
            },
            "state": { "testRunDurationMs": 60000, "isStdOutTTY": false }
        });

        let flat = flatten_snapshot(&doc);
        assert_eq!(flat.get("http_req_duration.p95"), Some(&420.5));
        assert_eq!(flat.get("http_req_duration.p99"), Some(&900.0));
        assert_eq!(flat.get("http_req_failed.rate"), Some(&0.002));
        assert_eq!(flat.get("vus"), Some(&50.0));
        assert_eq!(flat.get("checks.rate"), Some(&0.99));
        assert_eq!(flat.get("checks.p90"), Some(&1.0));
        assert_eq!(flat.get("state.testRunDurationMs"), Some(&60000.0));
        assert!(!flat.contains_key("label.kind"));
        assert!(!flat.contains_key("state.isStdOutTTY"));
    }

    #[test]
    fn test_flatten_snapshot_without_metrics() {
        assert!(flatten_snapshot(&json!({})).is_empty());
        assert!(flatten_snapshot(&json!({"metrics": []})).is_empty());
    }

    #[test]
    fn test_flatten_resources() {
        let doc = json!({ "resources": { "storage_gb": 12.5, "note": "x" } });
        let flat = flatten_resources(&doc);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat.get("storage_gb"), Some(&12.5));
        assert!(flatten_resources(&json!({})).is_empty());
    }
}
