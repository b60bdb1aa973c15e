use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::parsing::{flatten_resources, flatten_snapshot};
use crate::types::{MetricSample, ResourceUsage, RunSnapshot, TestCaseInput};

/// Directory under the results root holding resource-usage snapshots.
pub const RESOURCES_DIR: &str = "resources";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} is not a JSON object")]
    NotAnObject { path: PathBuf },
    #[error("{path} has an unparseable timestamp {value:?}")]
    BadTimestamp { path: PathBuf, value: String },
}

/// One parsed snapshot file before flattening.
#[derive(Debug)]
pub struct RawSnapshot {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    pub document: Value,
}

/// Reads run and resource snapshots from a results directory.
///
/// Layout: `<root>/<test_case>/*.json` per run, `<root>/resources/*.json` for
/// resource usage. Each snapshot's run id is its file stem.
pub struct SnapshotStore {
    root: PathBuf,
    window: usize,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>, window: usize) -> Self {
        Self {
            root: root.into(),
            window: window.max(1),
        }
    }

    /// Load every test case with its windowed history. Test cases without a
    /// readable snapshot are skipped with a warning.
    pub fn load_test_cases(&self) -> Result<Vec<TestCaseInput>> {
        let mut dirs = Vec::new();
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read results directory {}", self.root.display()))?;
        for entry in entries {
            let entry = entry.context("Failed to read results directory entry")?;
            let path = entry.path();
            if path.is_dir() && entry.file_name() != RESOURCES_DIR {
                dirs.push(path);
            }
        }
        dirs.sort();

        let test_cases: Vec<TestCaseInput> = dirs
            .iter()
            .filter_map(|dir| self.load_test_case(dir))
            .collect();

        info!("Loaded {} test cases from {}", test_cases.len(), self.root.display());
        Ok(test_cases)
    }

    /// One test case from its directory. Any failure here is confined to this
    /// test case: it is logged and the case is skipped.
    fn load_test_case(&self, dir: &Path) -> Option<TestCaseInput> {
        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let raws = match self.load_dir(dir) {
            Ok(raws) => raws,
            Err(e) => {
                warn!("Skipping test case {}: {:#}", name, e);
                return None;
            }
        };
        let history: Vec<RunSnapshot> = raws
            .into_iter()
            .map(|raw| RunSnapshot {
                metrics: flatten_snapshot(&raw.document),
                run_id: raw.run_id,
                timestamp: raw.timestamp,
            })
            .collect();
        if history.is_empty() {
            warn!("No usable snapshots for test case {}, skipping", name);
            return None;
        }
        debug!("Loaded {} runs for test case {}", history.len(), name);
        Some(TestCaseInput::new(name, history))
    }

    /// Load resource-usage histories, one per resource, from `<root>/resources`.
    /// A missing directory means no capacity data.
    pub fn load_resources(&self) -> Result<Vec<ResourceUsage>> {
        let dir = self.root.join(RESOURCES_DIR);
        if !dir.is_dir() {
            debug!("No resource snapshots at {}", dir.display());
            return Ok(Vec::new());
        }

        let mut by_resource: BTreeMap<String, Vec<MetricSample>> = BTreeMap::new();
        for raw in self.load_dir(&dir)? {
            for (resource, value) in flatten_resources(&raw.document) {
                by_resource.entry(resource.clone()).or_default().push(MetricSample {
                    metric_name: resource,
                    value,
                    timestamp: raw.timestamp,
                });
            }
        }

        Ok(by_resource
            .into_iter()
            .map(|(resource, samples)| ResourceUsage {
                resource,
                samples,
                growth_per_day: None,
            })
            .collect())
    }

    /// Parse every `*.json` file in `dir`, oldest first, keeping the newest
    /// snapshot per run id and the most recent `window` runs.
    fn load_dir(&self, dir: &Path) -> Result<Vec<RawSnapshot>> {
        let mut snapshots = Vec::new();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read snapshot directory {}", dir.display()))?;
        for entry in entries {
            let path = entry.context("Failed to read snapshot directory entry")?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match load_snapshot_file(&path) {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => warn!("Skipping snapshot: {}", e),
            }
        }

        snapshots.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.run_id.cmp(&b.run_id)));
        let mut seen = HashSet::new();
        snapshots.reverse();
        snapshots.retain(|s| seen.insert(s.run_id.clone()));
        snapshots.reverse();

        if snapshots.len() > self.window {
            let excess = snapshots.len() - self.window;
            snapshots.drain(..excess);
        }
        Ok(snapshots)
    }
}

/// Read one snapshot. The timestamp comes from a top-level RFC 3339
/// `timestamp` field, falling back to the file's modification time.
pub fn load_snapshot_file(path: &Path) -> Result<RawSnapshot, SnapshotError> {
    let raw = std::fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let document: Value = serde_json::from_str(&raw).map_err(|source| SnapshotError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    if !document.is_object() {
        return Err(SnapshotError::NotAnObject { path: path.to_path_buf() });
    }

    let timestamp = match document.get("timestamp").and_then(Value::as_str) {
        Some(ts) => DateTime::parse_from_rfc3339(ts)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| SnapshotError::BadTimestamp {
                path: path.to_path_buf(),
                value: ts.to_string(),
            })?,
        None => {
            let modified = std::fs::metadata(path)
                .and_then(|m| m.modified())
                .map_err(|source| SnapshotError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
            DateTime::<Utc>::from(modified)
        }
    };

    let run_id = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(RawSnapshot {
        run_id,
        timestamp,
        document,
    })
}
