//! Append-only checks between successive copies of a data file.
//!
//! A history is only allowed to grow: every suite of an older snapshot must
//! still exist in a newer one, with its samples forming an unchanged prefix.
//! Samples are compared by fingerprint (SHA-256 of their canonical JSON).

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{HistoryError, Result};
use crate::schema::{BenchmarkSample, DashboardData};
use crate::store::parse_data_js;

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Hex SHA-256 of the sample's canonical JSON.
pub fn fingerprint(sample: &BenchmarkSample) -> String {
    // Struct fields serialize in declaration order, so this is stable.
    let bytes = serde_json::to_vec(sample).unwrap_or_default();
    hex(&Sha256::digest(&bytes))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AppendViolation {
    MissingSuite { suite: String },
    RewrittenEntry { suite: String, index: usize },
    Truncated { suite: String, older: usize, newer: usize },
}

impl fmt::Display for AppendViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppendViolation::MissingSuite { suite } => write!(f, "suite {suite:?} disappeared"),
            AppendViolation::RewrittenEntry { suite, index } => {
                write!(f, "sample {index} of suite {suite:?} was rewritten")
            }
            AppendViolation::Truncated {
                suite,
                older,
                newer,
            } => write!(f, "suite {suite:?} shrank from {older} to {newer} samples"),
        }
    }
}

/// Check that `newer` only appended to `older`.
pub fn check_append_only(
    older: &DashboardData,
    newer: &DashboardData,
) -> std::result::Result<(), AppendViolation> {
    for (suite, old_samples) in &older.entries {
        let Some(new_samples) = newer.entries.get(suite) else {
            return Err(AppendViolation::MissingSuite {
                suite: suite.clone(),
            });
        };
        if new_samples.len() < old_samples.len() {
            return Err(AppendViolation::Truncated {
                suite: suite.clone(),
                older: old_samples.len(),
                newer: new_samples.len(),
            });
        }
        for (index, (old, new)) in old_samples.iter().zip(new_samples).enumerate() {
            if old != new && fingerprint(old) != fingerprint(new) {
                return Err(AppendViolation::RewrittenEntry {
                    suite: suite.clone(),
                    index,
                });
            }
        }
    }
    Ok(())
}

/// [`check_append_only`] as a [`HistoryError`], labelling both sides.
pub fn ensure_extends(
    older_label: &str,
    older: &DashboardData,
    newer_label: &str,
    newer: &DashboardData,
) -> Result<()> {
    check_append_only(older, newer).map_err(|v| HistoryError::NotAppendOnly {
        older: older_label.to_string(),
        newer: newer_label.to_string(),
        reason: v.to_string(),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotInfo {
    pub path: PathBuf,
    pub last_update: u64,
    pub samples: usize,
    pub content_sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PairViolation {
    pub older: PathBuf,
    pub newer: PathBuf,
    #[serde(flatten)]
    pub violation: AppendViolation,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SnapshotReport {
    /// Distinct snapshots, oldest first.
    pub snapshots: Vec<SnapshotInfo>,
    /// Files skipped because their bytes equal an earlier snapshot.
    pub duplicates: Vec<PathBuf>,
    pub violations: Vec<PairViolation>,
}

impl SnapshotReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

fn is_snapshot_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("js") | Some("json")
    )
}

fn load_snapshot(path: &Path) -> Result<(SnapshotInfo, DashboardData)> {
    let bytes = fs::read(path).map_err(|e| HistoryError::io(path, e))?;
    let content_sha256 = hex(&Sha256::digest(&bytes));
    let data = parse_data_js(&String::from_utf8_lossy(&bytes))?;
    let info = SnapshotInfo {
        path: path.to_path_buf(),
        last_update: data.last_update,
        samples: data.sample_count(),
        content_sha256,
    };
    Ok((info, data))
}

/// Load every `*.js`/`*.json` snapshot below `dir` and check that each one
/// extends its predecessor (ordered by `lastUpdate`, then path).
pub fn check_dir<P: AsRef<Path>>(dir: P) -> Result<SnapshotReport> {
    let dir = dir.as_ref();
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            HistoryError::io(path, e.into())
        })?;
        if entry.file_type().is_file() && is_snapshot_file(entry.path()) {
            paths.push(entry.into_path());
        }
    }
    debug!(dir = %dir.display(), files = paths.len(), "found snapshot files");

    let mut loaded: Vec<(SnapshotInfo, DashboardData)> = paths
        .par_iter()
        .map(|p| load_snapshot(p))
        .collect::<Result<_>>()?;
    loaded.sort_by(|(a, _), (b, _)| {
        a.last_update
            .cmp(&b.last_update)
            .then_with(|| a.path.cmp(&b.path))
    });

    let mut report = SnapshotReport::default();
    let mut distinct: Vec<(SnapshotInfo, DashboardData)> = Vec::with_capacity(loaded.len());
    for (info, data) in loaded {
        if distinct
            .iter()
            .any(|(seen, _)| seen.content_sha256 == info.content_sha256)
        {
            report.duplicates.push(info.path);
        } else {
            distinct.push((info, data));
        }
    }

    let violations: Vec<PairViolation> = distinct
        .par_windows(2)
        .filter_map(|pair| {
            let (older, older_data) = &pair[0];
            let (newer, newer_data) = &pair[1];
            check_append_only(older_data, newer_data)
                .err()
                .map(|violation| PairViolation {
                    older: older.path.clone(),
                    newer: newer.path.clone(),
                    violation,
                })
        })
        .collect();

    for v in &violations {
        warn!(
            older = %v.older.display(),
            newer = %v.newer.display(),
            violation = %v.violation,
            "snapshot is not an append-only extension"
        );
    }

    report.snapshots = distinct.into_iter().map(|(info, _)| info).collect();
    report.violations = violations;
    info!(
        snapshots = report.snapshots.len(),
        duplicates = report.duplicates.len(),
        violations = report.violations.len(),
        "checked snapshots"
    );
    Ok(report)
}
