//! Regression alerting between the two newest samples of a suite.

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{HistoryError, Result};
use crate::schema::DashboardData;
use crate::series::BenchKey;
use crate::unit::UnitMetrics;

/// Ratio above which a bench counts as a regression (200%).
pub const DEFAULT_ALERT_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchComparison {
    pub key: BenchKey,
    pub previous: f64,
    pub current: f64,
    pub unit: String,
    /// `> 1.0` means worse, whatever the unit's direction.
    pub ratio: f64,
    pub regression: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompareReport {
    pub suite: String,
    pub previous_commit: String,
    pub current_commit: String,
    pub threshold: f64,
    pub benches: Vec<BenchComparison>,
    /// Benches of the newest sample with no counterpart in the previous one.
    pub new_benches: Vec<BenchKey>,
}

impl CompareReport {
    pub fn regressions(&self) -> impl Iterator<Item = &BenchComparison> {
        self.benches.iter().filter(|b| b.regression)
    }

    pub fn has_regressions(&self) -> bool {
        self.regressions().next().is_some()
    }
}

fn worse_ratio(previous: f64, current: f64, smaller_is_better: bool) -> f64 {
    let (num, den) = if smaller_is_better {
        (current, previous)
    } else {
        (previous, current)
    };
    if den == 0.0 {
        if num == 0.0 {
            1.0
        } else {
            f64::INFINITY
        }
    } else {
        num / den
    }
}

/// Compare the newest sample of `suite` with the one before it.
///
/// Returns `Ok(None)` while the suite has fewer than two samples.
pub fn compare_latest(
    data: &DashboardData,
    suite: &str,
    threshold: f64,
) -> Result<Option<CompareReport>> {
    let samples = data
        .suite(suite)
        .ok_or_else(|| HistoryError::UnknownSuite(suite.to_string()))?;
    let [.., previous, current] = samples else {
        return Ok(None);
    };

    let mut report = CompareReport {
        suite: suite.to_string(),
        previous_commit: previous.commit.id.clone(),
        current_commit: current.commit.id.clone(),
        threshold,
        benches: Vec::with_capacity(current.benches.len()),
        new_benches: Vec::new(),
    };

    for result in &current.benches {
        let key = BenchKey::of(result);
        let Some(before) = previous
            .benches
            .iter()
            .find(|b| BenchKey::of(b) == key)
        else {
            report.new_benches.push(key);
            continue;
        };

        let smaller_is_better = UnitMetrics::parse(&result.unit)
            .map(|m| m.smaller_is_better())
            .unwrap_or(true);
        let ratio = worse_ratio(before.value, result.value, smaller_is_better);
        let regression = ratio > threshold;
        if regression {
            warn!(
                bench = %key.label(),
                previous = before.value,
                current = result.value,
                ratio,
                threshold,
                "possible performance regression"
            );
        }

        report.benches.push(BenchComparison {
            key,
            previous: before.value,
            current: result.value,
            unit: result.unit.clone(),
            ratio,
            regression,
        });
    }

    info!(
        suite,
        compared = report.benches.len(),
        regressions = report.regressions().count(),
        "compared latest benchmark sample"
    );
    Ok(Some(report))
}
