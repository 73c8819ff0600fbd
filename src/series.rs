//! Per-benchmark time series, the shape a chart renderer consumes.

use serde::Serialize;

use crate::error::{HistoryError, Result};
use crate::schema::{BenchResult, DashboardData};
use crate::unit::{RunExtra, UnitMetrics};

/// Identity of a benchmark across samples: the name plus the procs it ran with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct BenchKey {
    pub name: String,
    pub procs: Option<u32>,
}

impl BenchKey {
    pub fn of(result: &BenchResult) -> Self {
        let procs = result
            .extra
            .as_deref()
            .and_then(|e| RunExtra::parse(e).ok())
            .and_then(|e| e.procs);
        Self {
            name: result.name.clone(),
            procs,
        }
    }

    /// `BenchmarkLogin` or `BenchmarkLogin-2`, as `go test` prints it.
    pub fn label(&self) -> String {
        match self.procs {
            Some(p) => format!("{}-{p}", self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Point {
    pub commit: String,
    pub date: u64,
    pub value: f64,
    pub unit: String,
    pub bytes_per_op: Option<f64>,
    pub allocs_per_op: Option<f64>,
    pub iterations: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub key: BenchKey,
    pub points: Vec<Point>,
}

/// One series per [`BenchKey`] in `suite`, in first-seen order.
pub fn extract(data: &DashboardData, suite: &str) -> Result<Vec<Series>> {
    let samples = data
        .suite(suite)
        .ok_or_else(|| HistoryError::UnknownSuite(suite.to_string()))?;

    let mut series: Vec<Series> = Vec::new();
    for sample in samples {
        for result in &sample.benches {
            let key = BenchKey::of(result);
            let metrics = UnitMetrics::parse(&result.unit).ok();
            let point = Point {
                commit: sample.commit.id.clone(),
                date: sample.date,
                value: result.value,
                unit: metrics
                    .as_ref()
                    .map_or_else(|| result.unit.clone(), |m| m.primary.clone()),
                bytes_per_op: metrics.as_ref().and_then(UnitMetrics::bytes_per_op),
                allocs_per_op: metrics.as_ref().and_then(UnitMetrics::allocs_per_op),
                iterations: result
                    .extra
                    .as_deref()
                    .and_then(|e| RunExtra::parse(e).ok())
                    .and_then(|e| e.iterations),
            };

            match series.iter_mut().find(|s| s.key == key) {
                Some(s) => s.points.push(point),
                None => series.push(Series {
                    key,
                    points: vec![point],
                }),
            }
        }
    }
    Ok(series)
}
