//! Structural checks over a whole history.

use serde::Serialize;
use tracing::debug;

use crate::schema::{DashboardData, GO_TOOL};
use crate::unit::UnitMetrics;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationKind {
    EmptyCommitId,
    EmptyBenches,
    EmptyBenchName { bench: usize },
    NonFiniteValue { bench: usize },
    DateRegression { date: u64, previous: u64 },
    MalformedUnit { bench: usize, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub suite: String,
    /// Position of the offending sample within its suite.
    pub index: usize,
    #[serde(flatten)]
    pub kind: ViolationKind,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub suites: usize,
    pub samples: usize,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

pub fn validate(data: &DashboardData) -> ValidationReport {
    let mut report = ValidationReport {
        suites: data.entries.len(),
        samples: data.sample_count(),
        violations: Vec::new(),
    };

    for (suite, samples) in &data.entries {
        let mut push = |index: usize, kind: ViolationKind| {
            report.violations.push(Violation {
                suite: suite.clone(),
                index,
                kind,
            })
        };

        let mut previous: Option<u64> = None;
        for (index, sample) in samples.iter().enumerate() {
            if sample.commit.id.trim().is_empty() {
                push(index, ViolationKind::EmptyCommitId);
            }
            if sample.benches.is_empty() {
                push(index, ViolationKind::EmptyBenches);
            }
            if let Some(prev) = previous {
                if sample.date < prev {
                    push(
                        index,
                        ViolationKind::DateRegression {
                            date: sample.date,
                            previous: prev,
                        },
                    );
                }
            }
            previous = Some(previous.map_or(sample.date, |p| p.max(sample.date)));

            for (bench, result) in sample.benches.iter().enumerate() {
                if result.name.trim().is_empty() {
                    push(index, ViolationKind::EmptyBenchName { bench });
                }
                if !result.value.is_finite() {
                    push(index, ViolationKind::NonFiniteValue { bench });
                }
                if sample.tool == GO_TOOL {
                    if let Err(e) = UnitMetrics::parse(&result.unit) {
                        push(
                            index,
                            ViolationKind::MalformedUnit {
                                bench,
                                reason: e.to_string(),
                            },
                        );
                    }
                }
            }
        }
    }

    debug!(
        samples = report.samples,
        violations = report.violations.len(),
        "validated benchmark data"
    );
    report
}
