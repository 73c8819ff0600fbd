//! Structured views of the free-text `unit` and `extra` fields.
//!
//! The dashboard stores Go benchmark lines almost verbatim: the primary metric
//! lives in `value`, and every further `<number> <unit>` pair printed by
//! `go test -benchmem` is folded into the `unit` string, tab separated.

use std::fmt;

use serde::Serialize;

use crate::error::{HistoryError, Result};

pub const BYTES_PER_OP: &str = "B/op";
pub const ALLOCS_PER_OP: &str = "allocs/op";

/// A secondary metric folded into a unit string, e.g. `50342 B/op`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    pub value: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitMetrics {
    /// Unit of the sample's `value`, e.g. `ns/op`.
    pub primary: String,
    pub secondary: Vec<Metric>,
}

impl UnitMetrics {
    pub fn parse(unit: &str) -> Result<Self> {
        let mut tokens = unit.split_whitespace();
        let primary = tokens
            .next()
            .ok_or_else(|| invalid_unit(unit, "empty unit"))?
            .to_string();

        let mut secondary = Vec::new();
        while let Some(raw) = tokens.next() {
            let value: f64 = raw
                .parse()
                .map_err(|_| invalid_unit(unit, format!("expected a number, found {raw:?}")))?;
            let name = tokens
                .next()
                .ok_or_else(|| invalid_unit(unit, format!("value {raw} has no unit")))?;
            secondary.push(Metric {
                value,
                unit: name.to_string(),
            });
        }

        Ok(Self { primary, secondary })
    }

    pub fn metric(&self, unit: &str) -> Option<f64> {
        self.secondary
            .iter()
            .find(|m| m.unit == unit)
            .map(|m| m.value)
    }

    pub fn bytes_per_op(&self) -> Option<f64> {
        self.metric(BYTES_PER_OP)
    }

    pub fn allocs_per_op(&self) -> Option<f64> {
        self.metric(ALLOCS_PER_OP)
    }

    /// Whether a lower primary value is an improvement.
    ///
    /// Throughput-style units (`ops/sec`, `MB/s`, `items/s`) are the only ones
    /// where bigger is better.
    pub fn smaller_is_better(&self) -> bool {
        let unit = self.primary.to_ascii_lowercase();
        !(unit.ends_with("/s") || unit.ends_with("/sec"))
    }
}

impl fmt::Display for UnitMetrics {
    /// Re-creates the Go layout: each pair right-aligned after a tab.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.primary)?;
        for m in &self.secondary {
            write!(f, "\t{:>8} {}", m.value, m.unit)?;
        }
        Ok(())
    }
}

fn invalid_unit(unit: &str, reason: impl Into<String>) -> HistoryError {
    HistoryError::InvalidUnit {
        unit: unit.to_string(),
        reason: reason.into(),
    }
}

/// Run shape encoded in `extra`: `"<n> times"` and, for `-cpu` runs, `"<n> procs"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RunExtra {
    pub iterations: Option<u64>,
    pub procs: Option<u32>,
}

impl RunExtra {
    pub fn parse(extra: &str) -> Result<Self> {
        let mut out = RunExtra::default();
        for line in extra.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let Some((count, label)) = line.split_once(char::is_whitespace) else {
                continue;
            };
            match label.trim() {
                "times" => {
                    out.iterations = Some(count.parse().map_err(|_| invalid_extra(extra, line))?)
                }
                "procs" => out.procs = Some(count.parse().map_err(|_| invalid_extra(extra, line))?),
                _ => {}
            }
        }
        Ok(out)
    }

    /// `extra` text for a Go run, the inverse of [`RunExtra::parse`].
    pub fn render(iterations: u64, procs: Option<u32>) -> String {
        match procs {
            Some(p) => format!("{iterations} times\n{p} procs"),
            None => format!("{iterations} times"),
        }
    }
}

fn invalid_extra(extra: &str, line: &str) -> HistoryError {
    HistoryError::InvalidExtra {
        extra: extra.to_string(),
        reason: format!("bad count in line {line:?}"),
    }
}
