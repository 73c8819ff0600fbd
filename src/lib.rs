//! Tooling for continuous-benchmark history files.
//!
//! A history is the `window.BENCHMARK_DATA = {...}` file a benchmark dashboard
//! reads: per suite, an append-only list of samples, one per benchmarked
//! commit. This crate extracts samples from `go test -bench` output, appends
//! them without ever rewriting earlier entries, validates histories and their
//! snapshots, and derives series and regression reports from them.

pub mod compare;
pub mod config;
pub mod error;
pub mod gobench;
pub mod schema;
pub mod series;
pub mod snapshots;
pub mod store;
pub mod synth;
pub mod time;
pub mod unit;
pub mod validate;

pub use error::{HistoryError, Result};
pub use schema::{BenchResult, BenchmarkSample, Commit, DashboardData, Person};
