//! Error types for benchmark history handling.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading, extending or checking a benchmark history.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid benchmark data JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A `unit` string whose secondary metrics are not `<number> <unit>` pairs.
    #[error("invalid unit string {unit:?}: {reason}")]
    InvalidUnit { unit: String, reason: String },

    #[error("invalid extra string {extra:?}: {reason}")]
    InvalidExtra { extra: String, reason: String },

    #[error("sample for commit {commit} has no benchmark results")]
    EmptyBenches { commit: String },

    /// A bench value JSON cannot represent (NaN or infinite).
    #[error("bench {bench:?} of commit {commit} has non-finite value {value}")]
    InvalidValue {
        commit: String,
        bench: String,
        value: f64,
    },

    #[error("invalid commit: {reason}")]
    InvalidCommit { reason: String },

    /// Appending would make `date` go backwards within a suite.
    #[error("sample date {date} precedes last recorded date {last} in suite {suite:?}")]
    NonMonotonicDate { suite: String, date: u64, last: u64 },

    #[error("commit {commit} is already the latest sample of suite {suite:?}")]
    DuplicateCommit { suite: String, commit: String },

    #[error("unknown suite {0:?}")]
    UnknownSuite(String),

    #[error("snapshot {newer} does not extend {older}: {reason}")]
    NotAppendOnly {
        older: String,
        newer: String,
        reason: String,
    },
}

impl HistoryError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        HistoryError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, HistoryError>;
