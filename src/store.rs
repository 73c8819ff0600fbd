//! Reading, writing and appending to the dashboard data file.
//!
//! # File format
//!
//! ```text
//! window.BENCHMARK_DATA = {
//!   "lastUpdate": <epoch ms>,
//!   "repoUrl": "<url>",
//!   "entries": { "<suite>": [ <sample>, ... ] }
//! }
//! ```
//!
//! The file is only ever extended: [`append`] adds one sample to the end of a
//! suite and bumps `lastUpdate`, and [`save`] replaces the file atomically.

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{HistoryError, Result};
use crate::schema::{BenchmarkSample, DashboardData};

/// Global the dashboard page reads its data from.
pub const DATA_JS_VAR: &str = "window.BENCHMARK_DATA";

/// Assignment prefix written in front of the JSON body.
pub const DATA_JS_PREFIX: &str = "window.BENCHMARK_DATA = ";

/// What [`append`] does when the commit being appended is already the newest
/// sample of its suite (e.g. a re-run CI job).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    #[default]
    Reject,
    Allow,
}

/// Parse the contents of a data file. Bare JSON is accepted as well.
pub fn parse_data_js(text: &str) -> Result<DashboardData> {
    let body = text.trim_start();
    let body = match body.strip_prefix(DATA_JS_VAR) {
        Some(rest) => {
            let rest = rest.trim_start();
            rest.strip_prefix('=').unwrap_or(rest)
        }
        None => body,
    };
    let body = body.trim();
    let body = body.strip_suffix(';').unwrap_or(body);
    Ok(serde_json::from_str(body)?)
}

/// Render a data file: the assignment prefix followed by two-space indented JSON.
pub fn render_data_js(data: &DashboardData) -> Result<String> {
    let mut buf = Vec::with_capacity(64 * 1024);
    buf.extend_from_slice(DATA_JS_PREFIX.as_bytes());
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    data.serialize(&mut ser)?;
    // serde_json only ever emits UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn load<P: AsRef<Path>>(path: P) -> Result<DashboardData> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| HistoryError::io(path, e))?;
    let data = parse_data_js(&text)?;
    debug!(
        path = %path.display(),
        suites = data.entries.len(),
        samples = data.sample_count(),
        "loaded benchmark data"
    );
    Ok(data)
}

/// Load `path`, or start an empty history for `repo_url` if it does not exist yet.
pub fn load_or_init<P: AsRef<Path>>(path: P, repo_url: &str) -> Result<DashboardData> {
    let path = path.as_ref();
    if path.exists() {
        load(path)
    } else {
        info!(path = %path.display(), repo_url, "starting new benchmark history");
        Ok(DashboardData::new(repo_url))
    }
}

/// Write `data` to `path` through a temporary file in the same directory.
pub fn save<P: AsRef<Path>>(path: P, data: &DashboardData) -> Result<()> {
    let path = path.as_ref();
    let rendered = render_data_js(data)?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| HistoryError::io(dir, e))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| HistoryError::io(dir, e))?;
    tmp.write_all(rendered.as_bytes())
        .and_then(|_| tmp.flush())
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| HistoryError::io(tmp.path(), e))?;
    tmp.persist(path)
        .map_err(|e| HistoryError::io(path, e.error))?;

    debug!(path = %path.display(), bytes = rendered.len(), "saved benchmark data");
    Ok(())
}

/// Append `sample` to `suite`, creating the suite if needed.
///
/// Existing samples are never touched. `last_update` becomes the later of its
/// current value and `now_ms`.
pub fn append(
    data: &mut DashboardData,
    suite: &str,
    sample: BenchmarkSample,
    now_ms: u64,
    policy: DuplicatePolicy,
) -> Result<()> {
    if sample.commit.id.trim().is_empty() {
        return Err(HistoryError::InvalidCommit {
            reason: "commit id is empty".to_string(),
        });
    }
    if sample.benches.is_empty() {
        return Err(HistoryError::EmptyBenches {
            commit: sample.commit.id.clone(),
        });
    }

    // serde_json writes non-finite floats as `null`, which would make the
    // file unreadable on the next load.
    if let Some(bad) = sample.benches.iter().find(|b| !b.value.is_finite()) {
        return Err(HistoryError::InvalidValue {
            commit: sample.commit.id.clone(),
            bench: bad.name.clone(),
            value: bad.value,
        });
    }

    if let Some(last) = data.entries.get(suite).and_then(|s| s.last()) {
        if sample.date < last.date {
            return Err(HistoryError::NonMonotonicDate {
                suite: suite.to_string(),
                date: sample.date,
                last: last.date,
            });
        }
        if last.commit.id == sample.commit.id && policy == DuplicatePolicy::Reject {
            return Err(HistoryError::DuplicateCommit {
                suite: suite.to_string(),
                commit: sample.commit.id.clone(),
            });
        }
    }

    info!(
        suite,
        commit = %sample.commit.id,
        benches = sample.benches.len(),
        date = sample.date,
        "appending benchmark sample"
    );

    data.entries
        .entry(suite.to_string())
        .or_default()
        .push(sample);
    data.last_update = data.last_update.max(now_ms);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BenchResult, Commit, Person};
    use tempfile::tempdir;

    fn person(name: &str) -> Person {
        Person {
            email: format!("{name}@example.com"),
            name: name.to_string(),
            username: Some(name.to_string()),
        }
    }

    fn sample(id: &str, date: u64) -> BenchmarkSample {
        BenchmarkSample {
            commit: Commit {
                author: person("Nerzal"),
                committer: person("web-flow"),
                distinct: Some(true),
                id: id.to_string(),
                message: "Merge pull request".to_string(),
                timestamp: "2020-01-14T16:42:53+01:00".to_string(),
                tree_id: None,
                url: format!("https://github.com/Nerzal/gocloak/commit/{id}"),
            },
            date,
            tool: "go".to_string(),
            benches: vec![BenchResult {
                name: "BenchmarkLogin".to_string(),
                value: 85678248.0,
                unit: "ns/op\t   50342 B/op\t     180 allocs/op".to_string(),
                range: None,
                extra: Some("13 times".to_string()),
            }],
        }
    }

    #[test]
    fn parse_accepts_prefix_semicolon_and_bare_json() {
        let json = r#"{"lastUpdate":1,"repoUrl":"r","entries":{}}"#;
        let with_prefix = format!("{DATA_JS_PREFIX}{json}");
        let with_semicolon = format!("\n{DATA_JS_PREFIX}{json};\n");
        let no_spaces = format!("window.BENCHMARK_DATA={json}");

        for text in [json.to_string(), with_prefix, with_semicolon, no_spaces] {
            let data = parse_data_js(&text).unwrap();
            assert_eq!(data.last_update, 1);
            assert_eq!(data.repo_url, "r");
        }
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(matches!(
            parse_data_js("window.BENCHMARK_DATA = nope"),
            Err(HistoryError::Json(_))
        ));
    }

    #[test]
    fn render_uses_prefix_and_two_space_indent() {
        let mut data = DashboardData::new("https://github.com/Nerzal/gocloak");
        append(&mut data, "Benchmark", sample("a", 10), 11, DuplicatePolicy::Reject).unwrap();
        let text = render_data_js(&data).unwrap();
        assert!(text.starts_with("window.BENCHMARK_DATA = {\n  \"lastUpdate\": 11,"));
        assert!(text.contains("\n      {\n        \"commit\": {"));
        assert!(!text.ends_with('\n'));
        assert_eq!(parse_data_js(&text).unwrap(), data);
    }

    #[test]
    fn append_extends_suite_and_bumps_last_update() {
        let mut data = DashboardData::new("r");
        append(&mut data, "Benchmark", sample("a", 10), 100, DuplicatePolicy::Reject).unwrap();
        append(&mut data, "Benchmark", sample("b", 10), 50, DuplicatePolicy::Reject).unwrap();

        let suite = data.suite("Benchmark").unwrap();
        assert_eq!(suite.len(), 2);
        assert_eq!(suite[0].commit.id, "a");
        assert_eq!(suite[1].commit.id, "b");
        assert_eq!(data.last_update, 100);
    }

    #[test]
    fn append_rejects_date_regression() {
        let mut data = DashboardData::new("r");
        append(&mut data, "Benchmark", sample("a", 10), 10, DuplicatePolicy::Reject).unwrap();
        let err = append(&mut data, "Benchmark", sample("b", 9), 11, DuplicatePolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, HistoryError::NonMonotonicDate { date: 9, last: 10, .. }));
        assert_eq!(data.suite("Benchmark").unwrap().len(), 1);
        assert_eq!(data.last_update, 10);
    }

    #[test]
    fn dates_are_per_suite() {
        let mut data = DashboardData::new("r");
        append(&mut data, "Benchmark", sample("a", 10), 10, DuplicatePolicy::Reject).unwrap();
        append(&mut data, "Other", sample("a", 5), 10, DuplicatePolicy::Reject).unwrap();
        assert_eq!(data.entries.len(), 2);
    }

    #[test]
    fn append_rejects_empty_and_malformed_samples() {
        let mut data = DashboardData::new("r");

        let mut empty = sample("a", 1);
        empty.benches.clear();
        assert!(matches!(
            append(&mut data, "Benchmark", empty, 1, DuplicatePolicy::Reject),
            Err(HistoryError::EmptyBenches { .. })
        ));

        assert!(matches!(
            append(&mut data, "Benchmark", sample("  ", 1), 1, DuplicatePolicy::Reject),
            Err(HistoryError::InvalidCommit { .. })
        ));
        assert!(data.entries.is_empty());
    }

    #[test]
    fn append_rejects_non_finite_values_and_file_stays_loadable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.js");

        let mut data = DashboardData::new("r");
        append(&mut data, "Benchmark", sample("a", 1), 1, DuplicatePolicy::Reject).unwrap();
        save(&path, &data).unwrap();

        for value in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let mut bad = sample("b", 2);
            bad.benches[0].value = value;
            let err = append(&mut data, "Benchmark", bad, 2, DuplicatePolicy::Reject).unwrap_err();
            assert!(matches!(err, HistoryError::InvalidValue { .. }), "{err}");
        }
        assert_eq!(data.suite("Benchmark").unwrap().len(), 1);
        assert_eq!(data.last_update, 1);

        save(&path, &data).unwrap();
        assert_eq!(load(&path).unwrap(), data);
    }

    #[test]
    fn save_leaves_no_temp_files_behind() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.js");
        let mut data = DashboardData::new("r");
        append(&mut data, "Benchmark", sample("a", 1), 1, DuplicatePolicy::Reject).unwrap();

        save(&path, &data).unwrap();
        save(&path, &data).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, ["data.js"]);
    }

    #[test]
    fn duplicate_commit_follows_policy() {
        let mut data = DashboardData::new("r");
        append(&mut data, "Benchmark", sample("a", 1), 1, DuplicatePolicy::Reject).unwrap();
        assert!(matches!(
            append(&mut data, "Benchmark", sample("a", 2), 2, DuplicatePolicy::Reject),
            Err(HistoryError::DuplicateCommit { .. })
        ));
        append(&mut data, "Benchmark", sample("a", 2), 2, DuplicatePolicy::Allow).unwrap();
        assert_eq!(data.suite("Benchmark").unwrap().len(), 2);
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dev/bench/data.js");

        let mut data = load_or_init(&path, "https://github.com/Nerzal/gocloak").unwrap();
        assert_eq!(data.sample_count(), 0);
        append(&mut data, "Benchmark", sample("a", 10), 10, DuplicatePolicy::Reject).unwrap();
        save(&path, &data).unwrap();

        let loaded = load_or_init(&path, "ignored").unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = load(dir.path().join("missing.js")).unwrap_err();
        assert!(matches!(err, HistoryError::Io { .. }));
    }
}
