use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

/// Suite key used by the dashboard when a workflow does not name its benchmark.
pub const DEFAULT_SUITE: &str = "Benchmark";

/// Tool identifier for samples extracted from `go test -bench` output.
pub const GO_TOOL: &str = "go";

/// Top-level object assigned to `window.BENCHMARK_DATA`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardData {
    /// Epoch milliseconds of the last append.
    pub last_update: u64,
    pub repo_url: String,
    pub entries: BTreeMap<String, Vec<BenchmarkSample>>,
}

impl DashboardData {
    pub fn new(repo_url: impl Into<String>) -> Self {
        Self {
            last_update: 0,
            repo_url: repo_url.into(),
            entries: BTreeMap::new(),
        }
    }

    pub fn suite(&self, name: &str) -> Option<&[BenchmarkSample]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    pub fn sample_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}

/// One benchmarked commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSample {
    pub commit: Commit,
    /// Epoch milliseconds at measurement time.
    pub date: u64,
    pub tool: String,
    pub benches: Vec<BenchResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub author: Person,
    pub committer: Person,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distinct: Option<bool>,
    pub id: String,
    pub message: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree_id: Option<String>,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub email: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A single named measurement within a sample.
///
/// For Go benchmarks `unit` carries the secondary metrics as well
/// (`"ns/op\t   50342 B/op\t     180 allocs/op"`) and `extra` the run shape
/// (`"13 times\n2 procs"`); see [`crate::unit`] for the structured view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchResult {
    pub name: String,
    #[serde(serialize_with = "serialize_value")]
    pub value: f64,
    /// Spread reported by tools that measure one (e.g. `"± 2%"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<String>,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<String>,
}

// Integral values go out as JSON integers so rewritten files keep the
// dashboard's own number formatting.
fn serialize_value<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0; // 2^53
    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_EXACT {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bench(value: f64) -> BenchResult {
        BenchResult {
            name: "BenchmarkLogin".to_string(),
            value,
            unit: "ns/op".to_string(),
            range: None,
            extra: Some("13 times".to_string()),
        }
    }

    #[test]
    fn integral_values_serialize_without_fraction() {
        let json = serde_json::to_string(&bench(85678248.0)).unwrap();
        assert!(json.contains("\"value\":85678248,"), "{json}");
    }

    #[test]
    fn fractional_values_keep_their_fraction() {
        let json = serde_json::to_string(&bench(0.25)).unwrap();
        assert!(json.contains("\"value\":0.25"), "{json}");
    }

    #[test]
    fn optional_fields_are_omitted() {
        let json = serde_json::to_string(&bench(1.0)).unwrap();
        assert!(!json.contains("range"));

        let person = Person {
            email: "noreply@github.com".to_string(),
            name: "GitHub".to_string(),
            username: None,
        };
        let json = serde_json::to_string(&person).unwrap();
        assert_eq!(json, r#"{"email":"noreply@github.com","name":"GitHub"}"#);
    }

    #[test]
    fn top_level_keys_are_camel_case() {
        let data = DashboardData::new("https://github.com/Nerzal/gocloak");
        let json = serde_json::to_value(&data).unwrap();
        assert_eq!(json["lastUpdate"], 0);
        assert_eq!(json["repoUrl"], "https://github.com/Nerzal/gocloak");
        assert!(json["entries"].as_object().unwrap().is_empty());
    }
}
