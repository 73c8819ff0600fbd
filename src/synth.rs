//! Deterministic synthetic benchmark histories.
//!
//! Produces Go-style samples (ns/op with `-benchmem` pairs, one plain and one
//! `-2` procs run per benchmark) for a fixed list of benchmark names, so
//! benches and tests can work on histories of any size without fixtures.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

use crate::schema::{
    BenchResult, BenchmarkSample, Commit, DashboardData, Person, DEFAULT_SUITE, GO_TOOL,
};
use crate::time::rfc3339_utc;
use crate::unit::{Metric, RunExtra, UnitMetrics, ALLOCS_PER_OP, BYTES_PER_OP};

/// First sample date, 2020-01-14T15:45:19Z in epoch ms.
const BASE_DATE_MS: u64 = 1_579_016_719_734;

/// Configuration for history generation.
#[derive(Debug, Clone)]
pub struct GenerateConfig {
    /// Number of samples (commits) to generate.
    pub count: u64,
    /// Random seed for deterministic generation.
    pub seed: u64,
    pub repo_url: String,
    pub suite: String,
    /// Benchmark function names; each gets a plain and a 2-procs result.
    pub names: Vec<String>,
    /// Spacing between consecutive sample dates.
    pub interval_ms: u64,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            count: 100,
            seed: 42,
            repo_url: "https://github.com/Nerzal/gocloak".to_string(),
            suite: DEFAULT_SUITE.to_string(),
            names: ["Login", "LoginParallel", "GetGroups", "GetGroup", "GetGroupByPath"]
                .iter()
                .map(|n| format!("Benchmark{n}"))
                .collect(),
            interval_ms: 3_600_000,
        }
    }
}

fn per_sample_seed(master_seed: u64, index: u64) -> u64 {
    master_seed
        .wrapping_add(index)
        .wrapping_mul(0x517cc1b727220a95)
}

fn commit_id(rng: &mut ChaCha8Rng) -> String {
    (0..20).map(|_| format!("{:02x}", rng.gen::<u8>())).collect()
}

fn go_result(rng: &mut ChaCha8Rng, name: &str, procs: Option<u32>) -> BenchResult {
    let ns_per_op: u64 = rng.gen_range(60_000_000..75_000_000);
    let iterations = (1_000_000_000 / ns_per_op).max(1);
    let unit = UnitMetrics {
        primary: "ns/op".to_string(),
        secondary: vec![
            Metric {
                value: rng.gen_range(45_000..65_000) as f64,
                unit: BYTES_PER_OP.to_string(),
            },
            Metric {
                value: rng.gen_range(178..186) as f64,
                unit: ALLOCS_PER_OP.to_string(),
            },
        ],
    };

    BenchResult {
        name: name.to_string(),
        value: ns_per_op as f64,
        unit: unit.to_string(),
        range: None,
        extra: Some(RunExtra::render(iterations, procs)),
    }
}

fn generate_sample(config: &GenerateConfig, index: u64) -> BenchmarkSample {
    let mut rng = ChaCha8Rng::seed_from_u64(per_sample_seed(config.seed, index));
    let id = commit_id(&mut rng);
    let tree_id = commit_id(&mut rng);

    let benches = config
        .names
        .iter()
        .flat_map(|name| [(name, None), (name, Some(2))])
        .map(|(name, procs)| go_result(&mut rng, name, procs))
        .collect();

    let author = Person {
        email: "dev@example.com".to_string(),
        name: "dev".to_string(),
        username: Some("dev".to_string()),
    };
    let committer = Person {
        email: "noreply@github.com".to_string(),
        name: "GitHub".to_string(),
        username: Some("web-flow".to_string()),
    };

    let date = BASE_DATE_MS + index * config.interval_ms.max(1);

    BenchmarkSample {
        commit: Commit {
            author,
            committer,
            distinct: Some(true),
            url: format!("{}/commit/{id}", config.repo_url),
            id,
            message: format!("Merge pull request #{}", index + 1),
            timestamp: rfc3339_utc(date),
            tree_id: Some(tree_id),
        },
        date,
        tool: GO_TOOL.to_string(),
        benches,
    }
}

/// Generate a history of `config.count` samples with strictly increasing dates.
pub fn generate(config: &GenerateConfig) -> DashboardData {
    // Index-derived seeds keep the output independent of thread scheduling.
    let samples: Vec<BenchmarkSample> = (0..config.count)
        .into_par_iter()
        .map(|i| generate_sample(config, i))
        .collect();

    let mut data = DashboardData::new(config.repo_url.clone());
    data.last_update = samples.last().map_or(0, |s| s.date);
    data.entries.insert(config.suite.clone(), samples);
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_deterministic() {
        let config = GenerateConfig {
            count: 20,
            seed: 42,
            ..Default::default()
        };
        assert_eq!(generate(&config), generate(&config));

        let other = GenerateConfig {
            seed: 43,
            ..config.clone()
        };
        assert_ne!(generate(&config), generate(&other));
    }

    #[test]
    fn test_dates_strictly_increase() {
        let data = generate(&GenerateConfig {
            count: 10,
            ..Default::default()
        });
        let suite = data.suite(DEFAULT_SUITE).unwrap();
        assert_eq!(suite.len(), 10);
        assert!(suite.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(data.last_update, suite[9].date);
    }

    #[test]
    fn test_results_look_like_go_output() {
        let data = generate(&GenerateConfig {
            count: 1,
            ..Default::default()
        });
        let sample = &data.suite(DEFAULT_SUITE).unwrap()[0];
        assert_eq!(sample.benches.len(), 10);
        assert_eq!(sample.commit.id.len(), 40);

        let plain = &sample.benches[0];
        let parallel = &sample.benches[1];
        assert_eq!(plain.name, "BenchmarkLogin");
        assert_eq!(parallel.name, "BenchmarkLogin");
        assert!(parallel.extra.as_deref().unwrap().ends_with("\n2 procs"));

        let unit = UnitMetrics::parse(&plain.unit).unwrap();
        assert_eq!(unit.primary, "ns/op");
        assert!(unit.bytes_per_op().is_some());
        assert!(unit.allocs_per_op().is_some());
    }

    #[test]
    fn test_empty_history() {
        let data = generate(&GenerateConfig {
            count: 0,
            ..Default::default()
        });
        assert_eq!(data.sample_count(), 0);
        assert_eq!(data.last_update, 0);
    }
}
