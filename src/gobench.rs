//! Extraction of benchmark results from `go test -bench` output.
//!
//! A result line looks like
//!
//! ```text
//! BenchmarkLoginParallel-2   	      24	  55681570 ns/op	   53137 B/op	     181 allocs/op
//! ```
//!
//! i.e. name (with an optional `-<GOMAXPROCS>` suffix), iteration count, the
//! primary value and its unit, followed by any `-benchmem` pairs. Everything
//! after the primary value is kept verbatim as the result's `unit`.

use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, trace};

use crate::schema::BenchResult;
use crate::unit::RunExtra;

fn line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(Benchmark\w+[\w()$%^&*=|,\[\]{}#/.-]*?)(-\d+)?\s+(\d+)\s+([0-9.eE+-]+)\s+(.+)$")
            .unwrap_or_else(|e| panic!("benchmark line regex is invalid: {e}"))
    })
}

/// Parse every benchmark result line in `output`; other lines are skipped.
pub fn parse(output: &str) -> Vec<BenchResult> {
    let re = line_regex();
    let mut results = Vec::new();

    for line in output.lines().map(str::trim_end) {
        let Some(caps) = re.captures(line) else {
            trace!(line, "skipping non-benchmark line");
            continue;
        };

        let value = match caps[4].parse::<f64>() {
            Ok(v) if v.is_finite() => v,
            _ => {
                debug!(line, "benchmark line has a non-numeric or non-finite value");
                continue;
            }
        };
        let Ok(iterations) = caps[3].parse::<u64>() else {
            debug!(line, "benchmark line has an out-of-range iteration count");
            continue;
        };
        let procs = caps
            .get(2)
            .and_then(|m| m.as_str().trim_start_matches('-').parse::<u32>().ok());

        results.push(BenchResult {
            name: caps[1].to_string(),
            value,
            unit: caps[5].to_string(),
            range: None,
            extra: Some(RunExtra::render(iterations, procs)),
        });
    }

    debug!(count = results.len(), "extracted go benchmark results");
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = "goos: linux
goarch: amd64
pkg: github.com/Nerzal/gocloak/v4
BenchmarkLogin         \t      13\t  85678248 ns/op\t   50342 B/op\t     180 allocs/op
BenchmarkLogin-2       \t      13\t  87302865 ns/op\t   61936 B/op\t     183 allocs/op
BenchmarkLoginParallel \t      12\t  86714791 ns/op\t   47099 B/op\t     182 allocs/op
BenchmarkLoginParallel-2\t      24\t  55681570 ns/op\t   53137 B/op\t     181 allocs/op
PASS
ok  \tgithub.com/Nerzal/gocloak/v4\t9.391s
";

    #[test]
    fn extracts_results_in_order() {
        let results = parse(OUTPUT);
        let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "BenchmarkLogin",
                "BenchmarkLogin",
                "BenchmarkLoginParallel",
                "BenchmarkLoginParallel"
            ]
        );
    }

    #[test]
    fn strips_procs_suffix_into_extra() {
        let results = parse(OUTPUT);
        assert_eq!(results[0].extra.as_deref(), Some("13 times"));
        assert_eq!(results[1].extra.as_deref(), Some("13 times\n2 procs"));
        assert_eq!(results[3].extra.as_deref(), Some("24 times\n2 procs"));
    }

    #[test]
    fn keeps_unit_remainder_verbatim() {
        let results = parse(OUTPUT);
        assert_eq!(results[3].value, 55681570.0);
        assert_eq!(results[3].unit, "ns/op\t   53137 B/op\t     181 allocs/op");
    }

    #[test]
    fn fractional_values_and_plain_units() {
        let results = parse("BenchmarkGetGroup-8   \t 1000000\t      1052.5 ns/op\n");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].value, 1052.5);
        assert_eq!(results[0].unit, "ns/op");
        assert_eq!(results[0].extra.as_deref(), Some("1000000 times\n8 procs"));
    }

    #[test]
    fn sub_benchmark_names_are_kept() {
        let results = parse("BenchmarkGetGroupByPath/nested-4 \t 100\t 2000 ns/op\n");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "BenchmarkGetGroupByPath/nested");
    }

    #[test]
    fn non_finite_values_are_skipped() {
        let output = "BenchmarkLogin-2 \t 13\t 1e999 ns/op\nBenchmarkGetGroup \t 10\t 5 ns/op\n";
        let results = parse(output);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].name, "BenchmarkGetGroup");
    }

    #[test]
    fn output_without_benchmarks_is_empty() {
        assert!(parse("PASS\nok  \tpkg\t0.01s\n").is_empty());
        assert!(parse("").is_empty());
    }
}
