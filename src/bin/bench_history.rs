use anyhow::{bail, Context};
use bench_history::compare::{self, DEFAULT_ALERT_THRESHOLD};
use bench_history::config::{self, CommitSource, LogFormat, LoggingConfig};
use bench_history::schema::{BenchmarkSample, DEFAULT_SUITE, GO_TOOL};
use bench_history::series::{self, Series};
use bench_history::snapshots;
use bench_history::store::{self, DuplicatePolicy};
use bench_history::synth::{self, GenerateConfig};
use bench_history::time::{current_time_millis, rfc3339_utc};
use bench_history::{gobench, validate};
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

#[derive(ClapArgs, Debug)]
struct CommitArgs {
    /// JSON file holding the full commit object (e.g. from the CI event payload).
    #[arg(long, value_name = "FILE")]
    commit_json: Option<PathBuf>,

    /// Commit hash; defaults to $GITHUB_SHA or $GIT_SHA.
    #[arg(long)]
    commit_id: Option<String>,

    #[arg(long)]
    message: Option<String>,

    /// Defaults to $GITHUB_ACTOR.
    #[arg(long)]
    author_name: Option<String>,

    #[arg(long)]
    author_email: Option<String>,

    /// Commit timestamp (RFC 3339); defaults to the sample date.
    #[arg(long)]
    timestamp: Option<String>,

    /// Defaults to `<repo-url>/commit/<id>`.
    #[arg(long)]
    commit_url: Option<String>,
}

impl From<&CommitArgs> for CommitSource {
    fn from(a: &CommitArgs) -> Self {
        CommitSource {
            commit_json: a.commit_json.clone(),
            id: a.commit_id.clone(),
            message: a.message.clone(),
            author_name: a.author_name.clone(),
            author_email: a.author_email.clone(),
            timestamp: a.timestamp.clone(),
            url: a.commit_url.clone(),
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract benchmark results from `go test -bench` output (JSON array).
    Parse {
        /// Go test output; `-` reads stdin.
        #[arg(short, long, value_name = "FILE", default_value = "-")]
        input: PathBuf,
    },

    /// Append one sample, built from Go test output, to a data file.
    Append {
        /// Data file (`dev/bench/data.js`); created if missing.
        #[arg(long, value_name = "FILE")]
        data: PathBuf,

        /// Go test output; `-` reads stdin.
        #[arg(short, long, value_name = "FILE", default_value = "-")]
        input: PathBuf,

        #[arg(long, default_value = DEFAULT_SUITE)]
        suite: String,

        #[arg(long, default_value = GO_TOOL)]
        tool: String,

        /// Repository URL recorded in a new data file; defaults to the CI repository.
        #[arg(long)]
        repo_url: Option<String>,

        /// Sample date in epoch milliseconds; defaults to now.
        #[arg(long)]
        date: Option<u64>,

        /// Allow re-appending the commit that is already the newest sample.
        #[arg(long, default_value_t = false)]
        allow_duplicate: bool,

        #[command(flatten)]
        commit: CommitArgs,
    },

    /// Check the structural invariants of a data file.
    Validate {
        #[arg(long, value_name = "FILE")]
        data: PathBuf,
    },

    /// Check that every snapshot in a directory extends the previous one.
    CheckSnapshots {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
    },

    /// Per-benchmark time series of a suite.
    Series {
        #[arg(long, value_name = "FILE")]
        data: PathBuf,

        #[arg(long, default_value = DEFAULT_SUITE)]
        suite: String,

        /// Only series whose benchmark name matches exactly.
        #[arg(long)]
        name: Option<String>,
    },

    /// Compare the newest sample with the previous one.
    Compare {
        #[arg(long, value_name = "FILE")]
        data: PathBuf,

        #[arg(long, default_value = DEFAULT_SUITE)]
        suite: String,

        /// Ratio (worse / better) above which a bench is a regression.
        #[arg(long, default_value_t = DEFAULT_ALERT_THRESHOLD)]
        threshold: f64,

        /// Exit non-zero when any regression is found.
        #[arg(long, default_value_t = false)]
        fail_on_alert: bool,
    },

    /// Write a deterministic synthetic history.
    Generate {
        #[arg(long, short = 'n', default_value_t = 100)]
        count: u64,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        #[arg(long, short = 'o', value_name = "FILE")]
        output: PathBuf,

        #[arg(long, default_value = DEFAULT_SUITE)]
        suite: String,
    },

    /// Show a short summary of a data file.
    Info {
        #[arg(long, value_name = "FILE")]
        data: PathBuf,
    },
}

#[derive(Parser, Debug)]
#[command(name = "bench-history")]
#[command(about = "Maintain append-only benchmark history files (JSON output)")]
struct Args {
    /// Where to write the JSON report. If omitted, prints to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Compact, global = true)]
    log_format: LogFormat,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    cmd: Command,
}

fn read_input(path: &Path) -> anyhow::Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("reading go test output from stdin")?;
        Ok(buf)
    } else {
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    }
}

fn emit<T: Serialize>(out: Option<&Path>, value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    if let Some(out) = out {
        fs::write(out, json).with_context(|| format!("writing {}", out.display()))?;
    } else {
        println!("{json}");
    }
    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    config::init_logging(&LoggingConfig {
        level: args.log_level.clone(),
        format: args.log_format,
    })?;
    let out = args.out.as_deref();

    match &args.cmd {
        Command::Parse { input } => {
            let results = gobench::parse(&read_input(input)?);
            emit(out, &results)?;
        }
        Command::Append {
            data,
            input,
            suite,
            tool,
            repo_url,
            date,
            allow_duplicate,
            commit,
        } => {
            let benches = gobench::parse(&read_input(input)?);
            let now = current_time_millis();
            let date = date.unwrap_or(now);

            let repo_url = repo_url
                .clone()
                .or_else(|| config::env_repo_url(&|k: &str| std::env::var(k).ok()))
                .unwrap_or_default();
            let mut history = store::load_or_init(data, &repo_url)
                .with_context(|| format!("loading {}", data.display()))?;
            let before = history.clone();

            let commit = CommitSource::from(commit).resolve(&history.repo_url, date)?;
            let sample = BenchmarkSample {
                commit,
                date,
                tool: tool.clone(),
                benches,
            };
            let policy = if *allow_duplicate {
                DuplicatePolicy::Allow
            } else {
                DuplicatePolicy::Reject
            };

            store::append(&mut history, suite, sample, now.max(date), policy)?;
            snapshots::ensure_extends("previous data", &before, "updated data", &history)?;
            store::save(data, &history)?;

            let report = validate::validate(&history);
            emit(out, &report)?;
        }
        Command::Validate { data } => {
            let history = store::load(data)?;
            let report = validate::validate(&history);
            emit(out, &report)?;
            if !report.is_ok() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::CheckSnapshots { dir } => {
            if !dir.is_dir() {
                bail!("{} is not a directory", dir.display());
            }
            let report = snapshots::check_dir(dir)?;
            emit(out, &report)?;
            if !report.is_ok() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Series { data, suite, name } => {
            let history = store::load(data)?;
            let all: Vec<Series> = series::extract(&history, suite)?
                .into_iter()
                .filter(|s| name.as_ref().map_or(true, |n| &s.key.name == n))
                .collect();
            emit(out, &all)?;
        }
        Command::Compare {
            data,
            suite,
            threshold,
            fail_on_alert,
        } => {
            let history = store::load(data)?;
            match compare::compare_latest(&history, suite, *threshold)? {
                Some(report) => {
                    emit(out, &report)?;
                    if *fail_on_alert && report.has_regressions() {
                        return Ok(ExitCode::FAILURE);
                    }
                }
                None => {
                    info!(suite = %suite, "fewer than two samples, nothing to compare");
                    emit(out, &serde_json::Value::Null)?;
                }
            }
        }
        Command::Generate {
            count,
            seed,
            output,
            suite,
        } => {
            let gen_config = GenerateConfig {
                count: *count,
                seed: *seed,
                suite: suite.clone(),
                ..Default::default()
            };
            let history = synth::generate(&gen_config);
            store::save(output, &history)?;

            let file_size = fs::metadata(output)?.len();
            eprintln!("History saved: {}", output.display());
            eprintln!("  Samples: {}", count);
            eprintln!("  Seed: {}", seed);
            eprintln!("  File size: {:.2} MB", file_size as f64 / 1_048_576.0);

            // Skip normal JSON report for generate
            return Ok(ExitCode::SUCCESS);
        }
        Command::Info { data } => {
            let history = store::load(data)?;
            eprintln!("Data file: {}", data.display());
            eprintln!("  Repository: {}", history.repo_url);
            eprintln!("  Last update: {}", rfc3339_utc(history.last_update));
            for (suite, samples) in &history.entries {
                eprintln!("  Suite {suite:?}: {} samples", samples.len());
                if let (Some(first), Some(last)) = (samples.first(), samples.last()) {
                    eprintln!(
                        "    {} .. {}",
                        rfc3339_utc(first.date),
                        rfc3339_utc(last.date)
                    );
                    eprintln!("    Latest commit: {}", last.commit.id);
                }
            }

            let file_size = fs::metadata(data)?.len();
            eprintln!("  File size: {:.2} KB", file_size as f64 / 1024.0);

            // Skip normal JSON report
            return Ok(ExitCode::SUCCESS);
        }
    }

    Ok(ExitCode::SUCCESS)
}
