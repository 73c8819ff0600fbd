//! Runtime configuration: logging setup and commit metadata resolution.
//!
//! Commit metadata for a new sample comes, in order of preference, from a
//! JSON `Commit` object (as found in a CI event payload), from explicit
//! values, and finally from the CI environment (`GITHUB_SHA`, `GIT_SHA`,
//! `GITHUB_REPOSITORY`, `GITHUB_SERVER_URL`, `GITHUB_ACTOR`).

use std::fs;
use std::path::PathBuf;

use clap::ValueEnum;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{HistoryError, Result};
use crate::schema::{Commit, Person};
use crate::time::rfc3339_utc;

const DEFAULT_SERVER_URL: &str = "https://github.com";

#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    Pretty,
    /// One JSON object per event.
    Json,
    /// Single-line human-readable output.
    #[default]
    Compact,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
        }
    }
}

/// Install the global tracing subscriber. Logs go to stderr so reports
/// printed on stdout stay machine-readable.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }
    Ok(())
}

/// Partially specified commit metadata.
#[derive(Clone, Debug, Default)]
pub struct CommitSource {
    pub commit_json: Option<PathBuf>,
    pub id: Option<String>,
    pub message: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub timestamp: Option<String>,
    pub url: Option<String>,
}

impl CommitSource {
    /// Resolve against the process environment.
    pub fn resolve(&self, repo_url: &str, now_ms: u64) -> Result<Commit> {
        self.resolve_with(repo_url, now_ms, |key| std::env::var(key).ok())
    }

    pub fn resolve_with(
        &self,
        repo_url: &str,
        now_ms: u64,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Commit> {
        if let Some(path) = &self.commit_json {
            let text = fs::read_to_string(path).map_err(|e| HistoryError::io(path, e))?;
            return Ok(serde_json::from_str(&text)?);
        }

        let id = self
            .id
            .clone()
            .or_else(|| env("GITHUB_SHA"))
            .or_else(|| env("GIT_SHA"))
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| HistoryError::InvalidCommit {
                reason: "no commit id given and neither GITHUB_SHA nor GIT_SHA is set"
                    .to_string(),
            })?;

        let actor = env("GITHUB_ACTOR");
        let author_name = self
            .author_name
            .clone()
            .or_else(|| actor.clone())
            .unwrap_or_else(|| "unknown".to_string());
        let author = Person {
            email: self.author_email.clone().unwrap_or_default(),
            name: author_name,
            username: actor,
        };

        let repo_url = if repo_url.is_empty() {
            env_repo_url(&env).unwrap_or_default()
        } else {
            repo_url.trim_end_matches('/').to_string()
        };

        Ok(Commit {
            committer: author.clone(),
            author,
            distinct: None,
            url: self
                .url
                .clone()
                .unwrap_or_else(|| format!("{repo_url}/commit/{id}")),
            message: self.message.clone().unwrap_or_default(),
            timestamp: self
                .timestamp
                .clone()
                .unwrap_or_else(|| rfc3339_utc(now_ms)),
            tree_id: None,
            id,
        })
    }
}

/// `https://github.com/<owner>/<repo>` from the CI environment, if present.
pub fn env_repo_url(env: &impl Fn(&str) -> Option<String>) -> Option<String> {
    let repository = env("GITHUB_REPOSITORY")?;
    let server = env("GITHUB_SERVER_URL").unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
    Some(format!("{}/{repository}", server.trim_end_matches('/')))
}
