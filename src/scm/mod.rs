//! Source-control collaborator: baseline fetch and pull-request export.
//!
//! The engine only consumes this seam — fetch the committed baseline for a
//! branch/path, and push a new baseline plus a generated human-readable
//! summary as a branch + commit + pull request.

pub mod github;
pub mod summary;

use async_trait::async_trait;

use anyhow::Result;

pub use github::GitHubClient;
pub use summary::render_summary;

/// What to commit and open a PR for.
#[derive(Debug, Clone)]
pub struct PullRequestSpec {
    pub base_branch: String,
    pub head_branch: String,
    /// Repository path of the baseline file.
    pub path: String,
    /// New baseline content (the serialized variable array).
    pub content: String,
    pub title: String,
    /// Generated summary (counts, per-mode breakdown, component impact).
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestInfo {
    pub number: u64,
    pub url: String,
}

#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Fetch the baseline file content at a branch/path. `None` when the file
    /// does not exist yet. Idempotent; implementations retry with fixed
    /// backoff.
    async fn fetch_baseline(&self, branch: &str, path: &str) -> Result<Option<String>>;

    /// Create branch + commit + pull request carrying the new baseline.
    /// Mutating; never retried.
    async fn create_pull_request(&self, spec: &PullRequestSpec) -> Result<PullRequestInfo>;
}
