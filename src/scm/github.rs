//! GitHub-backed source-control collaborator: contents API for baseline
//! fetches, git-refs + contents + pulls APIs for the PR flow.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{header, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use super::{PullRequestInfo, PullRequestSpec, SourceControl};
use crate::error::{with_retry, RetryPolicy};

const DEFAULT_API: &str = "https://api.github.com";

pub struct GitHubClient {
    http: reqwest::Client,
    base: Url,
    /// `owner/name`.
    repo: String,
}

#[derive(Debug, Deserialize)]
struct RefObject {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    object: RefObject,
}

#[derive(Debug, Deserialize)]
struct ContentMeta {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct PullResponse {
    number: u64,
    html_url: String,
}

impl GitHubClient {
    pub fn new(repo: impl Into<String>, token: &str) -> Result<Self> {
        Self::with_base(DEFAULT_API, repo, token)
    }

    pub fn with_base(base: &str, repo: impl Into<String>, token: &str) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let mut auth = header::HeaderValue::from_str(&format!("Bearer {token}"))
            .context("invalid source-control token")?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );

        let http = reqwest::Client::builder()
            .user_agent(concat!("varforge/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .context("failed to build source-control client")?;

        Ok(Self {
            http,
            base: Url::parse(base).context("invalid source-control API base url")?,
            repo: repo.into(),
        })
    }

    fn api(&self, path: &str) -> Result<Url> {
        self.base
            .join(&format!("repos/{}/{}", self.repo, path))
            .with_context(|| format!("bad API path {path}"))
    }

    /// File blob sha on a branch, needed to update an existing file through
    /// the contents API. `None` when the file is absent.
    async fn content_sha(&self, branch: &str, path: &str) -> Result<Option<String>> {
        let url = self.api(&format!("contents/{path}"))?;
        let response = self
            .http
            .get(url)
            .query(&[("ref", branch)])
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let meta: ContentMeta = response.error_for_status()?.json().await?;
        Ok(Some(meta.sha))
    }

    async fn branch_sha(&self, branch: &str) -> Result<String> {
        let url = self.api(&format!("git/ref/heads/{branch}"))?;
        let git_ref: GitRef = self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(git_ref.object.sha)
    }
}

#[async_trait]
impl SourceControl for GitHubClient {
    async fn fetch_baseline(&self, branch: &str, path: &str) -> Result<Option<String>> {
        let url = self.api(&format!("contents/{path}"))?;
        let policy = RetryPolicy::default();

        with_retry(&policy, || {
            let url = url.clone();
            async move {
                let response = self
                    .http
                    .get(url)
                    .query(&[("ref", branch)])
                    .header(header::ACCEPT, "application/vnd.github.raw+json")
                    .send()
                    .await
                    .map_err(|e| anyhow!("baseline fetch failed: {e}"))?;

                if response.status() == StatusCode::NOT_FOUND {
                    return Ok::<_, anyhow::Error>(None);
                }
                let content = response
                    .error_for_status()
                    .map_err(|e| anyhow!("baseline fetch failed: {e}"))?
                    .text()
                    .await
                    .map_err(|e| anyhow!("baseline fetch failed: {e}"))?;
                Ok(Some(content))
            }
        })
        .await
    }

    async fn create_pull_request(&self, spec: &PullRequestSpec) -> Result<PullRequestInfo> {
        // Branch off the base ref. No retries from here on: a re-sent
        // mutation after an ambiguous failure could double-create.
        let base_sha = self.branch_sha(&spec.base_branch).await.with_context(|| {
            format!("failed to resolve base branch {}", spec.base_branch)
        })?;
        debug!(base = %spec.base_branch, sha = %base_sha, "resolved base branch");

        let refs_url = self.api("git/refs")?;
        self.http
            .post(refs_url)
            .json(&serde_json::json!({
                "ref": format!("refs/heads/{}", spec.head_branch),
                "sha": base_sha,
            }))
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("failed to create branch {}", spec.head_branch))?;

        // Commit the new baseline onto the head branch.
        let existing_sha = self.content_sha(&spec.base_branch, &spec.path).await?;
        let contents_url = self.api(&format!("contents/{}", spec.path))?;
        let mut commit = serde_json::json!({
            "message": spec.title,
            "content": BASE64.encode(&spec.content),
            "branch": spec.head_branch,
        });
        if let Some(sha) = existing_sha {
            commit["sha"] = serde_json::Value::String(sha);
        }
        self.http
            .put(contents_url)
            .json(&commit)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("failed to commit baseline to {}", spec.head_branch))?;

        let pulls_url = self.api("pulls")?;
        let pull: PullResponse = self
            .http
            .post(pulls_url)
            .json(&serde_json::json!({
                "title": spec.title,
                "body": spec.body,
                "head": spec.head_branch,
                "base": spec.base_branch,
            }))
            .send()
            .await?
            .error_for_status()
            .context("failed to open pull request")?
            .json()
            .await?;

        info!(number = pull.number, url = %pull.html_url, "opened pull request");
        Ok(PullRequestInfo {
            number: pull.number,
            url: pull.html_url,
        })
    }
}
