//! HTTP bridge implementation of the document channel.
//!
//! Design documents are reached through a local plugin bridge that exposes the
//! protocol as plain JSON endpoints. Connection-level failures map to the
//! fatal `ChannelUnavailable`; everything else stays per-request.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{DocumentChannel, PageScope, ProtocolError, UsageScan, VariableExtract};
use crate::changeset::{VariableCreate, VariableUpdate};

pub struct HttpDocumentChannel {
    http: reqwest::Client,
    base: Url,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
}

impl HttpDocumentChannel {
    pub fn new(base: Url) -> Self {
        Self {
            http: reqwest::Client::new(),
            base,
        }
    }

    pub fn connect(endpoint: &str) -> anyhow::Result<Self> {
        let base = Url::parse(endpoint)?;
        Ok(Self::new(base))
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProtocolError> {
        self.base
            .join(path)
            .map_err(|e| ProtocolError::Rejected(format!("bad endpoint path {path}: {e}")))
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ProtocolError> {
        match response.status() {
            s if s.is_success() => Ok(response),
            StatusCode::FORBIDDEN | StatusCode::UNAUTHORIZED => Err(
                ProtocolError::PermissionDenied(body_or_status(response).await),
            ),
            _ => Err(ProtocolError::Rejected(body_or_status(response).await)),
        }
    }
}

fn transport_error(e: reqwest::Error) -> ProtocolError {
    if e.is_timeout() {
        ProtocolError::Timeout(e.to_string())
    } else if e.is_connect() {
        ProtocolError::ChannelUnavailable(e.to_string())
    } else {
        ProtocolError::Rejected(e.to_string())
    }
}

async fn body_or_status(response: reqwest::Response) -> String {
    let status = response.status();
    match response.text().await {
        Ok(body) if !body.is_empty() => format!("{status}: {body}"),
        _ => status.to_string(),
    }
}

#[async_trait]
impl DocumentChannel for HttpDocumentChannel {
    async fn extract_variables(&self) -> Result<VariableExtract, ProtocolError> {
        let url = self.endpoint("variables")?;
        debug!(%url, "extracting variables");
        let response = self.http.get(url).send().await.map_err(transport_error)?;
        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ProtocolError::Rejected(format!("malformed extract response: {e}")))
    }

    async fn scan_usage(
        &self,
        query: Option<&str>,
        scope: PageScope,
    ) -> Result<UsageScan, ProtocolError> {
        let url = self.endpoint("scan")?;
        let body = serde_json::json!({ "query": query, "scope": scope });
        let response = self
            .http
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ProtocolError::Rejected(format!("malformed scan response: {e}")))
    }

    async fn update_variable(&self, update: &VariableUpdate) -> Result<(), ProtocolError> {
        let url = self.endpoint("variables/update")?;
        let response = self
            .http
            .post(url)
            .json(update)
            .send()
            .await
            .map_err(transport_error)?;
        Self::check(response).await.map(|_| ())
    }

    async fn create_variable(&self, create: &VariableCreate) -> Result<String, ProtocolError> {
        let url = self.endpoint("variables/create")?;
        let response = self
            .http
            .post(url)
            .json(create)
            .send()
            .await
            .map_err(transport_error)?;
        let created: CreateResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| ProtocolError::Rejected(format!("malformed create response: {e}")))?;
        Ok(created.id)
    }

    async fn select_nodes(&self, node_ids: &[String]) {
        let Ok(url) = self.endpoint("select") else {
            return;
        };
        let body = serde_json::json!({ "node_ids": node_ids });
        // Fire-and-forget: highlighting is best effort.
        let _ = self.http.post(url).json(&body).send().await;
    }
}
