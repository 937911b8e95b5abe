//! Document protocol: the message boundary to the live design document.
//!
//! The document is an opaque mutable store reachable only through
//! request/response messages; every mutation is an explicit round-trip. The
//! engine core stays testable by faking this channel, no live document needed.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::changeset::{VariableCreate, VariableUpdate};
use crate::model::{Collection, Variable};
use crate::usage::NodeBinding;

/// Per-request failures at the document boundary. Only a dead channel is
/// fatal; everything else is caught per item by the applier.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("document channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("document request timed out: {0}")]
    Timeout(String),

    #[error("document denied the request: {0}")]
    PermissionDenied(String),

    /// The document processed the request and refused it (bad reference,
    /// concurrent external edit, ...).
    #[error("document rejected the request: {0}")]
    Rejected(String),
}

impl ProtocolError {
    /// Fatal errors abort a whole batch; non-fatal ones are recorded per item.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtocolError::ChannelUnavailable(_))
    }
}

/// Response to `ExtractVariables`: the full current variable and collection
/// snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariableExtract {
    pub variables: Vec<Variable>,
    #[serde(default)]
    pub collections: Vec<Collection>,
}

/// Response to `ScanUsage`: one entry per observed node-to-variable binding,
/// with text-style bindings reported separately.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageScan {
    pub variables: Vec<NodeBinding>,
    #[serde(default)]
    pub text_styles: Vec<NodeBinding>,
}

impl UsageScan {
    /// Variable and style bindings merged for indexing.
    pub fn all_bindings(&self) -> Vec<NodeBinding> {
        self.variables
            .iter()
            .chain(self.text_styles.iter())
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageScope {
    CurrentPage,
    AllPages,
}

/// The asynchronous message channel to the live document. One synchronous
/// actor per operation: callers serialize calls that touch overlapping
/// variables, the channel holds no lock.
#[async_trait]
pub trait DocumentChannel: Send + Sync {
    /// Extract the current variable snapshot. Idempotent read.
    async fn extract_variables(&self) -> Result<VariableExtract, ProtocolError>;

    /// Scan the document for variable/style usage. Idempotent read.
    async fn scan_usage(
        &self,
        query: Option<&str>,
        scope: PageScope,
    ) -> Result<UsageScan, ProtocolError>;

    /// Set one mode value on an existing variable. Never retried.
    async fn update_variable(&self, update: &VariableUpdate) -> Result<(), ProtocolError>;

    /// Create a variable with one initial mode value; returns the new
    /// document-assigned id. Never retried.
    async fn create_variable(&self, create: &VariableCreate) -> Result<String, ProtocolError>;

    /// Highlight nodes in the document. Fire-and-forget: failures are
    /// ignored, nothing depends on the outcome.
    async fn select_nodes(&self, node_ids: &[String]);
}
