//! Baseline snapshot files: a JSON array of variable records, one file per
//! tracked branch/path.
//!
//! Loading is tolerant: records that fail to parse are dropped with a warning
//! so diffs stay best-effort over whatever parsed successfully. Comparison is
//! structural, never byte-for-byte — formatting differences between writers do
//! not count as changes.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::warn;

use crate::diff::diff;
use crate::model::Variable;

/// A parsed baseline plus the warnings its loading produced.
#[derive(Debug, Clone, Default)]
pub struct LoadedBaseline {
    pub variables: Vec<Variable>,
    pub warnings: Vec<String>,
}

/// Metadata stamped when a snapshot is saved; logged and surfaced to the
/// operator, not embedded in the file (the file format is the bare array).
#[derive(Debug, Clone)]
pub struct SnapshotMeta {
    pub saved_at: DateTime<Utc>,
    pub digest: String,
    pub variable_count: usize,
}

/// Parse baseline content. The top level must be a JSON array — there is
/// nothing to salvage otherwise; individual records that fail to parse are
/// dropped with a warning naming their index.
pub fn parse(content: &str) -> Result<LoadedBaseline> {
    let records: Vec<serde_json::Value> =
        serde_json::from_str(content).context("baseline is not a JSON array")?;

    let mut variables = Vec::with_capacity(records.len());
    let mut warnings = Vec::new();

    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<Variable>(record) {
            Ok(var) => variables.push(var),
            Err(e) => {
                let message = format!("dropped malformed baseline record #{index}: {e}");
                warn!("{message}");
                warnings.push(message);
            }
        }
    }

    Ok(LoadedBaseline {
        variables,
        warnings,
    })
}

pub async fn load(path: &Path) -> Result<LoadedBaseline> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read baseline {}", path.display()))?;
    parse(&content).with_context(|| format!("failed to parse baseline {}", path.display()))
}

/// Serialize a snapshot to the baseline format.
pub fn render(variables: &[Variable]) -> Result<String> {
    serde_json::to_string_pretty(variables).context("failed to serialize baseline")
}

pub async fn save(path: &Path, variables: &[Variable]) -> Result<SnapshotMeta> {
    let content = render(variables)?;
    tokio::fs::write(path, &content)
        .await
        .with_context(|| format!("failed to write baseline {}", path.display()))?;

    Ok(SnapshotMeta {
        saved_at: Utc::now(),
        digest: digest(variables)?,
        variable_count: variables.len(),
    })
}

/// Content digest over the canonical serialization, for change detection in
/// commit messages and logs.
pub fn digest(variables: &[Variable]) -> Result<String> {
    let canonical = serde_json::to_vec(variables).context("failed to serialize baseline")?;
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    Ok(hex::encode(hasher.finalize()))
}

/// Structural equality of two snapshots: equal iff their diff is empty.
pub fn structurally_equal(a: &[Variable], b: &[Variable]) -> bool {
    diff(a, b).is_empty()
}
