//! Reverse usage index: variable identity -> the components and nodes that
//! consume it.
//!
//! Built fresh per analysis session from a document scan and never kept
//! authoritative across document edits. Large scans can be indexed in chunks
//! with progress reporting; a cancelled build is discarded, never reused.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use tracing::warn;

/// Component label for bindings observed on nodes that sit outside any named
/// component. Kept visible but filterable separately.
pub const UNASSIGNED_COMPONENT: &str = "(unassigned)";

/// One node-to-variable (or node-to-style) binding observed by the document
/// scan. Node ids are opaque: the engine only hands them back to the document
/// protocol for selection or mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeBinding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    pub node_ids: Vec<String>,
}

impl NodeBinding {
    fn identity(&self) -> Option<&str> {
        self.variable_id
            .as_deref()
            .or(self.style_id.as_deref())
    }
}

/// Usage of one variable within one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub identity: String,
    pub component_name: String,
    pub node_ids: Vec<String>,
}

/// Reverse map from variable identity to per-component usage entries.
#[derive(Debug, Clone, Default)]
pub struct UsageIndex {
    entries: HashMap<String, Vec<UsageEntry>>,
    binding_count: usize,
}

/// Progress report emitted between chunks of an incremental build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildProgress {
    pub processed: usize,
    pub total: usize,
}

impl UsageIndex {
    /// Build the index from a full document scan. Bindings are grouped by
    /// variable identity, then by component; node-id lists for repeated
    /// (variable, component) pairs merge and de-duplicate instead of
    /// producing duplicate entries.
    pub fn build(bindings: &[NodeBinding]) -> Self {
        let mut index = UsageIndex::default();
        index.absorb(bindings);
        index
    }

    /// Incremental build for large scans: processes `chunk_size` bindings at a
    /// time and reports progress between chunks. When `progress` returns
    /// `false` the build is abandoned and `None` is returned — a partially
    /// built index is discarded, not reused.
    pub fn build_chunked(
        bindings: &[NodeBinding],
        chunk_size: usize,
        mut progress: impl FnMut(BuildProgress) -> bool,
    ) -> Option<Self> {
        let chunk_size = chunk_size.max(1);
        let total = bindings.len();
        let mut index = UsageIndex::default();
        let mut processed = 0;

        for chunk in bindings.chunks(chunk_size) {
            index.absorb(chunk);
            processed += chunk.len();
            if !progress(BuildProgress { processed, total }) {
                return None;
            }
        }

        Some(index)
    }

    fn absorb(&mut self, bindings: &[NodeBinding]) {
        for binding in bindings {
            let Some(identity) = binding.identity() else {
                warn!("skipping scan entry with no variable or style id");
                continue;
            };
            let component = binding
                .component_name
                .clone()
                .unwrap_or_else(|| UNASSIGNED_COMPONENT.to_string());

            let entries = self.entries.entry(identity.to_string()).or_default();
            let slot = match entries.iter().position(|e| e.component_name == component) {
                Some(slot) => slot,
                None => {
                    entries.push(UsageEntry {
                        identity: identity.to_string(),
                        component_name: component,
                        node_ids: Vec::new(),
                    });
                    entries.len() - 1
                }
            };
            let entry = &mut entries[slot];

            for node in &binding.node_ids {
                if !entry.node_ids.contains(node) {
                    entry.node_ids.push(node.clone());
                }
            }
            self.binding_count += 1;
        }
    }

    /// Usage entries for one variable identity, empty when unused.
    pub fn lookup(&self, identity: &str) -> &[UsageEntry] {
        self.entries
            .get(identity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_used(&self, identity: &str) -> bool {
        !self.lookup(identity).is_empty()
    }

    /// Number of distinct variable identities with at least one consumer.
    pub fn variable_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of raw bindings absorbed (before merging).
    pub fn binding_count(&self) -> usize {
        self.binding_count
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(var: &str, component: Option<&str>, nodes: &[&str]) -> NodeBinding {
        NodeBinding {
            variable_id: Some(var.to_string()),
            style_id: None,
            component_name: component.map(str::to_string),
            node_ids: nodes.iter().map(|n| n.to_string()).collect(),
        }
    }

    #[test]
    fn merges_repeated_variable_component_pairs() {
        let index = UsageIndex::build(&[
            binding("v1", Some("Button"), &["n1"]),
            binding("v1", Some("Button"), &["n2"]),
        ]);

        let entries = index.lookup("v1");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].component_name, "Button");
        assert_eq!(entries[0].node_ids, vec!["n1", "n2"]);
    }

    #[test]
    fn deduplicates_node_ids() {
        let index = UsageIndex::build(&[
            binding("v1", Some("Button"), &["n1", "n1"]),
            binding("v1", Some("Button"), &["n1"]),
        ]);
        assert_eq!(index.lookup("v1")[0].node_ids, vec!["n1"]);
    }

    #[test]
    fn unbound_nodes_grouped_under_sentinel() {
        let index = UsageIndex::build(&[binding("v1", None, &["n7"])]);
        let entries = index.lookup("v1");
        assert_eq!(entries[0].component_name, UNASSIGNED_COMPONENT);
    }

    #[test]
    fn style_ids_are_indexable_identities() {
        let b = NodeBinding {
            variable_id: None,
            style_id: Some("S:style1".into()),
            component_name: Some("Heading".into()),
            node_ids: vec!["n1".into()],
        };
        let index = UsageIndex::build(&[b]);
        assert!(index.is_used("S:style1"));
    }

    #[test]
    fn entries_without_identity_are_skipped() {
        let b = NodeBinding {
            variable_id: None,
            style_id: None,
            component_name: Some("Button".into()),
            node_ids: vec!["n1".into()],
        };
        let index = UsageIndex::build(&[b]);
        assert!(index.is_empty());
    }

    #[test]
    fn chunked_build_reports_progress() {
        let bindings: Vec<NodeBinding> = (0..10)
            .map(|i| {
                let node = format!("n{i}");
                binding("v1", Some("Button"), &[node.as_str()])
            })
            .collect();

        let mut reports = Vec::new();
        let index = UsageIndex::build_chunked(&bindings, 4, |p| {
            reports.push(p);
            true
        })
        .expect("not cancelled");

        assert_eq!(
            reports,
            vec![
                BuildProgress { processed: 4, total: 10 },
                BuildProgress { processed: 8, total: 10 },
                BuildProgress { processed: 10, total: 10 },
            ]
        );
        assert_eq!(index.lookup("v1")[0].node_ids.len(), 10);
    }

    #[test]
    fn cancelled_build_discards_partial_index() {
        let bindings: Vec<NodeBinding> = (0..10)
            .map(|i| {
                let node = format!("n{i}");
                binding("v1", Some("Button"), &[node.as_str()])
            })
            .collect();

        let result = UsageIndex::build_chunked(&bindings, 3, |p| p.processed < 3);
        assert!(result.is_none());
    }
}
