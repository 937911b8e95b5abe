//! AI collaborator seam: a natural-language request plus a variable/usage
//! summary goes out, a list of proposed edits comes back.
//!
//! Proposals are untrusted. Nothing from this module reaches the document
//! until it has passed `changeset::build_change_set` validation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use anyhow::Result;

use crate::changeset::ProposedEdit;
use crate::model::{Collection, Variable, VariableType};
use crate::usage::UsageIndex;

/// The design-system summary handed to a proposer as analysis context.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DesignContext {
    pub collections: Vec<CollectionSummary>,
    pub variables: Vec<VariableSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub id: String,
    pub name: String,
    pub modes: Vec<String>,
    pub variable_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    pub collection_name: String,
    /// Components consuming this variable, per the usage index.
    pub used_by: Vec<String>,
}

/// External proposer of candidate edits. Optional collaborator; the engine
/// works without one.
#[async_trait]
pub trait EditProposer: Send + Sync {
    async fn propose(&self, request: &str, context: &DesignContext)
        -> Result<Vec<ProposedEdit>>;
}

/// Build the summary context from a snapshot and a usage index.
pub fn build_context(
    variables: &[Variable],
    collections: &[Collection],
    index: &UsageIndex,
) -> DesignContext {
    let collection_summaries = collections
        .iter()
        .map(|c| CollectionSummary {
            id: c.id.clone(),
            name: c.name.clone(),
            modes: c.modes.iter().map(|m| m.name.clone()).collect(),
            variable_count: variables
                .iter()
                .filter(|v| v.collection_id == c.id)
                .count(),
        })
        .collect();

    let variable_summaries = variables
        .iter()
        .map(|v| {
            let mut used_by: Vec<String> = index
                .lookup(&v.identity_key())
                .iter()
                .map(|entry| entry.component_name.clone())
                .collect();
            used_by.sort();
            used_by.dedup();
            VariableSummary {
                id: v.id.clone(),
                name: v.name.clone(),
                var_type: v.var_type,
                collection_name: v.collection_name.clone(),
                used_by,
            }
        })
        .collect();

    DesignContext {
        collections: collection_summaries,
        variables: variable_summaries,
    }
}

/// Tolerant parse of a raw proposal payload (a JSON array of edits). Records
/// that do not parse are dropped with a warning instead of failing the batch —
/// proposer output quality is not something the engine can rely on.
pub fn parse_proposals(raw: &str) -> Result<(Vec<ProposedEdit>, Vec<String>)> {
    let records: Vec<serde_json::Value> =
        serde_json::from_str(raw).map_err(|e| anyhow::anyhow!("proposal is not a JSON array: {e}"))?;

    let mut edits = Vec::with_capacity(records.len());
    let mut warnings = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<ProposedEdit>(record) {
            Ok(edit) => edits.push(edit),
            Err(e) => warnings.push(format!("dropped malformed proposed edit #{index}: {e}")),
        }
    }

    Ok((edits, warnings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Mode, Value};
    use crate::usage::NodeBinding;
    use std::collections::BTreeMap;

    #[test]
    fn context_links_usage_to_variables() {
        let variables = vec![Variable {
            id: Some("v1".into()),
            name: "surface".into(),
            var_type: VariableType::Color,
            collection_id: "c1".into(),
            collection_name: "Primitives".into(),
            values_by_mode: BTreeMap::from([(
                "light".to_string(),
                Value::color_hex("#000000").unwrap(),
            )]),
        }];
        let collections = vec![Collection {
            id: "c1".into(),
            name: "Primitives".into(),
            modes: vec![Mode { mode_id: "light".into(), name: "Light".into() }],
        }];
        let index = UsageIndex::build(&[
            NodeBinding {
                variable_id: Some("v1".into()),
                style_id: None,
                component_name: Some("Button".into()),
                node_ids: vec!["n1".into()],
            },
            NodeBinding {
                variable_id: Some("v1".into()),
                style_id: None,
                component_name: Some("Card".into()),
                node_ids: vec!["n2".into()],
            },
        ]);

        let context = build_context(&variables, &collections, &index);
        assert_eq!(context.collections[0].variable_count, 1);
        assert_eq!(context.variables[0].used_by, vec!["Button", "Card"]);
    }

    struct CannedProposer(Vec<ProposedEdit>);

    #[async_trait]
    impl EditProposer for CannedProposer {
        async fn propose(
            &self,
            _request: &str,
            _context: &DesignContext,
        ) -> Result<Vec<ProposedEdit>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn proposer_output_flows_through_validation() {
        use crate::changeset::build_change_set;

        let proposer = CannedProposer(vec![ProposedEdit::Update {
            variable_id: "ghost".into(),
            mode_id: "light".into(),
            value: Value::color_hex("#FFFFFF").unwrap(),
        }]);
        let edits = proposer
            .propose("brighten surfaces", &DesignContext::default())
            .await
            .unwrap();

        // Untrusted: the ghost id must die in validation, not at apply time.
        let built = build_change_set(&edits, &[], &[]);
        assert!(built.change_set.is_empty());
        assert_eq!(built.warnings.len(), 1);
    }

    #[test]
    fn proposals_parse_tolerantly() {
        let raw = r#"[
            {"op":"update","variable_id":"v1","mode_id":"light","value":{"r":1,"g":1,"b":1,"a":1}},
            {"op":"teleport","somewhere":"else"}
        ]"#;
        let (edits, warnings) = parse_proposals(raw).unwrap();
        assert_eq!(edits.len(), 1);
        assert_eq!(warnings.len(), 1);

        assert!(parse_proposals("not json").is_err());
    }
}
