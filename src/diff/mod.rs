//! Snapshot diff engine.
//!
//! Classifies two variable snapshots into added / removed / changed. Inputs
//! are borrowed immutably and never mutated; output ordering is stable (sorted
//! by identity key) so diffing unchanged inputs twice yields identical output.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::model::Variable;

/// A variable present in both snapshots with at least one difference. Carries
/// the full old and new records, not a per-field patch, so downstream
/// consumers can re-derive exactly what changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedVariable {
    pub old: Variable,
    pub new: Variable,
}

impl ChangedVariable {
    /// Mode ids whose values differ between old and new, including modes
    /// present on only one side.
    pub fn differing_modes(&self) -> Vec<String> {
        let mut modes: Vec<String> = self
            .old
            .values_by_mode
            .keys()
            .chain(self.new.values_by_mode.keys())
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .filter(|mode| {
                match (
                    self.old.value_for_mode(mode),
                    self.new.value_for_mode(mode),
                ) {
                    (Some(a), Some(b)) => !a.structurally_eq(b),
                    _ => true,
                }
            })
            .collect();
        modes.sort();
        modes
    }
}

/// Result of diffing two snapshots. The three lists partition the union of
/// old/new identities: a variable is never simultaneously added and removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiffResult {
    pub added: Vec<Variable>,
    pub removed: Vec<Variable>,
    pub changed: Vec<ChangedVariable>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.added.len() + self.removed.len() + self.changed.len()
    }
}

/// Compare two variable snapshots.
///
/// Matching probes the old snapshot by document id first; id is authoritative,
/// so a rename with a stable id is a change, not a remove + add. Variables
/// without a shared id fall back to collection + name matching, which is what
/// makes diffs across systems that do not share ids work.
pub fn diff(old: &[Variable], new: &[Variable]) -> DiffResult {
    let mut old_by_id: HashMap<&str, &Variable> = HashMap::new();
    let mut old_by_name: HashMap<String, &Variable> = HashMap::new();
    for var in old {
        if let Some(id) = &var.id {
            old_by_id.insert(id.as_str(), var);
        }
        old_by_name.insert(var.name_key(), var);
    }

    let mut matched_old: HashSet<String> = HashSet::new();
    let mut added = Vec::new();
    let mut changed = Vec::new();

    for new_var in new {
        let by_id = new_var
            .id
            .as_deref()
            .and_then(|id| old_by_id.get(id).copied());
        let (old_var, matched_by_id) = match by_id {
            Some(v) => (Some(v), true),
            None => (old_by_name.get(&new_var.name_key()).copied(), false),
        };

        match old_var {
            None => added.push(new_var.clone()),
            Some(old_var) => {
                matched_old.insert(old_var.identity_key());
                if variable_differs(old_var, new_var, matched_by_id) {
                    changed.push(ChangedVariable {
                        old: old_var.clone(),
                        new: new_var.clone(),
                    });
                }
            }
        }
    }

    let mut removed: Vec<Variable> = old
        .iter()
        .filter(|v| !matched_old.contains(&v.identity_key()))
        .cloned()
        .collect();

    added.sort_by_key(|v| v.identity_key());
    removed.sort_by_key(|v| v.identity_key());
    changed.sort_by_key(|c| c.new.identity_key());

    DiffResult {
        added,
        removed,
        changed,
    }
}

fn variable_differs(old: &Variable, new: &Variable, matched_by_id: bool) -> bool {
    if old.var_type != new.var_type {
        return true;
    }

    // Collection membership: compare ids for id-matched pairs; a name-matched
    // pair already agrees on collection name and may legitimately carry
    // different ids across systems.
    if matched_by_id && old.collection_id != new.collection_id {
        return true;
    }

    if old.name != new.name {
        return true;
    }

    // Every mode present on either side must agree. A mode gained or lost
    // entirely is a structural change even when all shared modes match.
    let mode_union: HashSet<&String> = old
        .values_by_mode
        .keys()
        .chain(new.values_by_mode.keys())
        .collect();

    mode_union.into_iter().any(|mode| {
        match (old.value_for_mode(mode), new.value_for_mode(mode)) {
            (Some(a), Some(b)) => !a.structurally_eq(b),
            _ => true,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Value, VariableType};
    use std::collections::BTreeMap;

    fn var(id: &str, name: &str, modes: &[(&str, Value)]) -> Variable {
        Variable {
            id: Some(id.to_string()),
            name: name.to_string(),
            var_type: VariableType::Color,
            collection_id: "VariableCollectionId:1:1".into(),
            collection_name: "Primitives".into(),
            values_by_mode: modes
                .iter()
                .map(|(m, v)| (m.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn hex(s: &str) -> Value {
        Value::color_hex(s).unwrap()
    }

    #[test]
    fn self_diff_is_empty() {
        let snapshot = vec![
            var("v1", "surface", &[("light", hex("#000000"))]),
            var("v2", "accent", &[("light", hex("#FF0000"))]),
        ];
        let result = diff(&snapshot, &snapshot);
        assert!(result.is_empty());
    }

    #[test]
    fn diff_is_symmetric() {
        let old = vec![
            var("v1", "surface", &[("light", hex("#000000"))]),
            var("v2", "accent", &[("light", hex("#FF0000"))]),
        ];
        let new = vec![
            var("v1", "surface", &[("light", hex("#111111"))]),
            var("v3", "border", &[("light", hex("#00FF00"))]),
        ];

        let forward = diff(&old, &new);
        let backward = diff(&new, &old);

        assert_eq!(forward.added, backward.removed);
        assert_eq!(forward.removed, backward.added);
        assert_eq!(forward.changed.len(), backward.changed.len());
        for (f, b) in forward.changed.iter().zip(backward.changed.iter()) {
            assert_eq!(f.old, b.new);
            assert_eq!(f.new, b.old);
        }
    }

    #[test]
    fn gained_mode_is_changed_not_added() {
        let old = vec![var("v1", "surface", &[("light", hex("#000000"))])];
        let new = vec![var(
            "v1",
            "surface",
            &[("light", hex("#000000")), ("dark", hex("#FFFFFF"))],
        )];

        let result = diff(&old, &new);
        assert!(result.added.is_empty());
        assert!(result.removed.is_empty());
        assert_eq!(result.changed.len(), 1);
        assert_eq!(result.changed[0].differing_modes(), vec!["dark"]);
    }

    #[test]
    fn alias_to_scalar_is_changed_even_if_resolved_equal() {
        // v1 aliased v2 (#112233); the new snapshot inlines the same color.
        let v2 = var("v2", "blue/500", &[("light", hex("#112233"))]);
        let old = vec![
            var("v1", "accent", &[("light", Value::alias("v2"))]),
            v2.clone(),
        ];
        let new = vec![var("v1", "accent", &[("light", hex("#112233"))]), v2];

        let result = diff(&old, &new);
        assert_eq!(result.changed.len(), 1);
        assert_eq!(result.changed[0].old.identity_key(), "v1");
    }

    #[test]
    fn rename_with_stable_id_is_changed() {
        let old = vec![var("v1", "surface", &[("light", hex("#000000"))])];
        let new = vec![var("v1", "surface/base", &[("light", hex("#000000"))])];

        let result = diff(&old, &new);
        assert!(result.added.is_empty());
        assert!(result.removed.is_empty());
        assert_eq!(result.changed.len(), 1);
    }

    #[test]
    fn name_fallback_matches_across_systems_without_ids() {
        let mut old_var = var("ignored", "spacing/md", &[("default", Value::Number(16.0))]);
        old_var.id = None;
        old_var.var_type = VariableType::Number;

        let mut new_var = old_var.clone();
        new_var.collection_id = "other-system-id".into();
        new_var.values_by_mode =
            BTreeMap::from([("default".to_string(), Value::Number(20.0))]);

        let result = diff(&[old_var], &[new_var]);
        assert_eq!(result.changed.len(), 1);
        assert!(result.added.is_empty());
    }

    #[test]
    fn type_change_is_changed() {
        let old = vec![var("v1", "toggle", &[("light", hex("#000000"))])];
        let mut retyped = var("v1", "toggle", &[]);
        retyped.var_type = VariableType::Boolean;
        retyped.values_by_mode = BTreeMap::from([("light".to_string(), Value::Flag(true))]);

        let result = diff(&old, &[retyped]);
        assert_eq!(result.changed.len(), 1);
    }

    #[test]
    fn deterministic_output_order() {
        let old = vec![
            var("v9", "z", &[("light", hex("#000000"))]),
            var("v1", "a", &[("light", hex("#000000"))]),
        ];
        let new: Vec<Variable> = Vec::new();

        let first = diff(&old, &new);
        let second = diff(&old, &new);
        assert_eq!(first, second);
        assert_eq!(first.removed[0].identity_key(), "v1");
        assert_eq!(first.removed[1].identity_key(), "v9");
    }
}
