//! Change-set builder: turns a reviewed diff or an externally proposed edit
//! list into a validated batch ready for application.
//!
//! Pure over in-memory snapshots — never talks to the live document, which is
//! what keeps it testable without a document connection. Invalid items are
//! dropped with a warning instead of aborting the whole batch.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::model::{Collection, Value, Variable, VariableType};

/// An edit proposed by the operator or an external (AI) collaborator. Treated
/// as untrusted input until it passes `build_change_set`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum ProposedEdit {
    Update {
        variable_id: String,
        mode_id: String,
        value: Value,
    },
    Create {
        variable_name: String,
        collection_id: String,
        mode_id: String,
        #[serde(rename = "type")]
        var_type: VariableType,
        value: Value,
    },
}

/// A validated per-mode update of an existing variable. Carries the variable
/// name alongside the id so the applier can report failures readably.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableUpdate {
    pub variable_id: String,
    pub variable_name: String,
    pub mode_id: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    pub value: Value,
}

/// A validated creation of a new variable with one initial mode value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableCreate {
    pub variable_name: String,
    pub collection_id: String,
    pub mode_id: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    pub value: Value,
}

/// Validated batch. Built once per accepted diff or proposal and consumed
/// exactly once by the applier; an edited proposal gets a fresh build, the
/// old set is discarded rather than mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub updates: Vec<VariableUpdate>,
    pub creates: Vec<VariableCreate>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty() && self.creates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len() + self.creates.len()
    }
}

/// Builder output: the validated set plus one warning per dropped or
/// superseded item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuiltChangeSet {
    pub change_set: ChangeSet,
    pub warnings: Vec<String>,
}

/// Validate a proposal against the known variable and collection snapshots.
///
/// Rules, each dropping the offending item with a warning rather than
/// erroring: unknown variable id; mode id absent from the variable's
/// collection; unknown collection id for creates; payload tag incompatible
/// with the variable's type. Duplicate updates for the same (variable, mode)
/// pair: last one wins, the discarded duplicate is warned about.
pub fn build_change_set(
    proposal: &[ProposedEdit],
    known_variables: &[Variable],
    collections: &[Collection],
) -> BuiltChangeSet {
    let by_id: HashMap<&str, &Variable> = known_variables
        .iter()
        .filter_map(|v| v.id.as_deref().map(|id| (id, v)))
        .collect();
    let collections_by_id: HashMap<&str, &Collection> =
        collections.iter().map(|c| (c.id.as_str(), c)).collect();

    let mut warnings = Vec::new();
    let mut updates: Vec<VariableUpdate> = Vec::new();
    // (variable_id, mode_id) -> position in `updates`, for last-wins dedup.
    let mut update_slots: HashMap<(String, String), usize> = HashMap::new();
    let mut creates = Vec::new();

    for edit in proposal {
        match edit {
            ProposedEdit::Update {
                variable_id,
                mode_id,
                value,
            } => {
                let Some(var) = by_id.get(variable_id.as_str()) else {
                    warnings.push(format!(
                        "dropped update for unknown variable id {variable_id}"
                    ));
                    continue;
                };

                if !mode_is_valid(var, mode_id, &collections_by_id) {
                    warnings.push(format!(
                        "dropped update for {}: mode {mode_id} does not exist in collection {}",
                        var.name, var.collection_name
                    ));
                    continue;
                }

                if !var.var_type.accepts(value) {
                    warnings.push(format!(
                        "dropped update for {}: payload is not a valid {} value",
                        var.name, var.var_type
                    ));
                    continue;
                }

                let update = VariableUpdate {
                    variable_id: variable_id.clone(),
                    variable_name: var.name.clone(),
                    mode_id: mode_id.clone(),
                    var_type: var.var_type,
                    value: value.clone(),
                };

                let key = (variable_id.clone(), mode_id.clone());
                match update_slots.get(&key) {
                    Some(&slot) => {
                        warnings.push(format!(
                            "duplicate update for {} mode {mode_id}: earlier value discarded, last one wins",
                            var.name
                        ));
                        updates[slot] = update;
                    }
                    None => {
                        update_slots.insert(key, updates.len());
                        updates.push(update);
                    }
                }
            }

            ProposedEdit::Create {
                variable_name,
                collection_id,
                mode_id,
                var_type,
                value,
            } => {
                let Some(collection) = collections_by_id.get(collection_id.as_str()) else {
                    warnings.push(format!(
                        "dropped create of {variable_name}: unknown collection id {collection_id}"
                    ));
                    continue;
                };

                if !collection.has_mode(mode_id) {
                    warnings.push(format!(
                        "dropped create of {variable_name}: mode {mode_id} does not exist in collection {}",
                        collection.name
                    ));
                    continue;
                }

                if !var_type.accepts(value) {
                    warnings.push(format!(
                        "dropped create of {variable_name}: payload is not a valid {var_type} value"
                    ));
                    continue;
                }

                creates.push(VariableCreate {
                    variable_name: variable_name.clone(),
                    collection_id: collection_id.clone(),
                    mode_id: mode_id.clone(),
                    var_type: *var_type,
                    value: value.clone(),
                });
            }
        }
    }

    BuiltChangeSet {
        change_set: ChangeSet { updates, creates },
        warnings,
    }
}

/// A mode is valid when the variable's collection declares it; if the
/// collection snapshot is missing that collection, fall back to the modes the
/// variable already carries.
fn mode_is_valid(
    var: &Variable,
    mode_id: &str,
    collections: &HashMap<&str, &Collection>,
) -> bool {
    match collections.get(var.collection_id.as_str()) {
        Some(collection) => collection.has_mode(mode_id),
        None => var.has_mode(mode_id),
    }
}
