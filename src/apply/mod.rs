//! Change-set application.
//!
//! An apply is an at-least-effort batch, not a transaction: items run in
//! submission order, failures are recorded per item and never roll back the
//! rest. Losing a whole reviewed batch over one bad item is worse than
//! partial application of independent design-token edits.

use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::changeset::{ChangeSet, VariableUpdate};
use crate::error::{classify_protocol, with_retry, RetryPolicy};
use crate::model::{Value, Variable};
use crate::protocol::{DocumentChannel, ProtocolError};

/// Alias chains longer than this are treated as unresolvable. Guards the
/// ancestor walk against cycles in corrupt snapshots.
const MAX_ALIAS_HOPS: usize = 32;

/// Outcome of one apply call. `errors` is the partial-application record:
/// always read it together with `applied`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: u32,
    pub remapped: u32,
    pub errors: Vec<String>,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Execute a change-set against the live document.
///
/// Updates run first, then creates, both in submission order — the applier
/// never reorders, so a create referenced by a later item must precede it in
/// the batch. After the mutations, a remap pass rebinds alias values left
/// dangling (target removed or retyped) to their nearest valid ancestor.
///
/// A fatal channel failure aborts the whole call with a single error and
/// claims no partial state; everything else is per-item.
pub async fn apply(channel: &dyn DocumentChannel, change_set: &ChangeSet) -> Result<ApplyReport> {
    // Pre-apply snapshot: alias topology for the remap pass. Idempotent read,
    // retried with fixed backoff.
    let policy = RetryPolicy::default();
    let pre = with_retry(&policy, || channel.extract_variables()).await?;

    let mut report = ApplyReport::default();

    for update in &change_set.updates {
        debug!(variable = %update.variable_name, mode = %update.mode_id, "applying update");
        match channel.update_variable(update).await {
            Ok(()) => report.applied += 1,
            Err(e) => record_item_error(
                &mut report,
                e,
                format!("update {} (mode {})", update.variable_name, update.mode_id),
            )?,
        }
    }

    for create in &change_set.creates {
        debug!(variable = %create.variable_name, "applying create");
        match channel.create_variable(create).await {
            Ok(_) => report.applied += 1,
            Err(e) => record_item_error(
                &mut report,
                e,
                format!("create {}", create.variable_name),
            )?,
        }
    }

    remap_dangling_aliases(channel, &pre.variables, &mut report).await?;

    info!(
        applied = report.applied,
        remapped = report.remapped,
        failed = report.errors.len(),
        "apply finished"
    );
    Ok(report)
}

fn record_item_error(
    report: &mut ApplyReport,
    error: ProtocolError,
    context: String,
) -> Result<()> {
    if error.is_fatal() {
        return Err(anyhow!("apply aborted: {error}"));
    }
    debug!(kind = ?classify_protocol(&error), %error, "item failed, continuing batch");
    report.errors.push(format!("{context}: {error}"));
    Ok(())
}

/// Scan the post-apply snapshot for alias values whose target no longer
/// exists or no longer matches the aliasing variable's type, and rebind each
/// to the nearest valid ancestor along the pre-apply alias chain.
async fn remap_dangling_aliases(
    channel: &dyn DocumentChannel,
    pre_variables: &[Variable],
    report: &mut ApplyReport,
) -> Result<()> {
    let policy = RetryPolicy::default();
    let post = match with_retry(&policy, || channel.extract_variables()).await {
        Ok(post) => post,
        Err(e) => {
            // The mutations themselves stand; only the remap scan is lost.
            report.errors.push(format!("alias remap scan skipped: {e}"));
            return Ok(());
        }
    };

    let pre_by_id: HashMap<&str, &Variable> = index_by_id(pre_variables);
    let post_by_id: HashMap<&str, &Variable> = index_by_id(&post.variables);

    for var in &post.variables {
        let Some(var_id) = var.id.as_deref() else {
            continue;
        };
        for (mode_id, value) in &var.values_by_mode {
            let Some(target) = value.alias_target() else {
                continue;
            };
            let live = post_by_id
                .get(target)
                .is_some_and(|t| t.var_type == var.var_type);
            if live {
                continue;
            }

            match nearest_valid_ancestor(target, mode_id, var, &pre_by_id, &post_by_id) {
                Some(ancestor) => {
                    let rebind = VariableUpdate {
                        variable_id: var_id.to_string(),
                        variable_name: var.name.clone(),
                        mode_id: mode_id.clone(),
                        var_type: var.var_type,
                        value: Value::alias(ancestor),
                    };
                    match channel.update_variable(&rebind).await {
                        Ok(()) => report.remapped += 1,
                        Err(e) => record_item_error(
                            report,
                            e,
                            format!("remap {} (mode {mode_id})", var.name),
                        )?,
                    }
                }
                None => report.errors.push(format!(
                    "could not remap {} (mode {mode_id}): alias target {target} has no valid ancestor",
                    var.name
                )),
            }
        }
    }

    Ok(())
}

fn index_by_id(variables: &[Variable]) -> HashMap<&str, &Variable> {
    variables
        .iter()
        .filter_map(|v| v.id.as_deref().map(|id| (id, v)))
        .collect()
}

/// Walk the pre-apply alias chain starting at the stale target until an id
/// that is live post-apply with a matching type turns up. Bounded and
/// cycle-guarded; returns `None` when the chain ends in scalars or dead ids.
fn nearest_valid_ancestor(
    stale_target: &str,
    mode_id: &str,
    for_var: &Variable,
    pre_by_id: &HashMap<&str, &Variable>,
    post_by_id: &HashMap<&str, &Variable>,
) -> Option<String> {
    let mut current = stale_target.to_string();
    let mut visited: HashSet<String> = HashSet::new();

    for _ in 0..MAX_ALIAS_HOPS {
        if !visited.insert(current.clone()) {
            return None;
        }
        let pre_var = pre_by_id.get(current.as_str())?;
        let next = pre_var
            .value_for_mode(mode_id)
            .or_else(|| pre_var.values_by_mode.values().next())
            .and_then(Value::alias_target)?
            .to_string();

        if post_by_id
            .get(next.as_str())
            .is_some_and(|t| t.var_type == for_var.var_type)
        {
            return Some(next);
        }
        current = next;
    }

    None
}
