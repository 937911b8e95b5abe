//! Impact resolution: joins a diff against the usage index to answer "which
//! components move when these variables change".
//!
//! Added variables never produce impact — nothing can depend on a variable
//! that did not exist yet.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::diff::DiffResult;
use crate::model::{format_value, Variable, VariableType};
use crate::usage::UsageIndex;

/// Node-count thresholds for the impact ranking. Policy constants, not
/// derived.
pub const HIGH_IMPACT_NODES: usize = 10;
pub const MEDIUM_IMPACT_NODES: usize = 3;

static TYPOGRAPHY_NAMES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(font|text|type|typography|letter|line[-_ ]?height|weight)")
        .expect("typography pattern is valid")
});

static SPACING_NAMES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(spac|size|siz|gap|pad|margin|radius|inset|width|height|stroke)")
        .expect("spacing pattern is valid")
});

/// Human-facing grouping of a change; used purely to organize summaries, never
/// for correctness decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeCategory {
    Color,
    Typography,
    Spacing,
    Other,
}

impl ChangeCategory {
    /// Derive a category from a variable's type and naming. COLOR wins
    /// outright; typography and spacing are name heuristics over the variable
    /// and collection names.
    pub fn derive(var: &Variable) -> Self {
        if var.var_type == VariableType::Color {
            return ChangeCategory::Color;
        }
        let haystack = format!("{} {}", var.collection_name, var.name);
        if TYPOGRAPHY_NAMES.is_match(&haystack) {
            ChangeCategory::Typography
        } else if SPACING_NAMES.is_match(&haystack) {
            ChangeCategory::Spacing
        } else {
            ChangeCategory::Other
        }
    }
}

impl std::fmt::Display for ChangeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeCategory::Color => "color",
            ChangeCategory::Typography => "typography",
            ChangeCategory::Spacing => "spacing",
            ChangeCategory::Other => "other",
        };
        write!(f, "{s}")
    }
}

/// Ranked severity of a component's exposure, from distinct node count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImpactLevel {
    Low,
    Medium,
    High,
}

impl ImpactLevel {
    pub fn from_node_count(count: usize) -> Self {
        if count >= HIGH_IMPACT_NODES {
            ImpactLevel::High
        } else if count >= MEDIUM_IMPACT_NODES {
            ImpactLevel::Medium
        } else {
            ImpactLevel::Low
        }
    }
}

impl std::fmt::Display for ImpactLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ImpactLevel::Low => "low",
            ImpactLevel::Medium => "medium",
            ImpactLevel::High => "high",
        };
        write!(f, "{s}")
    }
}

/// One affected variable within a component, with formatted old/new values.
/// `new_value` is `None` for removals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpactRecord {
    pub identity: String,
    pub variable_name: String,
    pub category: ChangeCategory,
    pub old_value: String,
    pub new_value: Option<String>,
}

/// Everything that shifts inside one component for the diff under analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentImpact {
    pub component_name: String,
    /// Distinct node ids, not raw binding count.
    pub node_count: usize,
    pub level: ImpactLevel,
    pub records: Vec<ImpactRecord>,
}

/// Join changed and removed variables against the usage index. Components that
/// end up with zero records are dropped; output is sorted by node count
/// descending, then name, so repeated runs are stable.
pub fn resolve_impact(diff: &DiffResult, index: &UsageIndex) -> Vec<ComponentImpact> {
    // Formatting context: names for one-hop alias labels on either side.
    let mut known: Vec<Variable> = Vec::new();
    for c in &diff.changed {
        known.push(c.old.clone());
        known.push(c.new.clone());
    }
    known.extend(diff.removed.iter().cloned());

    let mut per_component: HashMap<String, (HashSet<String>, Vec<ImpactRecord>)> =
        HashMap::new();

    let mut record = |var: &Variable, new: Option<&Variable>, known: &[Variable]| {
        let identity = var.identity_key();
        for entry in index.lookup(&identity) {
            let (nodes, records) = per_component
                .entry(entry.component_name.clone())
                .or_default();
            nodes.extend(entry.node_ids.iter().cloned());
            records.push(ImpactRecord {
                identity: identity.clone(),
                variable_name: var.name.clone(),
                category: ChangeCategory::derive(var),
                old_value: format_values_by_mode(var, known),
                new_value: new.map(|n| format_values_by_mode(n, known)),
            });
        }
    };

    for change in &diff.changed {
        record(&change.old, Some(&change.new), &known);
    }
    for removed in &diff.removed {
        record(removed, None, &known);
    }

    let mut impacts: Vec<ComponentImpact> = per_component
        .into_iter()
        .map(|(component_name, (nodes, records))| ComponentImpact {
            component_name,
            node_count: nodes.len(),
            level: ImpactLevel::from_node_count(nodes.len()),
            records,
        })
        .collect();

    impacts.sort_by(|a, b| {
        b.node_count
            .cmp(&a.node_count)
            .then_with(|| a.component_name.cmp(&b.component_name))
    });
    for impact in &mut impacts {
        impact.records.sort_by(|a, b| a.identity.cmp(&b.identity));
    }

    impacts
}

/// Per-mode value summary, e.g. `light: #000000, dark: {alias:blue/500}`.
pub fn format_values_by_mode(var: &Variable, known: &[Variable]) -> String {
    var.values_by_mode
        .iter()
        .map(|(mode, value)| format!("{mode}: {}", format_value(value, known)))
        .collect::<Vec<_>>()
        .join(", ")
}
