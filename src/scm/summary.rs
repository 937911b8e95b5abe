//! Human-readable change summaries for pull-request bodies and CLI output.

use crate::diff::DiffResult;
use crate::impact::{format_values_by_mode, ComponentImpact};
use crate::model::{format_value, Variable};

/// Render a markdown summary of a diff plus its resolved impact: counts,
/// per-mode breakdown for every change, and per-component exposure.
pub fn render_summary(
    diff: &DiffResult,
    impacts: &[ComponentImpact],
    known: &[Variable],
) -> String {
    let mut out = String::new();

    out.push_str("## Design variable changes\n\n");
    out.push_str(&format!(
        "**{} added, {} removed, {} changed**\n",
        diff.added.len(),
        diff.removed.len(),
        diff.changed.len()
    ));

    if !diff.changed.is_empty() {
        out.push_str("\n### Changed\n");
        for change in &diff.changed {
            out.push_str(&format!(
                "- `{}` ({})\n",
                change.new.name, change.new.collection_name
            ));
            for mode in change.differing_modes() {
                let old = change
                    .old
                    .value_for_mode(&mode)
                    .map(|v| format_value(v, known))
                    .unwrap_or_else(|| "(no value)".to_string());
                let new = change
                    .new
                    .value_for_mode(&mode)
                    .map(|v| format_value(v, known))
                    .unwrap_or_else(|| "(no value)".to_string());
                out.push_str(&format!("  - {mode}: {old} → {new}\n"));
            }
        }
    }

    if !diff.added.is_empty() {
        out.push_str("\n### Added\n");
        for var in &diff.added {
            out.push_str(&format!(
                "- `{}` ({}): {}\n",
                var.name,
                var.collection_name,
                format_values_by_mode(var, known)
            ));
        }
    }

    if !diff.removed.is_empty() {
        out.push_str("\n### Removed\n");
        for var in &diff.removed {
            out.push_str(&format!(
                "- `{}` ({}): {}\n",
                var.name,
                var.collection_name,
                format_values_by_mode(var, known)
            ));
        }
    }

    if !impacts.is_empty() {
        out.push_str("\n### Component impact\n");
        for impact in impacts {
            out.push_str(&format!(
                "- **{}** — {} impact, {} node{}\n",
                impact.component_name,
                impact.level,
                impact.node_count,
                if impact.node_count == 1 { "" } else { "s" }
            ));
            for record in &impact.records {
                let change = match &record.new_value {
                    Some(new) => format!("{} → {}", record.old_value, new),
                    None => format!("{} (removed)", record.old_value),
                };
                out.push_str(&format!(
                    "  - `{}` [{}]: {}\n",
                    record.variable_name, record.category, change
                ));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff;
    use crate::impact::resolve_impact;
    use crate::model::{Value, VariableType};
    use crate::usage::{NodeBinding, UsageIndex};
    use std::collections::BTreeMap;

    fn var(id: &str, name: &str, hex: &str) -> Variable {
        Variable {
            id: Some(id.into()),
            name: name.into(),
            var_type: VariableType::Color,
            collection_id: "c1".into(),
            collection_name: "Primitives".into(),
            values_by_mode: BTreeMap::from([(
                "light".to_string(),
                Value::color_hex(hex).unwrap(),
            )]),
        }
    }

    #[test]
    fn summary_carries_counts_modes_and_components() {
        let old = vec![var("v1", "surface", "#000000"), var("v2", "accent", "#FF0000")];
        let new = vec![var("v1", "surface", "#111111"), var("v3", "border", "#00FF00")];
        let d = diff(&old, &new);

        let index = UsageIndex::build(&[NodeBinding {
            variable_id: Some("v1".into()),
            style_id: None,
            component_name: Some("Button".into()),
            node_ids: vec!["n1".into(), "n2".into(), "n3".into()],
        }]);
        let impacts = resolve_impact(&d, &index);

        let summary = render_summary(&d, &impacts, &old);
        assert!(summary.contains("1 added, 1 removed, 1 changed"));
        assert!(summary.contains("light: #000000 → #111111"));
        assert!(summary.contains("**Button** — medium impact, 3 nodes"));
        assert!(summary.contains("`border`"));
        assert!(summary.contains("`accent`"));
    }

    #[test]
    fn empty_diff_renders_counts_only() {
        let summary = render_summary(&DiffResult::default(), &[], &[]);
        assert!(summary.contains("0 added, 0 removed, 0 changed"));
        assert!(!summary.contains("### Changed"));
    }
}
