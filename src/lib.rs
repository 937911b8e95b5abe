//! # Varforge - Design Variable Diff & Impact Engine
//!
//! Extracts design variables (colors, numbers, strings, booleans grouped into
//! collections with per-mode values) from a live design document, diffs them
//! against a committed baseline, resolves which components are affected, and
//! applies reviewed change-sets back through the document protocol.
//!
//! ## Features
//!
//! - **Snapshot diffing**: added/removed/changed classification with
//!   alias-aware, mode-aware structural equality
//! - **Usage index**: reverse map from variable to consuming components/nodes
//! - **Impact resolution**: per-component change summaries ranked by exposure
//! - **Validated change-sets**: untrusted proposals become applyable batches
//! - **At-least-effort apply**: per-item errors, dangling-alias remapping,
//!   never all-or-nothing
//! - **Baseline tracking**: JSON baselines per branch with PR export
//!
//! ## Quick Start
//!
//! ```rust
//! use varforge::diff::diff;
//!
//! let old = varforge::baseline::parse(r#"[
//!     {"name":"surface","type":"COLOR","collection_id":"c1",
//!      "collection_name":"Primitives",
//!      "values_by_mode":{"light":{"r":0.0,"g":0.0,"b":0.0,"a":1.0}}}
//! ]"#).unwrap();
//! let new = varforge::baseline::parse(r#"[
//!     {"name":"surface","type":"COLOR","collection_id":"c1",
//!      "collection_name":"Primitives",
//!      "values_by_mode":{"light":{"r":1.0,"g":1.0,"b":1.0,"a":1.0}}}
//! ]"#).unwrap();
//!
//! let result = diff(&old.variables, &new.variables);
//! assert_eq!(result.changed.len(), 1);
//! ```

pub mod ai;
pub mod apply;
pub mod baseline;
pub mod changeset;
pub mod diff;
pub mod error;
pub mod impact;
pub mod model;
pub mod protocol;
pub mod scm;
pub mod usage;

// Re-export main types for library consumers
pub use apply::{apply, ApplyReport};
pub use changeset::{build_change_set, BuiltChangeSet, ChangeSet, ProposedEdit};
pub use diff::{diff, ChangedVariable, DiffResult};
pub use impact::{resolve_impact, ChangeCategory, ComponentImpact, ImpactLevel};
pub use model::{Collection, Mode, Value, Variable, VariableType};
pub use protocol::{DocumentChannel, PageScope, ProtocolError};
pub use usage::{NodeBinding, UsageEntry, UsageIndex};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
