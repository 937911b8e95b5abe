//! Typed representation of design variables, collections, and per-mode values.
//!
//! Variables are immutable value objects once extracted: diffing and impact
//! resolution never mutate a snapshot, they only read it.

pub mod value;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub use value::{Rgba, Value};

/// The four variable types the document exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VariableType {
    Color,
    Number,
    String,
    Boolean,
}

impl VariableType {
    /// Whether a concrete value is an acceptable payload for this type.
    /// Aliases are acceptable for any type (the target carries the payload);
    /// unknown payloads are acceptable for none.
    pub fn accepts(&self, value: &Value) -> bool {
        match value {
            Value::Alias { .. } => true,
            Value::Color(_) => *self == VariableType::Color,
            Value::Number(_) => *self == VariableType::Number,
            Value::Text(_) => *self == VariableType::String,
            Value::Flag(_) => *self == VariableType::Boolean,
            Value::Unknown(_) => false,
        }
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VariableType::Color => "COLOR",
            VariableType::Number => "NUMBER",
            VariableType::String => "STRING",
            VariableType::Boolean => "BOOLEAN",
        };
        write!(f, "{s}")
    }
}

/// A named mode within a collection (light/dark, brand A/B, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mode {
    pub mode_id: String,
    pub name: String,
}

/// A variable collection. Owns the mode vocabulary its variables reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
    pub modes: Vec<Mode>,
}

impl Collection {
    pub fn has_mode(&self, mode_id: &str) -> bool {
        self.modes.iter().any(|m| m.mode_id == mode_id)
    }
}

/// A design variable: a typed value that belongs to exactly one collection and
/// varies per mode. `id` is the document-assigned identity; snapshots exported
/// by other systems may not carry one, in which case identity falls back to
/// collection + name.
///
/// `values_by_mode` is a BTreeMap so serialization and diff output are stable
/// across runs on unchanged inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type")]
    pub var_type: VariableType,
    pub collection_id: String,
    pub collection_name: String,
    pub values_by_mode: BTreeMap<String, Value>,
}

impl Variable {
    /// Stable identity key: the document id when known, otherwise
    /// collection name + variable name (the cross-system fallback).
    pub fn identity_key(&self) -> String {
        match &self.id {
            Some(id) => id.clone(),
            None => self.name_key(),
        }
    }

    /// The name-based fallback key, usable even when an id exists.
    pub fn name_key(&self) -> String {
        format!("{}/{}", self.collection_name, self.name)
    }

    pub fn has_mode(&self, mode_id: &str) -> bool {
        self.values_by_mode.contains_key(mode_id)
    }

    pub fn value_for_mode(&self, mode_id: &str) -> Option<&Value> {
        self.values_by_mode.get(mode_id)
    }
}

/// Format a value for human-facing output, resolving aliases one hop deep:
/// an alias is surfaced as `{alias:<target>}` (target name when the target is
/// known, raw id otherwise) rather than following the chain.
pub fn format_value(value: &Value, known: &[Variable]) -> String {
    match value {
        Value::Color(c) => c.to_hex(),
        Value::Number(n) => {
            if n.fract() == 0.0 {
                format!("{}", *n as i64)
            } else {
                format!("{n}")
            }
        }
        Value::Text(s) => format!("\"{s}\""),
        Value::Flag(b) => b.to_string(),
        Value::Alias { alias } => {
            let label = known
                .iter()
                .find(|v| v.id.as_deref() == Some(alias.as_str()))
                .map(|v| v.name.as_str())
                .unwrap_or(alias.as_str());
            format!("{{alias:{label}}}")
        }
        Value::Unknown(raw) => raw.to_string(),
    }
}
