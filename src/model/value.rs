use serde::{Deserialize, Serialize};
use std::fmt;

/// RGBA color with float channels in `0.0..=1.0`, matching the document's
/// native color representation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    #[serde(default = "default_alpha")]
    pub a: f64,
}

fn default_alpha() -> f64 {
    1.0
}

impl Rgba {
    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        let expand = |c: u8| u8::from_str_radix(&format!("{0}{0}", c as char), 16).ok();

        let (r, g, b, a) = match hex.len() {
            3 => {
                let bytes = hex.as_bytes();
                (
                    expand(bytes[0])?,
                    expand(bytes[1])?,
                    expand(bytes[2])?,
                    255u8,
                )
            }
            6 | 8 => {
                let parse = |range: std::ops::Range<usize>| {
                    u8::from_str_radix(hex.get(range)?, 16).ok()
                };
                (
                    parse(0..2)?,
                    parse(2..4)?,
                    parse(4..6)?,
                    if hex.len() == 8 { parse(6..8)? } else { 255 },
                )
            }
            _ => return None,
        };

        Some(Self {
            r: r as f64 / 255.0,
            g: g as f64 / 255.0,
            b: b as f64 / 255.0,
            a: a as f64 / 255.0,
        })
    }

    pub fn to_hex(&self) -> String {
        let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        if self.a < 1.0 {
            format!(
                "#{:02X}{:02X}{:02X}{:02X}",
                channel(self.r),
                channel(self.g),
                channel(self.b),
                channel(self.a)
            )
        } else {
            format!(
                "#{:02X}{:02X}{:02X}",
                channel(self.r),
                channel(self.g),
                channel(self.b)
            )
        }
    }
}

impl fmt::Display for Rgba {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A single per-mode value: either a typed scalar payload or an alias to
/// another variable. Alias identity is part of the diffable state — an alias
/// is never equal to the scalar it would resolve to, since rebinding is itself
/// a meaningful change.
///
/// The untagged representation keeps baseline files readable and lets exports
/// written by other tools parse: `{"r":..}` is a color, `{"alias":".."}` an
/// alias, bare scalars map to their obvious variants, and anything else lands
/// in `Unknown` instead of failing the whole record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Color(Rgba),
    Alias { alias: String },
    Flag(bool),
    Number(f64),
    Text(String),
    Unknown(serde_json::Value),
}

impl Value {
    pub fn alias(target: impl Into<String>) -> Self {
        Value::Alias {
            alias: target.into(),
        }
    }

    pub fn color_hex(hex: &str) -> Option<Self> {
        Rgba::from_hex(hex).map(Value::Color)
    }

    pub fn is_alias(&self) -> bool {
        matches!(self, Value::Alias { .. })
    }

    pub fn alias_target(&self) -> Option<&str> {
        match self {
            Value::Alias { alias } => Some(alias),
            _ => None,
        }
    }

    /// Structural equality: same tag, equal payload under type-specific rules.
    /// Colors compare channel-wise with zero tolerance, numbers/strings/bools
    /// exactly, aliases by target id. Total — unrecognized payloads compare
    /// unequal to everything, including themselves, rather than erroring.
    pub fn structurally_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Color(a), Value::Color(b)) => {
                a.r == b.r && a.g == b.g && a.b == b.b && a.a == b.a
            }
            (Value::Alias { alias: a }, Value::Alias { alias: b }) => a == b,
            (Value::Flag(a), Value::Flag(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            // Partially-known external schemas: never claim equality.
            (Value::Unknown(_), _) | (_, Value::Unknown(_)) => false,
            _ => false,
        }
    }
}
