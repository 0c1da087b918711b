//! Raw entity state values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single entity state as reported by the host.
///
/// Hosts mostly report strings (`"on"`, `"playing"`), but configuration may
/// list numbers or booleans as active values, so all four shapes exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

/// Raw payloads that mean "no value".
const UNKNOWN_PAYLOADS: [&str; 4] = ["", "unknown", "unavailable", "none"];

impl StateValue {
    /// Parse a raw host payload.
    ///
    /// Returns `None` for empty, `unknown`, `unavailable` and `none` payloads.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if UNKNOWN_PAYLOADS
            .iter()
            .any(|unknown| raw.eq_ignore_ascii_case(unknown))
        {
            return None;
        }
        if let Ok(b) = raw.parse::<bool>() {
            return Some(Self::Bool(b));
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Some(Self::Int(i));
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() {
                return Some(Self::Float(f));
            }
        }
        Some(Self::String(raw.to_string()))
    }

    /// Whether this value is a placeholder the host uses for missing data.
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        match self {
            Self::String(s) => UNKNOWN_PAYLOADS
                .iter()
                .any(|unknown| s.trim().eq_ignore_ascii_case(unknown)),
            _ => false,
        }
    }

    /// Loose equality used for active-value membership.
    ///
    /// Numbers compare numerically across `Int`/`Float`, and a string matches
    /// a bool or number when it parses to an equal value (`"1"` matches `1`).
    #[must_use]
    #[allow(clippy::float_cmp, clippy::cast_precision_loss)]
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => *a as f64 == *b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::String(s), typed) | (typed, Self::String(s)) => match Self::parse(s) {
                Some(Self::String(_)) | None => false,
                Some(parsed) => parsed.matches(typed),
            },
            _ => false,
        }
    }
}

impl From<&str> for StateValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<bool> for StateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for StateValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl fmt::Display for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
        }
    }
}
