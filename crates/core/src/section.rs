//! Section values - the per-activity fields inside a module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Section key → value mapping for one module.
pub type Sections = BTreeMap<String, SectionValue>;

/// A single trackable section value.
///
/// Sections are heterogeneous: simple gates are booleans, quizzes carry
/// numeric scores, and checklists are short arrays of nullable booleans.
/// Shapes this crate does not know about are kept verbatim in `Other`
/// so newer data written by another client survives a round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionValue {
    /// Explicit null (unanswered item, unset date)
    Empty,
    /// Simple gate
    Flag(bool),
    /// Numeric score
    Score(serde_json::Number),
    /// Checklist of answered/unanswered items
    Checklist(Vec<Option<bool>>),
    /// Free text (e.g. certification date)
    Text(String),
    /// Anything else
    Other(serde_json::Value),
}

impl SectionValue {
    /// Whether this value is exactly `true`.
    pub fn is_true(&self) -> bool {
        matches!(self, SectionValue::Flag(true))
    }

    /// Whether this value counts as filled in: `true` or a positive number.
    pub fn is_filled(&self) -> bool {
        match self {
            SectionValue::Flag(b) => *b,
            SectionValue::Score(n) => n.as_f64().is_some_and(|v| v > 0.0),
            _ => false,
        }
    }

    /// Numeric value, if this is a score.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SectionValue::Score(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Build a score from an integer.
    pub fn score(n: i64) -> Self {
        SectionValue::Score(n.into())
    }

    /// Parse a loosely-typed value as typed on a command line or in a form.
    ///
    /// JSON literals (`true`, `12`, `[true,null]`, `null`) are decoded; any
    /// other input is kept as text.
    pub fn parse_loose(input: &str) -> Self {
        serde_json::from_str(input).unwrap_or_else(|_| SectionValue::Text(input.to_string()))
    }
}

impl From<bool> for SectionValue {
    fn from(b: bool) -> Self {
        SectionValue::Flag(b)
    }
}

impl From<i64> for SectionValue {
    fn from(n: i64) -> Self {
        SectionValue::score(n)
    }
}

impl From<&str> for SectionValue {
    fn from(s: &str) -> Self {
        SectionValue::Text(s.to_string())
    }
}

impl From<Vec<Option<bool>>> for SectionValue {
    fn from(items: Vec<Option<bool>>) -> Self {
        SectionValue::Checklist(items)
    }
}
