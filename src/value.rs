//! Scalar cell values.
//!
//! Every cell of a stored dataset is one of four scalar shapes. Missing cells are
//! stored as empty text regardless of the source format, so downstream code only
//! ever has to check [`Value::is_missing`].

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    /// The empty-string sentinel used for missing cells.
    pub fn missing() -> Self {
        Value::Text(String::new())
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Value::Text(s) if s.is_empty())
    }

    /// Numeric interpretation of the value, if it has one.
    ///
    /// Text is trimmed before parsing. Empty text and non-finite parses yield `None`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => f.is_finite().then_some(*f),
            Value::Text(s) => parse_number(s),
        }
    }

    /// Lowercased display form, used by the case-insensitive comparisons.
    pub fn folded(&self) -> String {
        self.to_string().to_lowercase()
    }
}

/// Parse trimmed text as a finite number.
pub fn parse_number(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|f| f.is_finite())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            // whole floats keep their fractional marker: 15.0, not 15
            Value::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 => {
                write!(f, "{:.1}", x)
            }
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}
