//! Wire-level value rendering
//!
//! Every operand is one of a closed set of variants with exactly one render
//! rule per case. Strings are quoted, backslash-escaped, and
//! percent-encoded; dates render as quoted ISO-8601; structured values as
//! encoded JSON text. Shapes with no wire form render the `null` marker
//! instead of failing the whole render.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};

/// Characters left intact by component encoding: ASCII alphanumerics plus
/// `- _ . ! ~ * ' ( )` (the `encodeURIComponent` set).
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// A single filter operand.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Json(serde_json::Value),
}

impl FilterValue {
    pub(crate) fn to_wire(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) if f.is_finite() => f.to_string(),
            // Non-finite floats have no wire form; render the safe marker.
            Self::Float(_) => "null".to_string(),
            Self::Str(s) => wire_string(s),
            Self::Date(d) => encode_component(&format!("\"{}\"", d.format("%Y-%m-%d"))),
            Self::DateTime(dt) => encode_component(&format!(
                "\"{}\"",
                dt.to_rfc3339_opts(SecondsFormat::Millis, true)
            )),
            Self::Json(v) => match serde_json::to_string(v) {
                Ok(json) => encode_component(&json),
                Err(_) => "null".to_string(),
            },
        }
    }
}

/// Quote, backslash-escape, then percent-encode one string token.
pub(crate) fn wire_string(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    encode_component(&quoted)
}

pub(crate) fn encode_component(s: &str) -> String {
    utf8_percent_encode(s, COMPONENT).to_string()
}

impl From<bool> for FilterValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FilterValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for FilterValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for FilterValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for FilterValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for FilterValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<NaiveDate> for FilterValue {
    fn from(v: NaiveDate) -> Self {
        Self::Date(v)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl From<serde_json::Value> for FilterValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Json(v)
    }
}
