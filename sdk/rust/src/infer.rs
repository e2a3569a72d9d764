//! Sampling-based schema inference
//!
//! The service has no schema endpoint, so field types are approximated by
//! sampling records and merging per-field observations. Classification runs
//! ordered pattern checks (geometry before generic string matching, file
//! markers before ref markers on objects); conflicting observations resolve
//! by a fixed priority that favors the lossless textual form.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::client::ServiceClient;
use crate::error::Result;
use crate::query::Query;

/// Default number of records sampled per model.
pub const DEFAULT_SAMPLE_SIZE: u32 = 100;

/// Observed value type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TypeTag {
    Unknown,
    String,
    Integer,
    Number,
    Boolean,
    Date,
    DateTime,
    Geometry,
    Ref,
    Url,
    File,
    Array,
    Object,
}

impl TypeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Geometry => "geometry",
            Self::Ref => "ref",
            Self::Url => "url",
            Self::File => "file",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn wkt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(SRID=\d+;)?\s*(POINT|LINESTRING|POLYGON|MULTIPOINT|MULTILINESTRING|MULTIPOLYGON|GEOMETRYCOLLECTION)\s*\(",
        )
        .expect("invalid wkt regex")
    })
}

fn uuid_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
            .expect("invalid uuid regex")
    })
}

fn datetime_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}[T ]\d{2}:\d{2}").expect("invalid datetime regex"))
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("invalid date regex"))
}

fn file_ext_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.[A-Za-z0-9]{1,5}$").expect("invalid extension regex"))
}

/// Classifies one value into a [`TypeTag`]. `null` observations are
/// `Unknown` and get dropped during resolution when anything concrete was
/// seen.
pub fn classify_value(value: &Value) -> TypeTag {
    match value {
        Value::Null => TypeTag::Unknown,
        Value::Bool(_) => TypeTag::Boolean,
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                TypeTag::Integer
            } else {
                TypeTag::Number
            }
        }
        Value::String(s) => classify_string(s),
        Value::Array(_) => TypeTag::Array,
        Value::Object(map) => classify_object(map),
    }
}

fn classify_string(s: &str) -> TypeTag {
    // Well-known-text geometry before any generic string matching.
    if wkt_re().is_match(s) {
        return TypeTag::Geometry;
    }
    if uuid_re().is_match(s) {
        return TypeTag::Ref;
    }
    if datetime_re().is_match(s) {
        return TypeTag::DateTime;
    }
    if date_re().is_match(s) {
        return TypeTag::Date;
    }
    if let Some(rest) = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"))
        && !rest.is_empty()
    {
        let path = rest.split_once('/').map(|(_, p)| p).unwrap_or("");
        let path = path.split(['?', '#']).next().unwrap_or("");
        let last_segment = path.rsplit('/').next().unwrap_or("");
        if file_ext_re().is_match(last_segment) {
            return TypeTag::File;
        }
        return TypeTag::Url;
    }
    TypeTag::String
}

// File markers are checked before ref markers: attachment objects may also
// carry an `_id`.
fn classify_object(map: &serde_json::Map<String, Value>) -> TypeTag {
    let has_url = matches!(map.get("url"), Some(Value::String(_)));
    let has_name = matches!(map.get("name"), Some(Value::String(_)));
    if has_url && has_name {
        return TypeTag::File;
    }
    if matches!(map.get("_id"), Some(Value::String(_))) {
        return TypeTag::Ref;
    }
    TypeTag::Object
}

/// Resolves the tags observed for one field to a single final tag.
///
/// `Unknown` is dropped when any concrete tag exists; a single remaining
/// tag wins outright; conflicts resolve by fixed priority
/// `ref > string > datetime > date > number > integer`, else `string`.
/// The order is a carried-over heuristic — a boolean/string conflict, for
/// example, lands on `string` via the fallback, not by design.
pub fn resolve_tags(tags: &BTreeSet<TypeTag>) -> TypeTag {
    let concrete: Vec<TypeTag> = tags
        .iter()
        .copied()
        .filter(|t| *t != TypeTag::Unknown)
        .collect();
    match concrete.as_slice() {
        [] => TypeTag::Unknown,
        [single] => *single,
        _ => {
            for candidate in [
                TypeTag::Ref,
                TypeTag::String,
                TypeTag::DateTime,
                TypeTag::Date,
                TypeTag::Number,
                TypeTag::Integer,
            ] {
                if concrete.contains(&candidate) {
                    return candidate;
                }
            }
            TypeTag::String
        }
    }
}

/// Samples up to `sample_size` records of `model` and infers one tag per
/// non-internal field (leading-underscore fields are skipped).
pub async fn infer_schema(
    client: &ServiceClient,
    model: &str,
    sample_size: u32,
) -> Result<BTreeMap<String, TypeTag>> {
    let query = Query::new().limit(u64::from(sample_size.max(1)));
    let records = client.get_all(model, &query).await?;

    let mut observed: BTreeMap<String, BTreeSet<TypeTag>> = BTreeMap::new();
    for record in &records {
        let Some(fields) = record.as_object() else {
            continue;
        };
        for (name, value) in fields {
            if name.starts_with('_') {
                continue;
            }
            observed
                .entry(name.clone())
                .or_default()
                .insert(classify_value(value));
        }
    }

    tracing::debug!(model, sampled = records.len(), fields = observed.len(), "inferred schema");
    Ok(observed
        .into_iter()
        .map(|(name, tags)| (name, resolve_tags(&tags)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tags(list: &[TypeTag]) -> BTreeSet<TypeTag> {
        list.iter().copied().collect()
    }

    #[test]
    fn classifies_scalars() {
        assert_eq!(classify_value(&json!(null)), TypeTag::Unknown);
        assert_eq!(classify_value(&json!(true)), TypeTag::Boolean);
        assert_eq!(classify_value(&json!(100)), TypeTag::Integer);
        assert_eq!(classify_value(&json!(1.5)), TypeTag::Number);
        assert_eq!(classify_value(&json!("plain text")), TypeTag::String);
        assert_eq!(classify_value(&json!([1, 2])), TypeTag::Array);
    }

    #[test]
    fn classifies_dates_by_iso_prefix() {
        assert_eq!(classify_value(&json!("2024-01-15")), TypeTag::Date);
        assert_eq!(
            classify_value(&json!("2024-01-15T10:30:00Z")),
            TypeTag::DateTime
        );
        assert_eq!(
            classify_value(&json!("2024-01-15 10:30:00")),
            TypeTag::DateTime
        );
        // Not a bare ISO date: trailing text
        assert_eq!(classify_value(&json!("2024-01-15ish")), TypeTag::String);
    }

    #[test]
    fn classifies_geometry_before_strings() {
        assert_eq!(classify_value(&json!("POINT (30 10)")), TypeTag::Geometry);
        assert_eq!(
            classify_value(&json!("SRID=4326;POLYGON ((30 10, 40 40, 20 40, 30 10))")),
            TypeTag::Geometry
        );
        assert_eq!(
            classify_value(&json!("MultiPoint ((10 40), (40 30))")),
            TypeTag::Geometry
        );
    }

    #[test]
    fn classifies_uuid_strings_as_refs() {
        assert_eq!(
            classify_value(&json!("6f1c1a2e-8b3d-4c5e-9f0a-1b2c3d4e5f6a")),
            TypeTag::Ref
        );
    }

    #[test]
    fn classifies_urls_and_files() {
        assert_eq!(
            classify_value(&json!("https://cdn.example.com/docs/report.pdf")),
            TypeTag::File
        );
        assert_eq!(
            classify_value(&json!("https://example.com/dashboard")),
            TypeTag::Url
        );
        assert_eq!(classify_value(&json!("https://example.com")), TypeTag::Url);
    }

    #[test]
    fn object_file_markers_win_over_ref_markers() {
        let attachment = json!({"_id": "abc", "url": "https://x/y.png", "name": "y.png"});
        assert_eq!(classify_value(&attachment), TypeTag::File);

        let reference = json!({"_id": "abc"});
        assert_eq!(classify_value(&reference), TypeTag::Ref);

        let plain = json!({"a": 1});
        assert_eq!(classify_value(&plain), TypeTag::Object);
    }

    #[test]
    fn all_null_stays_unknown() {
        assert_eq!(resolve_tags(&tags(&[TypeTag::Unknown])), TypeTag::Unknown);
    }

    #[test]
    fn unknown_is_dropped_when_concrete_exists() {
        assert_eq!(
            resolve_tags(&tags(&[TypeTag::Unknown, TypeTag::Integer])),
            TypeTag::Integer
        );
        assert_eq!(
            resolve_tags(&tags(&[TypeTag::Unknown, TypeTag::Date, TypeTag::Unknown])),
            TypeTag::Date
        );
    }

    #[test]
    fn string_wins_numeric_conflicts() {
        assert_eq!(
            resolve_tags(&tags(&[TypeTag::Integer, TypeTag::String])),
            TypeTag::String
        );
    }

    #[test]
    fn priority_order_is_fixed() {
        assert_eq!(
            resolve_tags(&tags(&[TypeTag::Ref, TypeTag::String])),
            TypeTag::Ref
        );
        assert_eq!(
            resolve_tags(&tags(&[TypeTag::Date, TypeTag::DateTime])),
            TypeTag::DateTime
        );
        assert_eq!(
            resolve_tags(&tags(&[TypeTag::Integer, TypeTag::Number])),
            TypeTag::Number
        );
    }

    #[test]
    fn unprioritized_conflicts_fall_back_to_string() {
        assert_eq!(
            resolve_tags(&tags(&[TypeTag::Boolean, TypeTag::Array])),
            TypeTag::String
        );
    }
}
