//! Data models for the response-time report.
//!
//! This module contains the record representation shared by every record
//! source, the composite join key, and the aggregated per-major results.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Category used when an application carries no usable major.
pub const UNDECLARED_MAJOR: &str = "Undeclared";

/// A single field value of a fetched document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Timestamp(DateTime<Utc>),
    String(String),
    /// Maps, arrays, references and anything else we never join on.
    Other(Value),
}

impl FieldValue {
    /// Convert a plain JSON value (as found in local exports).
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => n
                    .as_f64()
                    .map(FieldValue::Double)
                    .unwrap_or(FieldValue::Other(Value::Number(n))),
            },
            Value::String(s) => FieldValue::String(s),
            other => FieldValue::Other(other),
        }
    }

    /// Interpret the value as one half of a composite key.
    ///
    /// Non-empty strings and integers qualify, each keeping its type.
    /// Null, empty strings and every other type yield `None`.
    pub fn as_key_part(&self) -> Option<KeyPart> {
        match self {
            FieldValue::String(s) if !s.is_empty() => Some(KeyPart::Str(s.clone())),
            FieldValue::Integer(i) => Some(KeyPart::Int(*i)),
            _ => None,
        }
    }

    /// Interpret the value as a point in time.
    ///
    /// Accepts native timestamps, RFC 3339 strings, and the
    /// `{"seconds", "nanos"}` / `{"_seconds", "_nanoseconds"}` object shapes
    /// produced by Firebase exports.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            FieldValue::Timestamp(ts) => Some(*ts),
            FieldValue::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            FieldValue::Other(Value::Object(map)) => {
                let seconds = map
                    .get("seconds")
                    .or_else(|| map.get("_seconds"))
                    .and_then(json_i64)?;
                let nanos = map
                    .get("nanos")
                    .or_else(|| map.get("_nanoseconds"))
                    .and_then(json_i64)
                    .unwrap_or(0);
                let nanos = u32::try_from(nanos).ok()?;
                Utc.timestamp_opt(seconds, nanos).single()
            }
            _ => None,
        }
    }

    /// Interpret the value as a display label.
    ///
    /// Strings are trimmed and blank ones ignored. Numbers and booleans are
    /// written out; timestamps, maps and arrays give no label.
    pub fn as_label(&self) -> Option<String> {
        match self {
            FieldValue::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::Double(d) if d.is_finite() => Some(format!("{:?}", d)),
            FieldValue::Boolean(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

// Firebase exports sometimes stringify 64-bit integers.
fn json_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// A key-value record read from a collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Document {
    /// Document id, when the source exposes one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Field values by field name.
    pub fields: BTreeMap<String, FieldValue>,
}

impl Document {
    /// Builder-style field setter.
    #[cfg(test)]
    pub fn with(mut self, name: &str, value: FieldValue) -> Self {
        self.fields.insert(name.to_string(), value);
        self
    }

    /// Returns the field value, treating an explicit null as absent.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        match self.fields.get(name) {
            Some(FieldValue::Null) | None => None,
            Some(value) => Some(value),
        }
    }

    /// Build a document from a plain JSON object.
    pub fn from_json_object(id: Option<String>, object: serde_json::Map<String, Value>) -> Self {
        let fields = object
            .into_iter()
            .map(|(name, value)| (name, FieldValue::from_json(value)))
            .collect();
        Self { id, fields }
    }
}

/// One half of a composite key.
///
/// Strings and integers never compare equal, so `7` and `"7"` are
/// different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyPart {
    Int(i64),
    Str(String),
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Int(i) => write!(f, "{}", i),
            KeyPart::Str(s) => write!(f, "'{}'", s),
        }
    }
}

/// Join key shared by an application and its acceptance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CompositeKey {
    pub project_id: KeyPart,
    pub user_id: KeyPart,
}

impl CompositeKey {
    pub fn new(project_id: impl Into<KeyPart>, user_id: impl Into<KeyPart>) -> Self {
        Self {
            project_id: project_id.into(),
            user_id: user_id.into(),
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.project_id, self.user_id)
    }
}

/// Mean response time for a single major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAverage {
    /// The major (category label).
    pub category: String,
    /// Arithmetic mean of the matched intervals, in minutes.
    pub average_minutes: f64,
    /// Number of intervals that went into the mean.
    pub count: usize,
}

/// Per-major averages, in the order each major was first matched.
///
/// Only majors with at least one interval are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryAverages {
    entries: Vec<CategoryAverage>,
}

impl CategoryAverages {
    /// Compute averages from collected intervals, skipping empty groups.
    pub fn from_intervals(groups: Vec<(String, Vec<f64>)>) -> Self {
        let entries = groups
            .into_iter()
            .filter(|(_, times)| !times.is_empty())
            .map(|(category, times)| CategoryAverage {
                average_minutes: times.iter().sum::<f64>() / times.len() as f64,
                count: times.len(),
                category,
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CategoryAverage> {
        self.entries.iter()
    }

    /// Average for a major, if it has any matched intervals.
    #[cfg(test)]
    pub fn get(&self, category: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.category == category)
            .map(|e| e.average_minutes)
    }
}

impl<'a> IntoIterator for &'a CategoryAverages {
    type Item = &'a CategoryAverage;
    type IntoIter = std::slice::Iter<'a, CategoryAverage>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Counters describing how the join went.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinStats {
    /// Applications fetched.
    pub applications_seen: usize,
    /// Applications dropped for missing project or user id.
    pub applications_without_key: usize,
    /// Applications that replaced an earlier one with the same key.
    pub duplicate_application_keys: usize,
    /// Acceptances fetched.
    pub acceptances_seen: usize,
    /// Acceptances dropped for a missing key field or accepted date.
    pub acceptances_incomplete: usize,
    /// Acceptances with no application under the same key.
    pub acceptances_unmatched: usize,
    /// Matches dropped because the application has no applied date.
    pub matches_without_applied_date: usize,
    /// Matches that produced an interval.
    pub matched: usize,
}

impl JoinStats {
    /// Acceptances that did not contribute an interval.
    pub fn skipped_acceptances(&self) -> usize {
        self.acceptances_incomplete + self.acceptances_unmatched + self.matches_without_applied_date
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_part_rules() {
        assert_eq!(
            FieldValue::String("P1".to_string()).as_key_part(),
            Some(KeyPart::Str("P1".to_string()))
        );
        assert_eq!(FieldValue::Integer(42).as_key_part(), Some(KeyPart::Int(42)));
        assert_ne!(
            FieldValue::Integer(7).as_key_part(),
            FieldValue::String("7".to_string()).as_key_part()
        );
        assert_eq!(FieldValue::String(String::new()).as_key_part(), None);
        assert_eq!(FieldValue::Null.as_key_part(), None);
        assert_eq!(FieldValue::Boolean(true).as_key_part(), None);
    }

    #[test]
    fn test_timestamp_from_rfc3339_string() {
        let value = FieldValue::String("2025-03-01T10:15:00Z".to_string());
        let ts = value.as_timestamp().unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2025, 3, 1, 10, 15, 0).unwrap());

        let offset = FieldValue::String("2025-03-01T12:15:00+02:00".to_string());
        assert_eq!(offset.as_timestamp(), Some(ts));
    }

    #[test]
    fn test_timestamp_from_export_object() {
        let value = FieldValue::from_json(json!({"_seconds": 1_700_000_000, "_nanoseconds": 500}));
        let ts = value.as_timestamp().unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_nanos(), 500);

        let value = FieldValue::from_json(json!({"seconds": "1700000000"}));
        assert_eq!(value.as_timestamp().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_timestamp_rejects_other_values() {
        assert_eq!(FieldValue::String("yesterday".to_string()).as_timestamp(), None);
        assert_eq!(FieldValue::Integer(1_700_000_000).as_timestamp(), None);
        assert_eq!(FieldValue::Null.as_timestamp(), None);
    }

    #[test]
    fn test_label_ignores_blank() {
        assert_eq!(
            FieldValue::String("  CS ".to_string()).as_label().as_deref(),
            Some("CS")
        );
        assert_eq!(FieldValue::String("   ".to_string()).as_label(), None);
        assert_eq!(FieldValue::Null.as_label(), None);
    }

    #[test]
    fn test_label_writes_out_scalars() {
        assert_eq!(FieldValue::Integer(3).as_label().as_deref(), Some("3"));
        assert_eq!(FieldValue::Double(2.0).as_label().as_deref(), Some("2.0"));
        assert_eq!(FieldValue::Double(1.5).as_label().as_deref(), Some("1.5"));
        assert_eq!(FieldValue::Boolean(true).as_label().as_deref(), Some("true"));
        assert_eq!(FieldValue::Other(json!({"name": "CS"})).as_label(), None);
    }

    #[test]
    fn test_document_get_treats_null_as_absent() {
        let doc = Document::default()
            .with("major", FieldValue::Null)
            .with("project_id", FieldValue::String("P1".to_string()));
        assert!(doc.get("major").is_none());
        assert!(doc.get("missing").is_none());
        assert!(doc.get("project_id").is_some());
    }

    #[test]
    fn test_document_from_json_object() {
        let object = json!({"project_id": "P1", "count": 3, "score": 1.5, "tags": ["a"]});
        let doc = match object {
            Value::Object(map) => Document::from_json_object(Some("d1".to_string()), map),
            _ => unreachable!(),
        };
        assert_eq!(doc.id.as_deref(), Some("d1"));
        assert_eq!(doc.get("count"), Some(&FieldValue::Integer(3)));
        assert_eq!(doc.get("score"), Some(&FieldValue::Double(1.5)));
        assert!(matches!(doc.get("tags"), Some(FieldValue::Other(_))));
    }

    #[test]
    fn test_category_averages_skip_empty_groups() {
        let averages = CategoryAverages::from_intervals(vec![
            ("CS".to_string(), vec![10.0, 20.0]),
            ("Math".to_string(), vec![]),
            ("Art".to_string(), vec![5.0]),
        ]);

        assert_eq!(averages.len(), 2);
        assert_eq!(averages.get("CS"), Some(15.0));
        assert_eq!(averages.get("Art"), Some(5.0));
        assert_eq!(averages.get("Math"), None);

        let order: Vec<_> = averages.iter().map(|e| e.category.as_str()).collect();
        assert_eq!(order, vec!["CS", "Art"]);
    }

    #[test]
    fn test_composite_key_display() {
        assert_eq!(CompositeKey::new("P1", "U1").to_string(), "('P1', 'U1')");
        assert_eq!(CompositeKey::new(7, "U1").to_string(), "(7, 'U1')");
        assert_ne!(CompositeKey::new(7, "U1"), CompositeKey::new("7", "U1"));
    }

    #[test]
    fn test_skipped_acceptances_sums_drop_reasons() {
        let stats = JoinStats {
            acceptances_seen: 7,
            acceptances_incomplete: 1,
            acceptances_unmatched: 2,
            matches_without_applied_date: 1,
            matched: 3,
            ..JoinStats::default()
        };
        assert_eq!(stats.skipped_acceptances(), 4);
        assert_eq!(stats.skipped_acceptances() + stats.matched, stats.acceptances_seen);
    }
}
