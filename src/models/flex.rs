//! Lenient deserializers for catalog JSON.
//!
//! The loc.gov API returns the same field as a string on one record, a list
//! of strings on the next, and occasionally a number or `null`. Everything
//! the harvester keeps is flattened to text here so that one odd record
//! never fails a whole page.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Separator used when a field arrives as a list
pub const LIST_SEPARATOR: &str = "; ";

/// Flatten an arbitrary JSON value to display text.
///
/// Lists are joined with [`LIST_SEPARATOR`], skipping empty entries.
/// Objects and `null` become the empty string.
pub fn flatten(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items
            .iter()
            .map(flatten)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(LIST_SEPARATOR),
        Value::Null | Value::Object(_) => String::new(),
    }
}

/// `deserialize_with` helper producing a `String` from any JSON value
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(flatten(&value))
}

/// `deserialize_with` helper producing `None` for missing, null or empty values
pub fn opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let text = flatten(&value);
    Ok(if text.is_empty() { None } else { Some(text) })
}

/// Like [`opt_text`], but a plain string is kept exactly as received
pub fn opt_raw_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let text = match value {
        Value::String(s) => s,
        other => flatten(&other),
    };
    Ok(if text.is_empty() { None } else { Some(text) })
}

/// `deserialize_with` helper for counters that may arrive as strings
pub fn opt_count<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}
