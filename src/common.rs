//! Record types shared by the extractors, the reconciler and the writer.
//!
//! Raw inputs are schema-on-read: every field may be absent or `null`, and
//! numeric fields sometimes arrive as strings. The lenient deserializers below
//! accept both spellings and only fail on values that cannot be coerced at all
//! (an object where a scalar is expected, a non-numeric string in a numeric
//! field). Those failures surface as `MalformedRecord` and abort the run.

use std::hash::Hash;

use indexmap::IndexMap;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ============================================================================
// Raw records
// ============================================================================

/// One track-metadata record from the song catalog.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CatalogEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub artist_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub artist_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub artist_location: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub artist_latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub artist_longitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub song_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub year: Option<i64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub duration: Option<f64>,
}

/// One user-activity event from the log stream.
///
/// `user_id` is kept as the source text: the users table casts it to an
/// integer while the songplays table carries it through uncast.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEvent {
    #[serde(default, deserialize_with = "lenient_string")]
    pub page: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub first_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub level: Option<String>,
    /// Epoch milliseconds.
    #[serde(default, deserialize_with = "lenient_i64")]
    pub ts: Option<i64>,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub session_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub user_agent: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub artist: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub song: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub length: Option<f64>,
}

// ============================================================================
// Derived rows
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArtistRow {
    pub artist_id: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongRow {
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub artist_id: Option<String>,
    pub year: Option<i64>,
    pub duration: Option<f64>,
}

/// A fully populated user row. Rows with any null field never reach this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct UserRow {
    pub user_id: i32,
    pub first_name: String,
    pub last_name: String,
    pub gender: String,
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TimeRow {
    pub start_time: String,
    pub hour: i32,
    pub day: i32,
    pub week: i32,
    pub month: i32,
    pub year: i32,
    pub weekday: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SongplayFact {
    pub songplay_id: i64,
    pub start_time: Option<String>,
    pub user_id: Option<String>,
    pub level: Option<String>,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: Option<i32>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
    pub year: Option<i32>,
    pub month: Option<i32>,
}

// ============================================================================
// Helpers
// ============================================================================

/// Keep one row per key. The first row seen for a key survives; later rows
/// with the same key are discarded even if their other fields differ.
/// Output order is the order in which keys were first seen.
pub fn dedup_first_seen<T, K, F>(rows: impl IntoIterator<Item = T>, key: F) -> Vec<T>
where
    K: Hash + Eq,
    F: Fn(&T) -> K,
{
    let mut survivors: IndexMap<K, T> = IndexMap::new();
    for row in rows {
        survivors.entry(key(&row)).or_insert(row);
    }
    survivors.into_values().collect()
}

/// Cast text to a 32-bit integer the way a lenient SQL cast does: surrounding
/// whitespace is ignored, a fractional part is truncated, and anything
/// unparseable or out of range becomes `None`.
pub fn cast_to_int(text: &str) -> Option<i32> {
    let trimmed = text.trim();
    if let Ok(v) = trimmed.parse::<i32>() {
        return Some(v);
    }
    let v = trimmed.parse::<f64>().ok()?;
    if !v.is_finite() {
        return None;
    }
    let truncated = v.trunc();
    if truncated < i32::MIN as f64 || truncated > i32::MAX as f64 {
        return None;
    }
    Some(truncated as i32)
}

// ============================================================================
// Lenient deserializers
// ============================================================================

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a scalar value, found {other}"
        ))),
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected a number, found \"{s}\""))),
        Some(other) => Err(D::Error::custom(format!(
            "expected a number, found {other}"
        ))),
    }
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(v) = n.as_i64() {
                Ok(Some(v))
            } else {
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => Ok(Some(f as i64)),
                    _ => Err(D::Error::custom(format!("expected an integer, found {n}"))),
                }
            }
        }
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected an integer, found \"{s}\""))),
        Some(other) => Err(D::Error::custom(format!(
            "expected an integer, found {other}"
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================
