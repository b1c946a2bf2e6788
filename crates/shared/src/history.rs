//! Study history records.
//!
//! One [`HistoryEntry`] exists per looked-up text. Entries are persisted as a
//! JSON array, newest first, using the field names the extension has always
//! written (`word`, `translation`, `timestamp`, `timestamps`, `ef`, ...), so
//! exports from older installs import cleanly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum number of entries kept in the store.
pub const HISTORY_LIMIT: usize = 1000;

pub const DEFAULT_EASE_FACTOR: f64 = 2.5;
pub const DEFAULT_INTERVAL_DAYS: f64 = 0.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// The selected text, matched exactly (case-sensitive).
    #[serde(rename = "word")]
    pub key: String,
    /// Most recent explanation.
    #[serde(rename = "translation")]
    pub last_value: String,
    pub first_seen_at: DateTime<Utc>,
    #[serde(rename = "timestamp")]
    pub last_seen_at: DateTime<Utc>,
    /// Every lookup of this key, oldest first.
    #[serde(rename = "timestamps")]
    pub occurrences: Vec<DateTime<Utc>>,
    /// Always `occurrences.len()`.
    pub repeat_count: u32,

    // Spaced-repetition scratch fields, carried through untouched.
    #[serde(rename = "ef")]
    pub ease_factor: f64,
    #[serde(rename = "interval")]
    pub interval_days: f64,
    #[serde(rename = "dueDate")]
    pub due_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// First lookup of a key.
    pub fn new(key: impl Into<String>, value: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            last_value: value.into(),
            first_seen_at: at,
            last_seen_at: at,
            occurrences: vec![at],
            repeat_count: 1,
            ease_factor: DEFAULT_EASE_FACTOR,
            interval_days: DEFAULT_INTERVAL_DAYS,
            due_at: at,
        }
    }

    /// Record a repeat lookup: the new explanation replaces the old one.
    pub fn record_lookup(&mut self, value: impl Into<String>, at: DateTime<Utc>) {
        self.last_value = value.into();
        self.occurrences.push(at);
        self.repeat_count = occurrence_count(&self.occurrences);
        self.last_seen_at = at;
    }
}

fn occurrence_count(occurrences: &[DateTime<Utc>]) -> u32 {
    u32::try_from(occurrences.len()).unwrap_or(u32::MAX)
}

/// Why a raw history element was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidEntry {
    #[error("item is not an object")]
    NotAnObject,

    #[error("missing string field 'word'")]
    MissingKey,

    #[error("missing string field 'translation'")]
    MissingValue,
}

/// A bulk history batch was rejected. `index` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("history item {index} is invalid: {detail}")]
pub struct ValidationError {
    pub index: usize,
    pub detail: InvalidEntry,
}

/// Turn one raw JSON element into a [`HistoryEntry`], defaulting every
/// optional field.
///
/// This is the single defaulting policy used by bulk replace, import merge and
/// reads of the persisted log:
/// - `word` and `translation` must be strings
/// - `timestamps` falls back to `[timestamp]`, then to `[now]`
/// - `repeatCount` is recomputed from the occurrence list
/// - `ef` defaults to 2.5, `interval` to 0, `dueDate` to `now`
pub fn normalize_entry(raw: &Value, now: DateTime<Utc>) -> Result<HistoryEntry, InvalidEntry> {
    let obj = raw.as_object().ok_or(InvalidEntry::NotAnObject)?;

    let key = obj
        .get("word")
        .and_then(Value::as_str)
        .ok_or(InvalidEntry::MissingKey)?;
    let value = obj
        .get("translation")
        .and_then(Value::as_str)
        .ok_or(InvalidEntry::MissingValue)?;

    let timestamp = obj.get("timestamp").and_then(parse_time);

    let mut occurrences: Vec<DateTime<Utc>> = obj
        .get("timestamps")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_time).collect())
        .unwrap_or_default();
    if occurrences.is_empty() {
        occurrences.push(timestamp.unwrap_or(now));
    }

    let last_seen_at = timestamp
        .or_else(|| occurrences.iter().max().copied())
        .unwrap_or(now);
    let first_seen_at = obj
        .get("firstSeenAt")
        .and_then(parse_time)
        .or_else(|| occurrences.first().copied())
        .unwrap_or(last_seen_at);

    Ok(HistoryEntry {
        key: key.to_string(),
        last_value: value.to_string(),
        first_seen_at,
        last_seen_at,
        repeat_count: occurrence_count(&occurrences),
        occurrences,
        ease_factor: obj
            .get("ef")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_EASE_FACTOR),
        interval_days: obj
            .get("interval")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_INTERVAL_DAYS),
        due_at: obj.get("dueDate").and_then(parse_time).unwrap_or(now),
    })
}

/// Normalize a whole batch, all-or-nothing.
pub fn normalize_batch(raw: &[Value], now: DateTime<Utc>) -> Result<Vec<HistoryEntry>, ValidationError> {
    raw.iter()
        .enumerate()
        .map(|(i, item)| {
            normalize_entry(item, now).map_err(|detail| ValidationError {
                index: i + 1,
                detail,
            })
        })
        .collect()
}

fn parse_time(value: &Value) -> Option<DateTime<Utc>> {
    let text = value.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
