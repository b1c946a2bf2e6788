//! Persisted lookup history.
//!
//! The log lives under one key of the local storage area as a JSON array,
//! newest first, capped at [`HISTORY_LIMIT`] entries. Every mutation is a
//! read-modify-write of the whole array, serialized by a write gate so two
//! lookups finishing at once cannot drop each other's update.
//!
//! Stored items that fail to normalize are hidden from readers but written
//! back untouched by every mutation, so only a clear or the cap removes them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use shared::history::{normalize_batch, normalize_entry, HistoryEntry, ValidationError, HISTORY_LIMIT};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::storage::{KeyValueStore, StoreError};

pub const HISTORY_KEY: &str = "history";

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("stored history is not a JSON array")]
    NotAnArray,
}

/// One position of the stored array.
#[derive(Debug, Clone)]
enum Slot {
    Entry(HistoryEntry),
    /// Unreadable or shadowed item, carried through as stored.
    Kept(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub imported_count: usize,
    pub duplicate_count: usize,
}

pub struct HistoryStore {
    store: Arc<dyn KeyValueStore>,
    write_gate: tokio::sync::Mutex<()>,
    limit: usize,
}

impl HistoryStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_gate: tokio::sync::Mutex::new(()),
            limit: HISTORY_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// All entries, most recently touched first. Empty when nothing is
    /// stored or the stored log cannot be read.
    pub async fn get_all(&self) -> Vec<HistoryEntry> {
        match self.load().await {
            Ok(slots) => slots
                .into_iter()
                .filter_map(|slot| match slot {
                    Slot::Entry(entry) => Some(entry),
                    Slot::Kept(_) => None,
                })
                .collect(),
            Err(e) => {
                warn!(error = %e, "failed to read history, treating as empty");
                Vec::new()
            }
        }
    }

    /// Record a successful lookup. Existing keys are refreshed and moved to
    /// the front; new keys are inserted at the front.
    pub async fn upsert(&self, key: &str, value: &str, occurred_at: DateTime<Utc>) -> Result<(), HistoryError> {
        let _guard = self.write_gate.lock().await;
        let mut slots = self.load().await?;

        let existing = slots
            .iter()
            .position(|slot| matches!(slot, Slot::Entry(e) if e.key == key));
        let entry = match existing.map(|idx| slots.remove(idx)) {
            Some(Slot::Entry(mut entry)) => {
                entry.record_lookup(value, occurred_at);
                debug!(key, repeat_count = entry.repeat_count, "history entry refreshed");
                entry
            }
            _ => {
                debug!(key, "history entry created");
                HistoryEntry::new(key, value, occurred_at)
            }
        };
        slots.insert(0, Slot::Entry(entry));

        Ok(self.save(slots).await?)
    }

    /// Replace the whole log with an edited copy, all-or-nothing.
    ///
    /// The supplied order is taken as newest first: later duplicates of a key
    /// are dropped and only the first `limit` entries are kept.
    pub async fn replace_all(&self, raw: &[Value]) -> Result<usize, HistoryError> {
        let batch = normalize_batch(raw, Utc::now())?;

        let mut seen = HashSet::new();
        let mut entries = Vec::with_capacity(batch.len());
        for entry in batch {
            if seen.insert(entry.key.clone()) {
                entries.push(Slot::Entry(entry));
            } else {
                warn!(key = %entry.key, "dropping repeated key in replacement batch");
            }
        }

        let _guard = self.write_gate.lock().await;
        let kept = entries.len().min(self.limit);
        self.save(entries).await?;
        info!(count = kept, "history replaced");
        Ok(kept)
    }

    /// Add imported entries without touching existing ones.
    ///
    /// Keys already present, and repeats within the batch, count as
    /// duplicates. New entries are pushed to the front in batch order.
    pub async fn merge(&self, raw: &[Value]) -> Result<MergeReport, HistoryError> {
        let batch = normalize_batch(raw, Utc::now())?;

        let _guard = self.write_gate.lock().await;
        let mut slots = self.load().await?;
        let mut known: HashSet<String> = slots
            .iter()
            .filter_map(|slot| match slot {
                Slot::Entry(e) => Some(e.key.clone()),
                Slot::Kept(_) => None,
            })
            .collect();
        let mut report = MergeReport::default();

        for entry in batch {
            if known.contains(&entry.key) {
                report.duplicate_count += 1;
                continue;
            }
            known.insert(entry.key.clone());
            slots.insert(0, Slot::Entry(entry));
            report.imported_count += 1;
        }

        self.save(slots).await?;
        info!(
            imported = report.imported_count,
            duplicates = report.duplicate_count,
            "history merged"
        );
        Ok(report)
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.write_gate.lock().await;
        self.save(Vec::new()).await?;
        info!("history cleared");
        Ok(())
    }

    async fn load(&self) -> Result<Vec<Slot>, HistoryError> {
        let Some(value) = self.store.get(HISTORY_KEY).await? else {
            return Ok(Vec::new());
        };
        let Value::Array(items) = value else {
            return Err(HistoryError::NotAnArray);
        };

        let now = Utc::now();
        let mut seen = HashSet::new();
        let slots = items
            .into_iter()
            .map(|item| match normalize_entry(&item, now) {
                Ok(entry) if seen.insert(entry.key.clone()) => Slot::Entry(entry),
                Ok(entry) => {
                    warn!(key = %entry.key, "repeated history key, keeping the later item as stored");
                    Slot::Kept(item)
                }
                Err(e) => {
                    warn!(error = %e, "unreadable history item, keeping it as stored");
                    Slot::Kept(item)
                }
            })
            .collect();
        Ok(slots)
    }

    async fn save(&self, mut slots: Vec<Slot>) -> Result<(), StoreError> {
        slots.truncate(self.limit);
        let items = slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Entry(entry) => serde_json::to_value(entry),
                Slot::Kept(raw) => Ok(raw),
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.store.set(HISTORY_KEY, Value::Array(items)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn store() -> HistoryStore {
        HistoryStore::new(Arc::new(MemoryStore::new()))
    }

    fn keys(entries: &[HistoryEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.key.as_str()).collect()
    }

    #[tokio::test]
    async fn test_empty_store_reads_empty() {
        assert!(store().get_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_same_key_twice() {
        let history = store();
        history.upsert("apple", "first", at(0)).await.unwrap();
        history.upsert("apple", "second", at(1)).await.unwrap();

        let entries = history.get_all().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].repeat_count, 2);
        assert_eq!(entries[0].occurrences.len(), 2);
        assert_eq!(entries[0].last_value, "second");
        assert_eq!(entries[0].last_seen_at, at(1));
    }

    #[tokio::test]
    async fn test_upsert_moves_entry_to_front() {
        let history = store();
        history.upsert("apple", "a", at(0)).await.unwrap();
        history.upsert("banana", "b", at(1)).await.unwrap();
        history.upsert("cherry", "c", at(2)).await.unwrap();
        assert_eq!(keys(&history.get_all().await), vec!["cherry", "banana", "apple"]);

        history.upsert("apple", "a2", at(3)).await.unwrap();
        assert_eq!(keys(&history.get_all().await), vec!["apple", "cherry", "banana"]);
    }

    #[tokio::test]
    async fn test_keys_are_case_sensitive() {
        let history = store();
        history.upsert("Apple", "a", at(0)).await.unwrap();
        history.upsert("apple", "a", at(1)).await.unwrap();
        assert_eq!(history.get_all().await.len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_drops_oldest_past_limit() {
        let history = store().with_limit(3);
        for (i, key) in ["a", "b", "c", "d"].iter().enumerate() {
            history.upsert(key, "v", at(i as i64)).await.unwrap();
        }
        assert_eq!(keys(&history.get_all().await), vec!["d", "c", "b"]);
    }

    #[tokio::test]
    async fn test_default_limit_is_enforced() {
        let history = store();
        let raw: Vec<Value> = (0..1005)
            .map(|i| json!({"word": format!("w{i}"), "translation": "t"}))
            .collect();
        assert_eq!(history.replace_all(&raw).await.unwrap(), 1000);

        let entries = history.get_all().await;
        assert_eq!(entries.len(), 1000);
        assert_eq!(entries[0].key, "w0");
        assert_eq!(entries[999].key, "w999");

        history.upsert("fresh", "t", at(0)).await.unwrap();
        let entries = history.get_all().await;
        assert_eq!(entries.len(), 1000);
        assert_eq!(entries[0].key, "fresh");
        assert_eq!(entries[999].key, "w998");
    }

    #[tokio::test]
    async fn test_replace_all_rejects_whole_batch() {
        let history = store();
        history.upsert("apple", "苹果", at(0)).await.unwrap();
        let before = history.get_all().await;

        let raw = vec![
            json!({"word": "kiwi", "translation": "猕猴桃"}),
            json!({"word": "pear", "translation": "梨"}),
            json!({"word": "plum"}),
            json!({"translation": "no key"}),
        ];
        let err = history.replace_all(&raw).await.unwrap_err();
        match err {
            HistoryError::Validation(v) => assert_eq!(v.index, 3),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(history.get_all().await, before);
    }

    #[tokio::test]
    async fn test_replace_all_defaults_and_dedupes() {
        let history = store();
        let raw = vec![
            json!({"word": "kiwi", "translation": "new", "ef": 1.9}),
            json!({"word": "kiwi", "translation": "old"}),
        ];
        assert_eq!(history.replace_all(&raw).await.unwrap(), 1);

        let entries = history.get_all().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].last_value, "new");
        assert_eq!(entries[0].ease_factor, 1.9);
        assert_eq!(entries[0].repeat_count, 1);
    }

    #[tokio::test]
    async fn test_merge_never_overwrites() {
        let history = store();
        history.upsert("apple", "original", at(0)).await.unwrap();

        let raw = vec![
            json!({"word": "apple", "translation": "imported"}),
            json!({"word": "banana", "translation": "香蕉"}),
        ];
        let report = history.merge(&raw).await.unwrap();
        assert_eq!(
            report,
            MergeReport {
                imported_count: 1,
                duplicate_count: 1
            }
        );

        let entries = history.get_all().await;
        assert_eq!(keys(&entries), vec!["banana", "apple"]);
        assert_eq!(entries[1].last_value, "original");
    }

    #[tokio::test]
    async fn test_merge_counts_repeats_within_batch() {
        let history = store();
        let raw = vec![
            json!({"word": "kiwi", "translation": "1"}),
            json!({"word": "pear", "translation": "2"}),
            json!({"word": "kiwi", "translation": "3"}),
        ];
        let report = history.merge(&raw).await.unwrap();
        assert_eq!(report.imported_count, 2);
        assert_eq!(report.duplicate_count, 1);

        let entries = history.get_all().await;
        // each new entry is pushed to the front in batch order
        assert_eq!(keys(&entries), vec!["pear", "kiwi"]);
        assert_eq!(entries[1].last_value, "1");
    }

    #[tokio::test]
    async fn test_merge_applies_limit() {
        let history = store().with_limit(2);
        history.upsert("old", "v", at(0)).await.unwrap();
        let raw = vec![
            json!({"word": "a", "translation": "1"}),
            json!({"word": "b", "translation": "2"}),
        ];
        history.merge(&raw).await.unwrap();
        assert_eq!(keys(&history.get_all().await), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_merge_rejects_invalid_batch() {
        let history = store();
        let raw = vec![json!({"word": "a", "translation": "1"}), json!(42)];
        assert!(matches!(
            history.merge(&raw).await,
            Err(HistoryError::Validation(ValidationError { index: 2, .. }))
        ));
        assert!(history.get_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_export_then_merge_into_empty_store() {
        let source = store();
        for (i, key) in ["alpha", "beta", "gamma"].iter().enumerate() {
            source.upsert(key, "v", at(i as i64)).await.unwrap();
        }
        source.upsert("beta", "v2", at(9)).await.unwrap();
        let exported = serde_json::to_value(source.get_all().await).unwrap();
        let Value::Array(items) = exported else {
            panic!("export is not an array");
        };

        let target = store();
        let report = target.merge(&items).await.unwrap();
        assert_eq!(report.imported_count, 3);
        assert_eq!(report.duplicate_count, 0);

        let mut left = source.get_all().await;
        let mut right = target.get_all().await;
        left.sort_by(|a, b| a.key.cmp(&b.key));
        right.sort_by(|a, b| a.key.cmp(&b.key));
        assert_eq!(left, right);
    }

    #[tokio::test]
    async fn test_concurrent_upserts_are_not_lost() {
        let history = Arc::new(store());
        let mut handles = Vec::new();
        for i in 0..20 {
            let history = history.clone();
            handles.push(tokio::spawn(async move {
                history.upsert("apple", &format!("v{i}"), at(i)).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        let entries = history.get_all().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].repeat_count, 20);
    }

    #[tokio::test]
    async fn test_upsert_keeps_unreadable_items() {
        let raw = Arc::new(MemoryStore::new());
        raw.set(
            HISTORY_KEY,
            json!([
                {"word": "apple", "translation": "苹果"},
                {"word": "legacy", "translation": 42},
                {"word": "apple", "translation": "shadowed"}
            ]),
        )
        .await
        .unwrap();
        let history = HistoryStore::new(raw.clone());
        assert_eq!(keys(&history.get_all().await), vec!["apple"]);

        history.upsert("pear", "梨", at(0)).await.unwrap();
        assert_eq!(keys(&history.get_all().await), vec!["pear", "apple"]);

        let Some(Value::Array(items)) = raw.get(HISTORY_KEY).await.unwrap() else {
            panic!("history is not an array");
        };
        assert_eq!(items.len(), 4);
        assert_eq!(items[2], json!({"word": "legacy", "translation": 42}));
        assert_eq!(items[3], json!({"word": "apple", "translation": "shadowed"}));

        let report = history
            .merge(&[json!({"word": "kiwi", "translation": "猕猴桃"})])
            .await
            .unwrap();
        assert_eq!(report.imported_count, 1);
        let Some(Value::Array(items)) = raw.get(HISTORY_KEY).await.unwrap() else {
            panic!("history is not an array");
        };
        assert!(items.contains(&json!({"word": "legacy", "translation": 42})));
    }

    #[tokio::test]
    async fn test_mutations_refuse_non_array_history() {
        let raw = Arc::new(MemoryStore::new());
        raw.set(HISTORY_KEY, json!({"word": "apple"})).await.unwrap();
        let history = HistoryStore::new(raw.clone());
        assert!(history.get_all().await.is_empty());

        assert!(matches!(
            history.upsert("pear", "梨", at(0)).await,
            Err(HistoryError::NotAnArray)
        ));
        assert!(matches!(
            history.merge(&[json!({"word": "kiwi", "translation": "t"})]).await,
            Err(HistoryError::NotAnArray)
        ));
        assert_eq!(raw.get(HISTORY_KEY).await.unwrap(), Some(json!({"word": "apple"})));

        history.clear().await.unwrap();
        history.upsert("pear", "梨", at(0)).await.unwrap();
        assert_eq!(keys(&history.get_all().await), vec!["pear"]);
    }

    #[tokio::test]
    async fn test_clear() {
        let history = store();
        history.upsert("apple", "a", at(0)).await.unwrap();
        history.clear().await.unwrap();
        assert!(history.get_all().await.is_empty());
    }
}
