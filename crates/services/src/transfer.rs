//! History export and import files.

use chrono::NaiveDate;
use serde_json::Value;
use shared::history::HistoryEntry;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::history_store::{HistoryError, HistoryStore, MergeReport};

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("没有历史记录可以导出。")]
    NothingToExport,

    #[error("导入失败：文件格式错误或非JSON文件。 ({0})")]
    NotJson(#[source] serde_json::Error),

    #[error("导入失败：JSON文件内容不是有效的历史记录格式。")]
    NotAnArray,

    #[error("导出失败: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("file I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    History(#[from] HistoryError),
}

/// `bainian_history_export_YYYY-MM-DD.json`
pub fn export_file_name(date: NaiveDate) -> String {
    format!("bainian_history_export_{}.json", date.format("%Y-%m-%d"))
}

/// Pretty-printed JSON array of the given entries.
pub fn export_json(entries: &[HistoryEntry]) -> Result<String, TransferError> {
    if entries.is_empty() {
        return Err(TransferError::NothingToExport);
    }
    serde_json::to_string_pretty(entries).map_err(TransferError::Encode)
}

/// Write the export file into `dir` and return its path.
pub async fn write_export(dir: &Path, entries: &[HistoryEntry], date: NaiveDate) -> Result<PathBuf, TransferError> {
    let json = export_json(entries)?;
    let path = dir.join(export_file_name(date));
    tokio::fs::write(&path, json)
        .await
        .map_err(|source| TransferError::Io {
            path: path.clone(),
            source,
        })?;
    info!(path = %path.display(), count = entries.len(), "history exported");
    Ok(path)
}

/// Parse an import file's contents. The top level must be an array.
pub fn parse_import(text: &str) -> Result<Vec<Value>, TransferError> {
    match serde_json::from_str::<Value>(text).map_err(TransferError::NotJson)? {
        Value::Array(items) => Ok(items),
        _ => Err(TransferError::NotAnArray),
    }
}

/// Read `path` and merge its entries into the store.
pub async fn import_file(history: &HistoryStore, path: &Path) -> Result<MergeReport, TransferError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| TransferError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    let items = parse_import(&text)?;
    Ok(history.merge(&items).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_export_file_name() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 7).unwrap();
        assert_eq!(export_file_name(date), "bainian_history_export_2025-03-07.json");
    }

    #[test]
    fn test_empty_export_is_refused() {
        assert!(matches!(export_json(&[]), Err(TransferError::NothingToExport)));
    }

    #[test]
    fn test_import_requires_array() {
        assert!(matches!(parse_import(r#"{"word":"a"}"#), Err(TransferError::NotAnArray)));
        assert!(matches!(parse_import("not json"), Err(TransferError::NotJson(_))));
        assert_eq!(parse_import("[]").unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_export_then_import_file() {
        let dir = TempDir::new().unwrap();
        let source = HistoryStore::new(Arc::new(MemoryStore::new()));
        let t = Utc.with_ymd_and_hms(2025, 3, 7, 9, 0, 0).unwrap();
        source.upsert("apple", "苹果", t).await.unwrap();
        source.upsert("pear", "梨", t).await.unwrap();

        let entries = source.get_all().await;
        let path = write_export(dir.path(), &entries, t.date_naive()).await.unwrap();
        assert!(path.ends_with("bainian_history_export_2025-03-07.json"));

        let target = HistoryStore::new(Arc::new(MemoryStore::new()));
        let report = import_file(&target, &path).await.unwrap();
        assert_eq!(report.imported_count, 2);
        assert_eq!(report.duplicate_count, 0);

        let again = import_file(&target, &path).await.unwrap();
        assert_eq!(again.imported_count, 0);
        assert_eq!(again.duplicate_count, 2);
    }
}
