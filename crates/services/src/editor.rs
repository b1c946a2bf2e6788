//! Raw JSON editing of the history log.
//!
//! The editor works on text. Nothing here touches the store: saving goes
//! through [`HistoryStore::replace_all`](crate::history_store::HistoryStore::replace_all).

use serde_json::Value;
use shared::history::HistoryEntry;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EditorError {
    #[error("无效的JSON格式: {0}")]
    InvalidJson(String),

    #[error("顶层结构必须是JSON数组。")]
    NotAnArray,

    #[error("JSON序列化失败: {0}")]
    Encode(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatOutcome {
    /// The editor was blank; nothing to do.
    Empty,
    Formatted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchOutcome {
    pub text: String,
    /// `None` when the query was blank and the text was only re-indented.
    pub matches: Option<usize>,
}

/// History as editor text, two-space indented.
pub fn render_history(entries: &[HistoryEntry]) -> Result<String, EditorError> {
    serde_json::to_string_pretty(entries).map_err(encode_error)
}

pub fn format_json(text: &str) -> Result<FormatOutcome, EditorError> {
    if text.trim().is_empty() {
        return Ok(FormatOutcome::Empty);
    }
    let value = parse(text)?;
    Ok(FormatOutcome::Formatted(pretty(&value)?))
}

/// Parse editor text that must hold an array of history items.
pub fn parse_history_array(text: &str) -> Result<Vec<Value>, EditorError> {
    match parse(text)? {
        Value::Array(items) => Ok(items),
        _ => Err(EditorError::NotAnArray),
    }
}

/// Keep items whose `word` or `translation` contains `query`, ignoring case.
pub fn search_json(text: &str, query: &str) -> Result<SearchOutcome, EditorError> {
    let items = parse_history_array(text)?;
    let query = query.trim().to_lowercase();

    if query.is_empty() {
        return Ok(SearchOutcome {
            text: pretty(&Value::Array(items))?,
            matches: None,
        });
    }

    let field_matches = |item: &Value, field: &str| {
        item.get(field)
            .and_then(Value::as_str)
            .map(|s| s.to_lowercase().contains(&query))
            .unwrap_or(false)
    };
    let filtered: Vec<Value> = items
        .into_iter()
        .filter(|item| field_matches(item, "word") || field_matches(item, "translation"))
        .collect();

    Ok(SearchOutcome {
        matches: Some(filtered.len()),
        text: pretty(&Value::Array(filtered))?,
    })
}

fn parse(text: &str) -> Result<Value, EditorError> {
    serde_json::from_str(text).map_err(|e| EditorError::InvalidJson(e.to_string()))
}

fn pretty(value: &Value) -> Result<String, EditorError> {
    serde_json::to_string_pretty(value).map_err(encode_error)
}

fn encode_error(e: serde_json::Error) -> EditorError {
    EditorError::Encode(e.to_string())
}
