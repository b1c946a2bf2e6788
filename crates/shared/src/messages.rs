//! Messages exchanged between surfaces and the background coordinator.
//!
//! One closed enum per direction. Every enum is tagged with a `"type"` field
//! on the wire so payloads stay compatible with the extension's message bus.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::history::HistoryEntry;
use crate::outcome::TranslationOutcome;

/// Coordinator → page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageMessage {
    ShowTranslationResult(ResultNotice),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultNotice {
    Translation { text: String, translation: String },
    Error { error: String },
}

impl PageMessage {
    pub fn from_outcome(outcome: &TranslationOutcome) -> Self {
        let notice = match outcome {
            TranslationOutcome::Success {
                original_text,
                explanation,
            } => ResultNotice::Translation {
                text: original_text.clone(),
                translation: explanation.clone(),
            },
            TranslationOutcome::Failure { reason } => ResultNotice::Error {
                error: reason.user_message(),
            },
        };
        PageMessage::ShowTranslationResult(notice)
    }
}

/// Acknowledgement returned by a page receiver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageAck {
    pub received: bool,
}

impl PageAck {
    pub fn received() -> Self {
        Self { received: true }
    }
}

/// Page → coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PageRequest {
    /// Sent once when the page receiver finishes initializing.
    ContentScriptReady,
}

/// Popup / options → coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuntimeRequest {
    GetHistory,
    /// Replace the whole log with an edited copy (raw JSON, validated on arrival).
    UpdateHistory { history: Vec<Value> },
    /// Merge an imported file without overwriting existing keys.
    ImportHistory { history: Vec<Value> },
    ClearHistory,
    TestApiConnection {
        #[serde(rename = "apiKey")]
        api_key: String,
        #[serde(rename = "apiEndpoint", default)]
        api_endpoint: Option<String>,
    },
}

/// Serialize-only: the untagged shapes overlap.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RuntimeResponse {
    History {
        history: Vec<HistoryEntry>,
    },
    Import {
        success: bool,
        #[serde(rename = "importedCount")]
        imported_count: usize,
        #[serde(rename = "duplicateCount")]
        duplicate_count: usize,
    },
    Connection(ConnectionReport),
    Status {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl RuntimeResponse {
    pub fn ok() -> Self {
        RuntimeResponse::Status {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        RuntimeResponse::Status {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Outcome of a diagnostic request against the configured endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionReport {
    #[serde(rename = "success")]
    pub ok: bool,
    #[serde(rename = "status", default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(rename = "response", default, skip_serializing_if = "Option::is_none")]
    pub raw_body: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ConnectionReport {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            status_code: None,
            raw_body: None,
            error: Some(error.into()),
        }
    }
}
