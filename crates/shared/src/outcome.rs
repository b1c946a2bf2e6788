//! Result of one explanation request.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("no API credential configured")]
    NoCredential,

    #[error("network unavailable")]
    NetworkUnavailable,

    #[error("http error {status}: {body}")]
    HttpError { status: u16, body: String },

    #[error("response is not valid JSON")]
    ParseError,

    #[error("response carried no message content")]
    EmptyResult,
}

impl FailureReason {
    /// Text shown to the user in the on-page notification.
    pub fn user_message(&self) -> String {
        match self {
            FailureReason::NoCredential => "请先在选项页面设置百度AI的API Key。".to_string(),
            FailureReason::NetworkUnavailable => "网络连接失败，请检查您的互联网连接".to_string(),
            FailureReason::HttpError { status, body } => {
                let detail: String = body.chars().take(200).collect();
                format!("翻译失败: API请求失败: {}. {}", status, detail)
            }
            FailureReason::ParseError => "翻译失败: 无法解析API响应".to_string(),
            FailureReason::EmptyResult => {
                "翻译失败: 未能获取翻译结果。返回数据格式可能不正确。".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TranslationOutcome {
    Success {
        original_text: String,
        explanation: String,
    },
    Failure {
        reason: FailureReason,
    },
}

impl TranslationOutcome {
    pub fn success(original_text: impl Into<String>, explanation: impl Into<String>) -> Self {
        TranslationOutcome::Success {
            original_text: original_text.into(),
            explanation: explanation.into(),
        }
    }

    pub fn failure(reason: FailureReason) -> Self {
        TranslationOutcome::Failure { reason }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TranslationOutcome::Success { .. })
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            TranslationOutcome::Failure { reason } => Some(reason),
            TranslationOutcome::Success { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_error_message_is_truncated() {
        let reason = FailureReason::HttpError {
            status: 500,
            body: "x".repeat(1000),
        };
        let msg = reason.user_message();
        assert!(msg.contains("500"));
        assert!(msg.chars().count() < 300);
    }

    #[test]
    fn test_failure_reason_accessor() {
        let ok = TranslationOutcome::success("a", "b");
        assert!(ok.is_success());
        assert!(ok.failure_reason().is_none());

        let failed = TranslationOutcome::failure(FailureReason::EmptyResult);
        assert_eq!(failed.failure_reason(), Some(&FailureReason::EmptyResult));
    }
}
