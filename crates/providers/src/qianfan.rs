//! Explanation requests against a Qianfan-style chat-completions endpoint.

use serde::Serialize;
use serde_json::Value;
use shared::messages::ConnectionReport;
use shared::outcome::{FailureReason, TranslationOutcome};
use shared::settings::{validate_endpoint, Credential, RequestConfig, DEFAULT_API_ENDPOINT};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::transport::{HttpTransport, ReqwestTransport};

pub const MODEL: &str = "ernie-4.5-turbo-32k";

/// Host probed before each lookup to tell "offline" apart from a slow endpoint.
pub const DEFAULT_PROBE_URL: &str = "https://www.baidu.com";

const CONNECTION_TEST_PROMPT: &str = "Hello";

// ── Request types ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    top_p: f64,
    penalty_score: u32,
    web_search: WebSearch,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct WebSearch {
    enable: bool,
    enable_trace: bool,
}

impl<'a> ChatRequest<'a> {
    fn user(content: &'a str) -> Self {
        Self {
            model: MODEL,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            temperature: 0.8,
            top_p: 0.8,
            penalty_score: 1,
            web_search: WebSearch {
                enable: true,
                enable_trace: false,
            },
        }
    }
}

/// `{endpoint}/chat/completions` with exactly one slash between the two.
pub fn chat_completions_url(endpoint: &str) -> String {
    format!("{}/chat/completions", endpoint.trim().trim_end_matches('/'))
}

/// The user message sent for a lookup.
pub fn build_prompt(prompt_template: &str, selected_text: &str) -> String {
    format!("{},{}怎么记住", prompt_template, selected_text)
}

/// Pull `choices[0].message.content` out of a completion body.
fn extract_content(body: &Value) -> Option<&str> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

// ── Client ───────────────────────────────────────────────────────────

pub struct TranslationClient {
    transport: Arc<dyn HttpTransport>,
    probe_url: String,
}

impl TranslationClient {
    pub fn new(transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            probe_url: DEFAULT_PROBE_URL.to_string(),
        }
    }

    /// Client backed by the shared reqwest pool.
    pub fn with_default_transport() -> Self {
        Self::new(Arc::new(ReqwestTransport::new()))
    }

    pub fn with_probe_url(mut self, url: impl Into<String>) -> Self {
        self.probe_url = url.into();
        self
    }

    /// Ask the endpoint how to remember `selected_text`.
    ///
    /// Never returns a transport error: every failure is folded into
    /// [`TranslationOutcome::Failure`].
    pub async fn explain(&self, selected_text: &str, config: &RequestConfig) -> TranslationOutcome {
        let Some(credential) = &config.credential else {
            info!("no API key configured, skipping request");
            return TranslationOutcome::failure(FailureReason::NoCredential);
        };

        if !self.transport.probe(&self.probe_url).await {
            return TranslationOutcome::failure(FailureReason::NetworkUnavailable);
        }

        let url = chat_completions_url(&config.endpoint);
        let content = build_prompt(&config.prompt_template, selected_text);
        let body = match serde_json::to_value(ChatRequest::user(&content)) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "failed to encode chat request");
                return TranslationOutcome::failure(FailureReason::ParseError);
            }
        };

        debug!(url = %url, key = %credential.masked(), text = selected_text, "sending explanation request");
        let resp = match self.transport.post_json(&url, credential.expose(), &body).await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(error = %e, "explanation request failed");
                return TranslationOutcome::failure(FailureReason::NetworkUnavailable);
            }
        };
        debug!(status = resp.status, "explanation response received");

        if !resp.is_success() {
            return TranslationOutcome::failure(FailureReason::HttpError {
                status: resp.status,
                body: resp.body,
            });
        }

        let parsed: Value = match serde_json::from_str(&resp.body) {
            Ok(v) => v,
            Err(e) => {
                let preview: String = resp.body.chars().take(100).collect();
                warn!(error = %e, body = %preview, "response is not JSON");
                return TranslationOutcome::failure(FailureReason::ParseError);
            }
        };

        match extract_content(&parsed) {
            Some(text) => TranslationOutcome::success(selected_text, text),
            None => TranslationOutcome::failure(FailureReason::EmptyResult),
        }
    }

    /// Diagnostic request with a trivial prompt. Surfaces the raw status and
    /// body instead of interpreting them.
    pub async fn test_connection(&self, credential: &str, endpoint: Option<&str>) -> ConnectionReport {
        let Some(credential) = Credential::new(credential) else {
            return ConnectionReport::failed("请输入API Key后再测试连接");
        };
        let endpoint = endpoint
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_API_ENDPOINT);
        if let Err(e) = validate_endpoint(endpoint) {
            return ConnectionReport::failed(format!("API端点格式错误: {}", e));
        }

        let url = chat_completions_url(endpoint);
        let body = match serde_json::to_value(ChatRequest::user(CONNECTION_TEST_PROMPT)) {
            Ok(body) => body,
            Err(e) => return ConnectionReport::failed(e.to_string()),
        };

        match self.transport.post_json(&url, credential.expose(), &body).await {
            Ok(resp) => {
                let ok = resp.is_success();
                info!(status = resp.status, ok, "connection test finished");
                ConnectionReport {
                    ok,
                    status_code: Some(resp.status),
                    error: (!ok).then(|| format!("API请求失败: {}", resp.status)),
                    raw_body: Some(resp.body),
                }
            }
            Err(e) => {
                warn!(error = %e, "connection test failed");
                ConnectionReport::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpResponse, TransportError};
    use parking_lot::Mutex;
    use serde_json::json;

    /// Transport returning canned responses and recording every call.
    struct StubTransport {
        online: bool,
        response: Result<HttpResponse, String>,
        posts: Mutex<Vec<(String, String, Value)>>,
        probes: Mutex<usize>,
    }

    impl StubTransport {
        fn replying(status: u16, body: &str) -> Self {
            Self {
                online: true,
                response: Ok(HttpResponse {
                    status,
                    body: body.to_string(),
                }),
                posts: Mutex::new(Vec::new()),
                probes: Mutex::new(0),
            }
        }

        fn offline() -> Self {
            Self {
                online: false,
                ..Self::replying(200, "{}")
            }
        }

        fn post_count(&self) -> usize {
            self.posts.lock().len()
        }
    }

    #[async_trait::async_trait]
    impl HttpTransport for StubTransport {
        async fn post_json(
            &self,
            url: &str,
            bearer: &str,
            body: &Value,
        ) -> Result<HttpResponse, TransportError> {
            self.posts
                .lock()
                .push((url.to_string(), bearer.to_string(), body.clone()));
            self.response.clone().map_err(|message| TransportError {
                url: url.to_string(),
                message,
            })
        }

        async fn probe(&self, _url: &str) -> bool {
            *self.probes.lock() += 1;
            self.online
        }
    }

    fn config(key: &str) -> RequestConfig {
        RequestConfig {
            endpoint: "https://qianfan.baidubce.com/v2/".into(),
            credential: Credential::new(key),
            prompt_template: "tutor".into(),
        }
    }

    fn client(stub: &Arc<StubTransport>) -> TranslationClient {
        TranslationClient::new(stub.clone())
    }

    #[test]
    fn test_chat_url_has_single_slash() {
        assert_eq!(
            chat_completions_url("https://qianfan.baidubce.com/v2/"),
            "https://qianfan.baidubce.com/v2/chat/completions"
        );
        assert_eq!(
            chat_completions_url("https://qianfan.baidubce.com/v2"),
            "https://qianfan.baidubce.com/v2/chat/completions"
        );
        assert_eq!(
            chat_completions_url("https://example.com/v2//"),
            "https://example.com/v2/chat/completions"
        );
    }

    #[tokio::test]
    async fn test_missing_credential_skips_network() {
        let stub = Arc::new(StubTransport::replying(200, "{}"));
        let outcome = client(&stub).explain("ubiquitous", &config("")).await;

        assert_eq!(outcome, TranslationOutcome::failure(FailureReason::NoCredential));
        assert_eq!(stub.post_count(), 0);
        assert_eq!(*stub.probes.lock(), 0);
    }

    #[tokio::test]
    async fn test_offline_probe_short_circuits() {
        let stub = Arc::new(StubTransport::offline());
        let outcome = client(&stub).explain("ubiquitous", &config("key")).await;

        assert_eq!(outcome, TranslationOutcome::failure(FailureReason::NetworkUnavailable));
        assert_eq!(stub.post_count(), 0);
    }

    #[tokio::test]
    async fn test_http_error_keeps_status_and_body() {
        let stub = Arc::new(StubTransport::replying(500, "server error"));
        let outcome = client(&stub).explain("ubiquitous", &config("key")).await;

        assert_eq!(
            outcome,
            TranslationOutcome::failure(FailureReason::HttpError {
                status: 500,
                body: "server error".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_non_json_body_is_parse_error() {
        let stub = Arc::new(StubTransport::replying(200, "<html>oops</html>"));
        let outcome = client(&stub).explain("ubiquitous", &config("key")).await;
        assert_eq!(outcome, TranslationOutcome::failure(FailureReason::ParseError));
    }

    #[tokio::test]
    async fn test_missing_content_is_empty_result() {
        let stub = Arc::new(StubTransport::replying(200, r#"{"choices":[]}"#));
        let outcome = client(&stub).explain("ubiquitous", &config("key")).await;
        assert_eq!(outcome, TranslationOutcome::failure(FailureReason::EmptyResult));
    }

    #[tokio::test]
    async fn test_transport_error_is_network_unavailable() {
        let stub = Arc::new(StubTransport {
            response: Err("connection reset".into()),
            ..StubTransport::replying(200, "")
        });
        let outcome = client(&stub).explain("ubiquitous", &config("key")).await;
        assert_eq!(outcome, TranslationOutcome::failure(FailureReason::NetworkUnavailable));
    }

    #[tokio::test]
    async fn test_success_extracts_content_and_shapes_request() {
        let stub = Arc::new(StubTransport::replying(
            200,
            r#"{"choices":[{"message":{"content":"mnemonic tip"}}]}"#,
        ));
        let outcome = client(&stub).explain("ubiquitous", &config("key")).await;

        assert_eq!(outcome, TranslationOutcome::success("ubiquitous", "mnemonic tip"));

        let posts = stub.posts.lock();
        assert_eq!(posts.len(), 1);
        let (url, bearer, body) = &posts[0];
        assert_eq!(url, "https://qianfan.baidubce.com/v2/chat/completions");
        assert_eq!(bearer, "key");
        assert_eq!(
            *body,
            json!({
                "model": "ernie-4.5-turbo-32k",
                "messages": [{"role": "user", "content": "tutor,ubiquitous怎么记住"}],
                "temperature": 0.8,
                "top_p": 0.8,
                "penalty_score": 1,
                "web_search": {"enable": true, "enable_trace": false}
            })
        );
    }

    #[tokio::test]
    async fn test_connection_reports_raw_status() {
        let stub = Arc::new(StubTransport::replying(401, r#"{"error":"bad key"}"#));
        let report = client(&stub).test_connection("key", None).await;

        assert!(!report.ok);
        assert_eq!(report.status_code, Some(401));
        assert_eq!(report.raw_body.as_deref(), Some(r#"{"error":"bad key"}"#));
        assert_eq!(report.error.as_deref(), Some("API请求失败: 401"));
        // no reachability probe for diagnostics
        assert_eq!(*stub.probes.lock(), 0);
    }

    #[tokio::test]
    async fn test_connection_validates_inputs_first() {
        let stub = Arc::new(StubTransport::replying(200, "{}"));
        let c = client(&stub);

        assert!(!c.test_connection("", None).await.ok);
        assert!(!c.test_connection("key", Some("qianfan.baidubce.com")).await.ok);
        assert_eq!(stub.post_count(), 0);

        let report = c.test_connection("key", Some("https://example.com/v2")).await;
        assert!(report.ok);
        assert_eq!(stub.posts.lock()[0].0, "https://example.com/v2/chat/completions");
    }
}
