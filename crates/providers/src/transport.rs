//! HTTP seam between the translation client and the network.

use reqwest::Client;
use serde_json::Value;
use std::sync::LazyLock;
use std::time::Duration;

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(120))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

/// Status and body of a completed HTTP exchange, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The request never produced a response.
#[derive(Debug, thiserror::Error)]
#[error("request to {url} failed: {message}")]
pub struct TransportError {
    pub url: String,
    pub message: String,
}

#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    /// POST a JSON body with a bearer token.
    async fn post_json(
        &self,
        url: &str,
        bearer: &str,
        body: &Value,
    ) -> Result<HttpResponse, TransportError>;

    /// HEAD probe. Any error means unreachable.
    async fn probe(&self, url: &str) -> bool;
}

pub struct ReqwestTransport {
    http: Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            http: SHARED_HTTP.clone(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(
        &self,
        url: &str,
        bearer: &str,
        body: &Value,
    ) -> Result<HttpResponse, TransportError> {
        let to_err = |e: reqwest::Error| TransportError {
            url: url.to_string(),
            message: e.to_string(),
        };
        let resp = self
            .http
            .post(url)
            .header("Authorization", format!("Bearer {}", bearer))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(to_err)?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(to_err)?;
        Ok(HttpResponse { status, body })
    }

    async fn probe(&self, url: &str) -> bool {
        match self
            .http
            .head(url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(url, error = %e, "reachability probe failed");
                false
            }
        }
    }
}
