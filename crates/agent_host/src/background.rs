//! Background coordinator: runs lookups from the context action and answers
//! requests from the other surfaces.

use providers::TranslationClient;
use services::{HistoryError, HistoryStore, SettingsStore};
use shared::messages::{PageAck, PageRequest, RuntimeRequest, RuntimeResponse};
use shared::outcome::{FailureReason, TranslationOutcome};
use shared::settings::{ExtensionSettings, RequestConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::coordinator::DeliveryCoordinator;
use crate::surface::{SurfaceHost, SurfaceId};

/// What one context-action lookup produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupReport {
    pub outcome: TranslationOutcome,
    pub delivered: bool,
}

pub struct Background {
    client: TranslationClient,
    settings: Arc<SettingsStore>,
    history: Arc<HistoryStore>,
    host: Arc<dyn SurfaceHost>,
    coordinator: DeliveryCoordinator,
}

impl Background {
    pub fn new(
        client: TranslationClient,
        settings: Arc<SettingsStore>,
        history: Arc<HistoryStore>,
        host: Arc<dyn SurfaceHost>,
    ) -> Self {
        let coordinator = DeliveryCoordinator::new(host.clone(), history.clone());
        Self {
            client,
            settings,
            history,
            host,
            coordinator,
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.coordinator = self.coordinator.with_settle_delay(delay);
        self
    }

    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Explain `selection` and show the result on `surface`.
    ///
    /// Blank selections are ignored. A missing credential also brings up the
    /// settings surface.
    pub async fn on_context_action(&self, surface: SurfaceId, selection: &str) -> Option<LookupReport> {
        let selection = selection.trim();
        if selection.is_empty() {
            return None;
        }
        info!(surface = %surface, chars = selection.chars().count(), "lookup requested");

        let config = self.request_config().await;
        let outcome = self.client.explain(selection, &config).await;
        if let Some(reason) = outcome.failure_reason() {
            warn!(surface = %surface, reason = %reason, "lookup failed");
        }

        let delivered = self.coordinator.deliver(surface, &outcome).await;
        if matches!(outcome.failure_reason(), Some(FailureReason::NoCredential)) {
            self.host.open_options_page().await;
        }
        Some(LookupReport { outcome, delivered })
    }

    pub async fn handle_request(&self, request: RuntimeRequest) -> RuntimeResponse {
        match request {
            RuntimeRequest::GetHistory => RuntimeResponse::History {
                history: self.history.get_all().await,
            },
            RuntimeRequest::UpdateHistory { history } => match self.history.replace_all(&history).await {
                Ok(count) => {
                    info!(count, "history replaced");
                    RuntimeResponse::ok()
                }
                Err(e) => failed("history update rejected", e),
            },
            RuntimeRequest::ImportHistory { history } => match self.history.merge(&history).await {
                Ok(report) => RuntimeResponse::Import {
                    success: true,
                    imported_count: report.imported_count,
                    duplicate_count: report.duplicate_count,
                },
                Err(e) => failed("history import rejected", e),
            },
            RuntimeRequest::ClearHistory => match self.history.clear().await {
                Ok(()) => RuntimeResponse::ok(),
                Err(e) => failed("history clear failed", e.into()),
            },
            RuntimeRequest::TestApiConnection { api_key, api_endpoint } => RuntimeResponse::Connection(
                self.client
                    .test_connection(&api_key, api_endpoint.as_deref())
                    .await,
            ),
        }
    }

    pub async fn handle_page_request(&self, surface: SurfaceId, request: PageRequest) -> PageAck {
        match request {
            PageRequest::ContentScriptReady => {
                info!(surface = %surface, "page receiver ready");
                PageAck::received()
            }
        }
    }

    async fn request_config(&self) -> RequestConfig {
        match self.settings.request_config().await {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "settings unreadable, using defaults");
                RequestConfig::from_settings(&ExtensionSettings::default())
            }
        }
    }
}

fn failed(context: &str, e: HistoryError) -> RuntimeResponse {
    warn!(error = %e, "{}", context);
    RuntimeResponse::failed(e.to_string())
}
