//! Settings persisted in the synced storage area, one key per field.

use serde_json::Value;
use shared::settings::{validate_endpoint, ExtensionSettings, RequestConfig, SettingsError};
use std::sync::Arc;
use tracing::{debug, info};

use crate::storage::{KeyValueStore, StoreError};

const API_KEY: &str = "apiKey";
const API_ENDPOINT: &str = "apiEndpoint";
const CUSTOM_PROMPT: &str = "customPrompt";
const SHOW_ADVANCED_HISTORY: &str = "showAdvancedHistory";

#[derive(Debug, thiserror::Error)]
pub enum SettingsStoreError {
    #[error(transparent)]
    Invalid(#[from] SettingsError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub struct SettingsStore {
    store: Arc<dyn KeyValueStore>,
    fallback_api_key: Option<String>,
}

impl SettingsStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            fallback_api_key: None,
        }
    }

    /// Key used when none is stored, e.g. from the environment.
    pub fn with_fallback_api_key(mut self, key: Option<String>) -> Self {
        self.fallback_api_key = key.filter(|k| !k.trim().is_empty());
        self
    }

    /// Current settings; absent or mistyped keys take their defaults.
    pub async fn load(&self) -> Result<ExtensionSettings, StoreError> {
        let defaults = ExtensionSettings::default();
        let api_key = self
            .string(API_KEY)
            .await?
            .filter(|k| !k.trim().is_empty())
            .or_else(|| self.fallback_api_key.clone());
        let api_endpoint = self
            .string(API_ENDPOINT)
            .await?
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(defaults.api_endpoint);
        let custom_prompt = self
            .string(CUSTOM_PROMPT)
            .await?
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(defaults.custom_prompt);
        let show_advanced_history = self
            .store
            .get(SHOW_ADVANCED_HISTORY)
            .await?
            .and_then(|v| v.as_bool())
            .unwrap_or(defaults.show_advanced_history);

        Ok(ExtensionSettings {
            api_key,
            api_endpoint,
            custom_prompt,
            show_advanced_history,
        })
    }

    /// Validate and persist. Blank endpoint and prompt are stored as their
    /// defaults; a blank API key is refused.
    pub async fn save(&self, settings: &ExtensionSettings) -> Result<(), SettingsStoreError> {
        let defaults = ExtensionSettings::default();
        let api_key = match settings.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => return Err(SettingsError::EmptyApiKey.into()),
        };
        let endpoint = if settings.api_endpoint.trim().is_empty() {
            defaults.api_endpoint
        } else {
            settings.api_endpoint.trim().to_string()
        };
        validate_endpoint(&endpoint)?;
        let prompt = if settings.custom_prompt.trim().is_empty() {
            defaults.custom_prompt
        } else {
            settings.custom_prompt.clone()
        };

        self.store.set(API_KEY, Value::String(api_key)).await?;
        self.store.set(API_ENDPOINT, Value::String(endpoint)).await?;
        self.store.set(CUSTOM_PROMPT, Value::String(prompt)).await?;
        self.store
            .set(SHOW_ADVANCED_HISTORY, Value::Bool(settings.show_advanced_history))
            .await?;
        info!("settings saved");
        Ok(())
    }

    /// Fresh request configuration for one lookup.
    pub async fn request_config(&self) -> Result<RequestConfig, StoreError> {
        let settings = self.load().await?;
        let config = RequestConfig::from_settings(&settings);
        debug!(
            endpoint = %config.endpoint,
            has_key = config.credential.is_some(),
            prompt_chars = config.prompt_template.chars().count(),
            "loaded request config"
        );
        Ok(config)
    }

    async fn string(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .store
            .get(key)
            .await?
            .and_then(|v| v.as_str().map(str::to_string)))
    }
}
