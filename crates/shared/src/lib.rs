pub mod history;
pub mod messages;
pub mod outcome;

pub mod settings {
    use std::fmt;
    use url::Url;
    use zeroize::Zeroizing;

    pub const DEFAULT_API_ENDPOINT: &str = "https://qianfan.baidubce.com/v2/";
    pub const DEFAULT_PROMPT: &str =
        "你是一个经验丰富的英语老师，但是回答很精炼，每次回答不超过50个字，简单的问题不超过15个字";

    /// User-editable settings (the synced settings area, one key per field).
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct ExtensionSettings {
        pub api_key: Option<String>,
        pub api_endpoint: String,
        pub custom_prompt: String,
        pub show_advanced_history: bool,
    }

    impl Default for ExtensionSettings {
        fn default() -> Self {
            Self {
                api_key: None,
                api_endpoint: DEFAULT_API_ENDPOINT.into(),
                custom_prompt: DEFAULT_PROMPT.into(),
                show_advanced_history: false,
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum SettingsError {
        #[error("API endpoint '{0}' is not a valid URL")]
        InvalidEndpoint(String),

        #[error("API endpoint '{0}' must start with http or https")]
        UnsupportedScheme(String),

        #[error("API key must not be empty")]
        EmptyApiKey,
    }

    /// Check that an endpoint is an absolute http(s) URL.
    pub fn validate_endpoint(endpoint: &str) -> Result<Url, SettingsError> {
        let url = Url::parse(endpoint.trim())
            .map_err(|_| SettingsError::InvalidEndpoint(endpoint.to_string()))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            _ => Err(SettingsError::UnsupportedScheme(endpoint.to_string())),
        }
    }

    /// API credential. Wiped from memory on drop and never printed in full.
    #[derive(Clone)]
    pub struct Credential(Zeroizing<String>);

    impl Credential {
        /// `None` for blank input: a missing credential is not an empty one.
        pub fn new(raw: &str) -> Option<Self> {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(Self(Zeroizing::new(trimmed.to_string())))
            }
        }

        pub fn expose(&self) -> &str {
            self.0.as_str()
        }

        /// `***` followed by the last four characters.
        pub fn masked(&self) -> String {
            let chars: Vec<char> = self.0.chars().collect();
            let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
            format!("***{}", tail)
        }
    }

    impl fmt::Debug for Credential {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_tuple("Credential").field(&self.masked()).finish()
        }
    }

    /// Everything one explanation request needs. Built fresh per lookup.
    #[derive(Debug, Clone)]
    pub struct RequestConfig {
        pub endpoint: String,
        pub credential: Option<Credential>,
        pub prompt_template: String,
    }

    impl RequestConfig {
        pub fn from_settings(settings: &ExtensionSettings) -> Self {
            let endpoint = if settings.api_endpoint.trim().is_empty() {
                DEFAULT_API_ENDPOINT.to_string()
            } else {
                settings.api_endpoint.trim().to_string()
            };
            let prompt_template = if settings.custom_prompt.trim().is_empty() {
                DEFAULT_PROMPT.to_string()
            } else {
                settings.custom_prompt.clone()
            };
            Self {
                endpoint,
                credential: settings.api_key.as_deref().and_then(Credential::new),
                prompt_template,
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_blank_key_is_absent() {
            let settings = ExtensionSettings {
                api_key: Some("   ".into()),
                ..Default::default()
            };
            let config = RequestConfig::from_settings(&settings);
            assert!(config.credential.is_none());
        }

        #[test]
        fn test_blank_fields_fall_back_to_defaults() {
            let settings = ExtensionSettings {
                api_key: Some("secret-key-1234".into()),
                api_endpoint: "".into(),
                custom_prompt: " ".into(),
                show_advanced_history: false,
            };
            let config = RequestConfig::from_settings(&settings);
            assert_eq!(config.endpoint, DEFAULT_API_ENDPOINT);
            assert_eq!(config.prompt_template, DEFAULT_PROMPT);
            assert_eq!(config.credential.unwrap().expose(), "secret-key-1234");
        }

        #[test]
        fn test_credential_debug_is_masked() {
            let cred = Credential::new("secret-key-1234").unwrap();
            let printed = format!("{:?}", cred);
            assert!(printed.contains("***1234"));
            assert!(!printed.contains("secret"));
        }

        #[test]
        fn test_validate_endpoint() {
            assert!(validate_endpoint("https://qianfan.baidubce.com/v2/").is_ok());
            assert_eq!(
                validate_endpoint("ftp://example.com"),
                Err(SettingsError::UnsupportedScheme("ftp://example.com".into()))
            );
            assert!(matches!(
                validate_endpoint("qianfan.baidubce.com"),
                Err(SettingsError::InvalidEndpoint(_))
            ));
        }

        #[test]
        fn test_settings_defaults() {
            let settings = ExtensionSettings::default();
            assert_eq!(settings.api_key, None);
            assert_eq!(settings.api_endpoint, DEFAULT_API_ENDPOINT);
            assert_eq!(settings.custom_prompt, DEFAULT_PROMPT);
            assert!(!settings.show_advanced_history);
        }
    }
}
