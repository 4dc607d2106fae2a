//! Embedding configuration.

use docrag_core::AppConfig;
use serde::{Deserialize, Serialize};

/// Settings needed to build an embedding provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Provider name: "openai" or "trigram"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Base URL of an OpenAI-compatible API, e.g. "http://localhost:1234/v1/"
    pub endpoint: Option<String>,

    /// Bearer credential
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Expected vector length; checked against responses when set
    pub dimensions: Option<usize>,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

/// Dimensions used by the trigram provider when none are configured.
pub const TRIGRAM_DIMENSIONS: usize = 384;

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "trigram".to_string(),
            model: "trigram-v1".to_string(),
            endpoint: None,
            api_key: None,
            dimensions: Some(TRIGRAM_DIMENSIONS),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl EmbeddingConfig {
    /// Derive embedding settings from the application configuration.
    pub fn from_app_config(config: &AppConfig) -> Self {
        let embedding = &config.embedding;
        let model = match (embedding.model.as_deref(), embedding.provider.as_str()) {
            (Some(model), _) if !model.is_empty() => model.to_string(),
            (_, "trigram") => "trigram-v1".to_string(),
            _ => String::new(),
        };

        Self {
            provider: embedding.provider.clone(),
            model,
            endpoint: embedding.endpoint.clone(),
            api_key: embedding.api_key.clone(),
            dimensions: embedding.dimensions,
            timeout_secs: embedding.timeout_secs,
            max_retries: embedding.max_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.provider, "trigram");
        assert_eq!(config.model, "trigram-v1");
        assert_eq!(config.dimensions, Some(384));
        assert_eq!(config.max_retries, 3);
    }

    #[test]
    fn test_from_app_config() {
        let mut app = AppConfig::default();
        app.embedding.endpoint = Some("http://localhost:1234/v1/".to_string());
        app.embedding.model = Some("nomic-embed-text".to_string());
        app.embedding.api_key = Some("key".to_string());

        let config = EmbeddingConfig::from_app_config(&app);
        assert_eq!(config.provider, "openai");
        assert_eq!(config.model, "nomic-embed-text");
        assert_eq!(config.endpoint.as_deref(), Some("http://localhost:1234/v1/"));
        assert_eq!(config.api_key.as_deref(), Some("key"));
    }

    #[test]
    fn test_trigram_model_default() {
        let mut app = AppConfig::default();
        app.embedding.provider = "trigram".to_string();
        assert_eq!(EmbeddingConfig::from_app_config(&app).model, "trigram-v1");
    }

    #[test]
    fn test_api_key_not_serialized() {
        let config = EmbeddingConfig {
            api_key: Some("secret".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
