//! Configuration management for docrag.
//!
//! Configuration is merged from several sources, lowest precedence first:
//! - Built-in defaults
//! - Config file (`.docrag/config.yaml` or `DOCRAG_CONFIG`)
//! - Environment variables (`EMBEDD_ENDPOINT`, `EMBEDD_MODEL`, `EMBEDD_KEY`, ...)
//! - Command-line flags

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};
use crate::metric::DistanceMetric;

/// Embedding providers the factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 2] = ["openai", "trigram"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Embedding capability settings
    pub embedding: EmbeddingSettings,

    /// Retrieval settings (collection, ranking, chunking)
    pub retrieval: RetrievalSettings,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Settings for the text-to-vector capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Provider name ("openai" for any OpenAI-compatible server, "trigram" for offline)
    pub provider: String,

    /// Base URL of the embedding API (e.g. "http://localhost:1234/v1/")
    pub endpoint: Option<String>,

    /// Embedding model identifier
    pub model: Option<String>,

    /// Credential sent as a bearer token
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Expected vector length, if known up front
    pub dimensions: Option<usize>,

    /// Per-request timeout
    pub timeout_secs: u64,

    /// Attempts per embedding request before giving up
    pub max_retries: u32,
}

/// Settings for ingestion and ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    /// Target collection name
    pub collection: String,

    /// Distance metric for new collections
    pub metric: DistanceMetric,

    /// Default number of results
    pub top: usize,

    /// Default minimum score (maximum distance for L2)
    pub threshold: f32,

    /// Chunk capacity in characters
    pub chunk_size: usize,

    /// Overlap between consecutive chunks in characters
    pub chunk_overlap: usize,

    /// Extra ANN candidates requested to compensate for orphaned ids
    pub orphan_margin: usize,

    /// Compact a collection after ingestion once its orphan ratio exceeds this
    pub compact_orphan_ratio: Option<f32>,
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    embedding: Option<EmbeddingSection>,
    retrieval: Option<RetrievalSection>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmbeddingSection {
    provider: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    api_key_env: Option<String>,
    dimensions: Option<usize>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RetrievalSection {
    collection: Option<String>,
    metric: Option<DistanceMetric>,
    top: Option<usize>,
    threshold: Option<f32>,
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    orphan_margin: Option<usize>,
    compact_orphan_ratio: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

/// Command-line overrides, applied last.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub config_file: Option<PathBuf>,
    pub provider: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub metric: Option<DistanceMetric>,
    pub log_level: Option<String>,
    pub verbose: bool,
    pub no_color: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            endpoint: None,
            model: None,
            api_key: None,
            dimensions: None,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            collection: "infos".to_string(),
            metric: DistanceMetric::InnerProduct,
            top: 3,
            threshold: 0.2,
            chunk_size: 2000,
            chunk_overlap: 200,
            orphan_margin: 8,
            compact_orphan_ratio: None,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config_file: None,
            embedding: EmbeddingSettings::default(),
            retrieval: RetrievalSettings::default(),
            log_level: None,
            verbose: false,
            no_color: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the config file and environment variables.
    ///
    /// Environment variables:
    /// - `DOCRAG_CONFIG`: Path to config file
    /// - `EMBEDD_ENDPOINT`: Embedding API base URL
    /// - `EMBEDD_MODEL`: Embedding model identifier
    /// - `EMBEDD_KEY`: Embedding API credential
    /// - `DOCRAG_PROVIDER`: Embedding provider
    /// - `DOCRAG_METRIC`: Distance metric
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use docrag_core::config::AppConfig;
    ///
    /// let config = AppConfig::load().expect("Failed to load config");
    /// println!("Collection: {}", config.retrieval.collection);
    /// ```
    pub fn load() -> AppResult<Self> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::load_with(&cwd, |name| std::env::var(name).ok())
    }

    /// Load configuration using an explicit working directory and
    /// environment lookup.
    pub fn load_with(cwd: &Path, env: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(config_file) = env("DOCRAG_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => cwd.join(".docrag").join("config.yaml"),
        };

        if config_path.exists() {
            config = config.merge_yaml(&config_path, &env)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file does not exist: {:?}",
                config_path
            )));
        }

        // Environment variables override YAML config
        if let Some(endpoint) = env("EMBEDD_ENDPOINT").filter(|v| !v.is_empty()) {
            config.embedding.endpoint = Some(endpoint);
        }

        if let Some(model) = env("EMBEDD_MODEL").filter(|v| !v.is_empty()) {
            config.embedding.model = Some(model);
        }

        if let Some(key) = env("EMBEDD_KEY").filter(|v| !v.is_empty()) {
            config.embedding.api_key = Some(key);
        }

        if let Some(provider) = env("DOCRAG_PROVIDER") {
            config.embedding.provider = provider;
        }

        if let Some(metric) = env("DOCRAG_METRIC") {
            config.retrieval.metric = metric.parse()?;
        }

        if let Some(level) = env("RUST_LOG") {
            config.log_level = Some(level);
        }

        if env("NO_COLOR").is_some() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge YAML configuration file into this config.
    fn merge_yaml(
        &self,
        path: &Path,
        env: &impl Fn(&str) -> Option<String>,
    ) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config_file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(section) = config_file.embedding {
            let embedding = &mut result.embedding;
            if let Some(provider) = section.provider {
                embedding.provider = provider;
            }
            if section.endpoint.is_some() {
                embedding.endpoint = section.endpoint;
            }
            if section.model.is_some() {
                embedding.model = section.model;
            }
            if let Some(var) = section.api_key_env {
                embedding.api_key = env(&var);
            }
            if section.dimensions.is_some() {
                embedding.dimensions = section.dimensions;
            }
            if let Some(timeout) = section.timeout_secs {
                embedding.timeout_secs = timeout;
            }
            if let Some(retries) = section.max_retries {
                embedding.max_retries = retries;
            }
        }

        if let Some(section) = config_file.retrieval {
            let retrieval = &mut result.retrieval;
            if let Some(collection) = section.collection {
                retrieval.collection = collection;
            }
            if let Some(metric) = section.metric {
                retrieval.metric = metric;
            }
            if let Some(top) = section.top {
                retrieval.top = top;
            }
            if let Some(threshold) = section.threshold {
                retrieval.threshold = threshold;
            }
            if let Some(size) = section.chunk_size {
                retrieval.chunk_size = size;
            }
            if let Some(overlap) = section.chunk_overlap {
                retrieval.chunk_overlap = overlap;
            }
            if let Some(margin) = section.orphan_margin {
                retrieval.orphan_margin = margin;
            }
            if section.compact_orphan_ratio.is_some() {
                retrieval.compact_orphan_ratio = section.compact_orphan_ratio;
            }
        }

        tracing::debug!("Merged config file {:?}", path);
        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(config_file) = overrides.config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = overrides.provider {
            self.embedding.provider = provider;
        }

        if let Some(endpoint) = overrides.endpoint {
            self.embedding.endpoint = Some(endpoint);
        }

        if let Some(model) = overrides.model {
            self.embedding.model = Some(model);
        }

        if let Some(metric) = overrides.metric {
            self.retrieval.metric = metric;
        }

        if let Some(log_level) = overrides.log_level {
            self.log_level = Some(log_level);
        }

        if overrides.verbose {
            self.verbose = true;
            // Verbose mode implies debug logging
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if overrides.no_color {
            self.no_color = true;
        }

        self
    }

    /// Validate configuration before running a pipeline.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.embedding.provider.as_str();
        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown embedding provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider == "openai" {
            if self.embedding.endpoint.as_deref().unwrap_or("").is_empty() {
                return Err(AppError::Config("EMBEDD_ENDPOINT is empty".to_string()));
            }
            if self.embedding.model.as_deref().unwrap_or("").is_empty() {
                return Err(AppError::Config("EMBEDD_MODEL is empty".to_string()));
            }
        }

        let retrieval = &self.retrieval;
        if retrieval.collection.is_empty() {
            return Err(AppError::Config("Collection name must not be empty".to_string()));
        }
        if retrieval.top == 0 {
            return Err(AppError::Config("top must be at least 1".to_string()));
        }
        if !retrieval.threshold.is_finite() {
            return Err(AppError::Config(format!(
                "threshold must be finite, got {}",
                retrieval.threshold
            )));
        }
        if retrieval.chunk_size == 0 || retrieval.chunk_overlap >= retrieval.chunk_size {
            return Err(AppError::Config(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                retrieval.chunk_overlap, retrieval.chunk_size
            )));
        }

        Ok(())
    }
}
