//! Turns query or chunk inputs into vectors.

use docrag_core::{AppError, AppResult};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::provider::EmbeddingProvider;

/// Something that can be resolved to a vector.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    /// Free text, embedded by the configured provider
    Text(String),
    /// A precomputed vector, used as-is
    Vector(Vec<f32>),
}

impl From<&str> for QueryInput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for QueryInput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<f32>> for QueryInput {
    fn from(vector: Vec<f32>) -> Self {
        Self::Vector(vector)
    }
}

/// Resolves inputs to vectors, delegating text to an optional provider.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingResolver {
    provider: Option<Arc<dyn EmbeddingProvider>>,
}

impl EmbeddingResolver {
    pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// A resolver that only accepts precomputed vectors.
    pub fn vectors_only() -> Self {
        Self { provider: None }
    }

    pub fn has_capability(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider(&self) -> Option<&Arc<dyn EmbeddingProvider>> {
        self.provider.as_ref()
    }

    /// Return vectors unchanged; embed text through the provider.
    pub async fn resolve(&self, input: QueryInput) -> AppResult<Vec<f32>> {
        match input {
            QueryInput::Vector(vector) => Ok(vector),
            QueryInput::Text(text) => {
                let provider = self.provider.as_ref().ok_or_else(|| {
                    AppError::UnsupportedQueryInput(
                        "text query given but no embedding provider is configured".to_string(),
                    )
                })?;

                provider.embed(&text).await.map_err(|e| match e {
                    AppError::Embedding(_) => e,
                    other => AppError::Embedding(other.to_string()),
                })
            }
        }
    }

    /// Like [`resolve`](Self::resolve), abandoning the provider call when
    /// `cancel` fires.
    pub async fn resolve_cancellable(
        &self,
        input: QueryInput,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<f32>> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled("embedding".to_string()));
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Cancelled("embedding".to_string())),
            result = self.resolve(input) => result,
        }
    }

    /// Embed many texts in one provider call.
    pub async fn resolve_batch(
        &self,
        texts: &[String],
        cancel: &CancellationToken,
    ) -> AppResult<Vec<Vec<f32>>> {
        let provider = self.provider.as_ref().ok_or_else(|| {
            AppError::UnsupportedQueryInput(
                "text input given but no embedding provider is configured".to_string(),
            )
        })?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AppError::Cancelled("embedding".to_string())),
            result = provider.embed_batch(texts) => result.map_err(|e| match e {
                AppError::Embedding(_) => e,
                other => AppError::Embedding(other.to_string()),
            }),
        }
    }
}
