//! Cross-module tests and shared fixtures.

mod rag_ranking;

use crate::embeddings::EmbeddingProvider;
use docrag_core::{AppError, AppResult};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Normalize to unit length.
pub(crate) fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

/// Deterministic embedder with a fixed vocabulary.
///
/// Similar words map to nearby unit vectors; unknown words fail, which lets
/// tests exercise per-chunk failure handling.
#[derive(Debug, Default)]
pub(crate) struct StubEmbedder {
    pub calls: AtomicUsize,
}

impl StubEmbedder {
    pub fn vector_for(text: &str) -> Option<Vec<f32>> {
        let raw: [f32; 3] = match text.trim().to_lowercase().as_str() {
            "cat" => [1.0, 0.2, 0.0],
            "feline" => [1.0, 0.1, 0.0],
            "kitten" => [0.9, 0.3, 0.0],
            "dog" => [0.2, 1.0, 0.0],
            "puppy" => [0.3, 0.9, 0.0],
            "car" => [0.0, 0.0, 1.0],
            "truck" => [0.1, 0.0, 1.0],
            _ => return None,
        };
        Some(normalize(&raw))
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for StubEmbedder {
    fn provider_name(&self) -> &str {
        "stub"
    }

    fn model_name(&self) -> &str {
        "stub-3d"
    }

    fn dimensions(&self) -> Option<usize> {
        Some(3)
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        texts
            .iter()
            .map(|text| {
                Self::vector_for(text)
                    .ok_or_else(|| AppError::Embedding(format!("no vector for '{}'", text)))
            })
            .collect()
    }
}
