//! Offline embedding provider based on hashed character trigrams.

use crate::embeddings::provider::EmbeddingProvider;
use docrag_core::AppResult;
use std::collections::BTreeMap;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "file",
];

/// Offline embedding provider.
///
/// Hashes character trigrams and whole words of the lowercased text into a
/// fixed number of buckets and normalizes the result to unit length, so inner
/// product equals cosine similarity. Texts sharing vocabulary land close to
/// each other; there is no semantic knowledge beyond that.
#[derive(Debug)]
pub struct TrigramProvider {
    dimensions: usize,
}

impl TrigramProvider {
    /// Create a new trigram provider with specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    /// Embed one text. Empty or stop-word-only text yields the zero vector.
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let mut frequencies: BTreeMap<String, u32> = BTreeMap::new();
        for word in tokens(text) {
            *frequencies.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &frequencies {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let bucket = self.bucket(window.iter().collect::<String>().as_bytes(), 37);
                vector[bucket] += (*freq as f32).sqrt();
            }

            let bucket = self.bucket(word.as_bytes(), 31);
            vector[bucket] += *freq as f32;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }

    fn bucket(&self, bytes: &[u8], multiplier: u64) -> usize {
        let hash = bytes
            .iter()
            .fold(0u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(*b as u64));
        (hash % self.dimensions as u64) as usize
    }
}

/// Lowercased alphanumeric words longer than two characters, minus stop words.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str()))
}

#[async_trait::async_trait]
impl EmbeddingProvider for TrigramProvider {
    fn provider_name(&self) -> &str {
        "trigram"
    }

    fn model_name(&self) -> &str {
        "trigram-v1"
    }

    fn dimensions(&self) -> Option<usize> {
        Some(self.dimensions)
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|text| self.vectorize(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::ann::dot;

    fn norm(v: &[f32]) -> f32 {
        v.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    #[tokio::test]
    async fn test_trigram_provider_metadata() {
        let provider = TrigramProvider::new(384);
        assert_eq!(provider.dimensions(), Some(384));
        assert_eq!(provider.provider_name(), "trigram");
        assert_eq!(provider.model_name(), "trigram-v1");
    }

    #[tokio::test]
    async fn test_embed_is_unit_length() {
        let provider = TrigramProvider::new(384);
        let embedding = provider.embed("vector search over documents").await.unwrap();

        assert_eq!(embedding.len(), 384);
        assert!((norm(&embedding) - 1.0).abs() < 0.001);
    }

    #[tokio::test]
    async fn test_embed_batch_preserves_order() {
        let provider = TrigramProvider::new(128);
        let texts = vec!["alpha beta".to_string(), "gamma delta".to_string()];

        let batch = provider.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], provider.vectorize("alpha beta"));
        assert_eq!(batch[1], provider.vectorize("gamma delta"));
    }

    #[tokio::test]
    async fn test_deterministic() {
        let provider = TrigramProvider::new(384);
        let a = provider.embed("deterministic test").await.unwrap();
        let b = provider.embed("deterministic test").await.unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_shared_vocabulary_scores_higher() {
        let provider = TrigramProvider::new(384);
        let query = provider.vectorize("rust ownership rules");
        let related = provider.vectorize("Ownership rules in Rust prevent data races.");
        let unrelated = provider.vectorize("Pasta recipes with tomato sauce.");

        assert!(dot(&query, &related) > dot(&query, &unrelated));
    }

    #[test]
    fn test_punctuation_is_ignored() {
        let provider = TrigramProvider::new(256);
        assert_eq!(
            provider.vectorize("hello, world!"),
            provider.vectorize("hello world")
        );
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let provider = TrigramProvider::new(64);
        assert!(provider.vectorize("").iter().all(|&x| x == 0.0));
        assert!(provider.vectorize("it is the").iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_utf8_text() {
        let provider = TrigramProvider::new(384);
        let embedding = provider.vectorize("Gerenciador de coleções 🎮 para jogos!");
        assert!((norm(&embedding) - 1.0).abs() < 0.001);
    }
}
