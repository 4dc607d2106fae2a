//! OpenAI-compatible embedding provider.
//!
//! Talks to any server exposing `POST {endpoint}/embeddings` with the OpenAI
//! request and response shapes: the hosted API, LM Studio, llama.cpp server,
//! vLLM, Ollama's `/v1` facade and similar.
//!
//! # Features
//! - Whole batches in a single request
//! - Bearer credential, sent only when configured
//! - Retry with exponential backoff on transport errors, 429 and 5xx

use crate::embeddings::{EmbeddingConfig, EmbeddingProvider};
use async_trait::async_trait;
use docrag_core::{AppError, AppResult};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Initial backoff duration in milliseconds
const INITIAL_BACKOFF_MS: u64 = 100;

/// OpenAI-compatible embedding provider
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
    dimensions: Option<usize>,
    max_retries: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Detailed { message: String },
    Plain(String),
}

/// Failure of a single attempt, with whether another attempt may help.
#[derive(Debug)]
struct AttemptError {
    error: AppError,
    retryable: bool,
}

impl OpenAiProvider {
    /// Create a provider from configuration.
    ///
    /// # Errors
    /// * `AppError::Config` - endpoint or model missing
    /// * `AppError::Embedding` - HTTP client could not be built
    pub fn new(config: &EmbeddingConfig) -> AppResult<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::Config("EMBEDD_ENDPOINT is empty".to_string()))?;

        if config.model.trim().is_empty() {
            return Err(AppError::Config("EMBEDD_MODEL is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| AppError::Embedding(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: embeddings_url(endpoint),
            model: config.model.clone(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            dimensions: config.dimensions,
            max_retries: config.max_retries.max(1),
        })
    }

    /// Full request URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), model = %self.model))]
    async fn embed_with_retries(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.embed_once(texts).await {
                Ok(embeddings) => return Ok(embeddings),
                Err(AttemptError { error, retryable }) => {
                    if !retryable || attempt >= self.max_retries {
                        return Err(error);
                    }

                    let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt);
                    warn!(
                        "Embedding request failed (attempt {}/{}): {}. Retrying in {}ms",
                        attempt, self.max_retries, error, backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
            }
        }
    }

    async fn embed_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AttemptError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        debug!("Sending embedding request to {}", self.url);

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|e| AttemptError {
            error: AppError::Embedding(format!("Failed to send request to {}: {}", self.url, e)),
            retryable: true,
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| AttemptError {
            error: AppError::Embedding(format!("Failed to read response body: {}", e)),
            retryable: true,
        })?;

        if !status.is_success() {
            let message = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(ErrorResponse {
                    error: ErrorBody::Detailed { message },
                }) => message,
                Ok(ErrorResponse {
                    error: ErrorBody::Plain(message),
                }) => message,
                Err(_) => body,
            };
            return Err(AttemptError {
                error: AppError::Embedding(format!("Embedding API error ({}): {}", status, message)),
                retryable: status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error(),
            });
        }

        parse_response(&body, texts.len(), self.dimensions).map_err(|error| AttemptError {
            error,
            retryable: false,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> Option<usize> {
        self.dimensions
    }

    #[instrument(skip(self, texts), fields(batch_size = texts.len(), provider = "openai", model = %self.model))]
    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        self.embed_with_retries(texts).await
    }
}

/// `{endpoint}/embeddings`, tolerating a trailing slash on the endpoint.
fn embeddings_url(endpoint: &str) -> String {
    format!("{}/embeddings", endpoint.trim().trim_end_matches('/'))
}

/// Decode a successful response body into vectors ordered like the input.
fn parse_response(
    body: &str,
    expected: usize,
    dimensions: Option<usize>,
) -> AppResult<Vec<Vec<f32>>> {
    let mut response: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| AppError::Embedding(format!("Malformed embedding response: {}", e)))?;

    if response.data.len() != expected {
        return Err(AppError::Embedding(format!(
            "Expected {} embeddings, got {}",
            expected,
            response.data.len()
        )));
    }

    if response.data.iter().all(|d| d.index.is_some()) {
        response.data.sort_by_key(|d| d.index);
    }

    response
        .data
        .into_iter()
        .map(|d| {
            if d.embedding.is_empty() {
                return Err(AppError::Embedding("Empty embedding in response".to_string()));
            }
            if d.embedding.iter().any(|v| !v.is_finite()) {
                return Err(AppError::Embedding(
                    "Non-finite value in embedding response".to_string(),
                ));
            }
            if let Some(dims) = dimensions {
                if d.embedding.len() != dims {
                    return Err(AppError::Embedding(format!(
                        "Unexpected embedding dimensions: got {}, expected {}",
                        d.embedding.len(),
                        dims
                    )));
                }
            }
            Ok(d.embedding)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn config(endpoint: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            provider: "openai".to_string(),
            model: "test-embed".to_string(),
            endpoint: Some(endpoint.to_string()),
            api_key: None,
            dimensions: None,
            timeout_secs: 5,
            max_retries: 3,
        }
    }

    /// Serve canned HTTP responses, one per connection, in order.
    async fn serve(responses: Vec<(u16, String)>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);

        tokio::spawn(async move {
            for (status, body) in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                read_request(&mut socket).await;
                counter.fetch_add(1, Ordering::SeqCst);

                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/v1/", addr), hits)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = match socket.read(&mut chunk).await {
                Ok(0) | Err(_) => return,
                Ok(n) => n,
            };
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + content_length {
                    return;
                }
            }
        }
    }

    #[test]
    fn test_url_joining() {
        assert_eq!(
            embeddings_url("http://localhost:1234/v1/"),
            "http://localhost:1234/v1/embeddings"
        );
        assert_eq!(
            embeddings_url("https://api.openai.com/v1"),
            "https://api.openai.com/v1/embeddings"
        );
    }

    #[test]
    fn test_missing_endpoint_is_config_error() {
        let mut cfg = config("");
        assert!(matches!(OpenAiProvider::new(&cfg), Err(AppError::Config(_))));
        cfg.endpoint = None;
        assert!(matches!(OpenAiProvider::new(&cfg), Err(AppError::Config(_))));
    }

    #[test]
    fn test_missing_model_is_config_error() {
        let mut cfg = config("http://localhost:1234/v1/");
        cfg.model = String::new();
        let err = OpenAiProvider::new(&cfg).unwrap_err();
        assert!(err.to_string().contains("EMBEDD_MODEL"));
    }

    #[test]
    fn test_parse_response_orders_by_index() {
        let body = r#"{"data":[{"embedding":[0.0,1.0],"index":1},{"embedding":[1.0,0.0],"index":0}]}"#;
        let vectors = parse_response(body, 2, Some(2)).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_response_rejects_bad_shapes() {
        assert!(parse_response("not json", 1, None).is_err());
        assert!(parse_response(r#"{"data":[]}"#, 1, None).is_err());
        assert!(parse_response(r#"{"data":[{"embedding":[]}]}"#, 1, None).is_err());
        assert!(parse_response(r#"{"data":[{"embedding":[1.0]}]}"#, 1, Some(2)).is_err());
    }

    #[tokio::test]
    async fn test_embed_against_local_server() {
        let body = r#"{"object":"list","data":[{"object":"embedding","embedding":[0.6,0.8],"index":0}],"model":"test-embed"}"#;
        let (endpoint, hits) = serve(vec![(200, body.to_string())]).await;

        let provider = OpenAiProvider::new(&config(&endpoint)).unwrap();
        let vector = provider.embed("hello").await.unwrap();

        assert_eq!(vector, vec![0.6, 0.8]);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_server_errors() {
        let ok = r#"{"data":[{"embedding":[1.0],"index":0}]}"#;
        let (endpoint, hits) = serve(vec![
            (503, r#"{"error":{"message":"loading model"}}"#.to_string()),
            (200, ok.to_string()),
        ])
        .await;

        let provider = OpenAiProvider::new(&config(&endpoint)).unwrap();
        let vector = provider.embed("hello").await.unwrap();

        assert_eq!(vector, vec![1.0]);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let (endpoint, hits) = serve(vec![(
            401,
            r#"{"error":{"message":"invalid api key"}}"#.to_string(),
        )])
        .await;

        let provider = OpenAiProvider::new(&config(&endpoint)).unwrap();
        let err = provider.embed("hello").await.unwrap_err();

        assert!(err.is_embedding_failure());
        assert!(err.to_string().contains("invalid api key"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unreachable_server_is_embedding_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/v1", listener.local_addr().unwrap());
        drop(listener);

        let mut cfg = config(&endpoint);
        cfg.max_retries = 1;
        let provider = OpenAiProvider::new(&cfg).unwrap();

        let err = provider.embed("hello").await.unwrap_err();
        assert!(err.is_embedding_failure());
    }
}
