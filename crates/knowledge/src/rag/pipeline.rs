//! Retrieval pipeline: ingest, embed, upsert, query, filter.

use docrag_core::{AppConfig, AppError, AppResult};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use super::types::{ChunkFailure, IngestReport, RagResponse, RagResult, SearchRequest};
use crate::config::{chunking_options, collection_options, PipelineConfig};
use crate::embeddings::{create_provider, EmbeddingConfig, EmbeddingResolver, QueryInput};
use crate::ingest::{ChunkProducer, FileChunkProducer, SourceChunk};
use crate::progress::ProgressReporter;
use crate::vector::{Collection, Record, Store};

/// Sequential ingest-and-query orchestration over a shared [`Store`].
///
/// Runs are additive: ingesting the same corpus twice stores every chunk
/// twice, each under a fresh key.
pub struct RetrievalPipeline {
    store: Arc<Store>,
    resolver: EmbeddingResolver,
    producer: Arc<dyn ChunkProducer>,
    config: PipelineConfig,
    progress: ProgressReporter,
}

impl RetrievalPipeline {
    pub fn new(
        store: Arc<Store>,
        resolver: EmbeddingResolver,
        producer: Arc<dyn ChunkProducer>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            producer,
            config,
            progress: ProgressReporter::noop(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Default request from the pipeline configuration.
    pub fn default_request(&self) -> SearchRequest {
        SearchRequest {
            limit: self.config.top,
            threshold: self.config.threshold,
        }
    }

    /// Extract chunks from `location`, embed them and upsert them.
    ///
    /// A chunk that fails to embed or upsert is recorded in the report and
    /// the rest of the batch continues. Cancellation stops the run before the
    /// next upsert.
    pub async fn ingest(
        &self,
        location: &Path,
        cancel: &CancellationToken,
    ) -> AppResult<IngestReport> {
        let start = Instant::now();
        let collection = self.store.get_or_create_collection(&self.config.collection)?;

        let chunks = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(cancelled("ingestion")),
            chunks = self.producer.extract(location) => chunks?,
        };

        let location_label = location.display().to_string();
        self.progress.discover(chunks.len() as u64, &location_label);
        tracing::info!(
            "Ingesting {} chunks from {} into '{}'",
            chunks.len(),
            location_label,
            collection.name()
        );

        let mut report = IngestReport {
            collection: collection.name().to_string(),
            chunks_total: chunks.len(),
            ..Default::default()
        };

        let batch_size = self.config.embed_batch_size.max(1);
        let model = self
            .resolver
            .provider()
            .map(|p| p.model_name().to_string())
            .unwrap_or_default();

        let mut processed = 0usize;
        for batch in chunks.chunks(batch_size) {
            let vectors = self.embed_batch(batch, cancel).await?;
            processed += batch.len();
            self.progress
                .embed(processed as u64, report.chunks_total as u64, &model);

            for (chunk, vector) in batch.iter().zip(vectors) {
                if cancel.is_cancelled() {
                    return Err(cancelled("ingestion"));
                }

                let outcome = vector.and_then(|vector| {
                    let key = uuid::Uuid::new_v4().to_string();
                    collection.upsert(
                        Record::new(key, chunk.text.clone(), chunk.source_id.clone())
                            .with_vector(vector),
                    )
                });

                match outcome {
                    Ok(_) => report.upserted += 1,
                    Err(e) => {
                        tracing::warn!("Skipping chunk from {}: {}", chunk.source_id, e);
                        report.failures.push(ChunkFailure {
                            source_id: chunk.source_id.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }

            self.progress.upsert(
                processed as u64,
                report.chunks_total as u64,
                report.failures.len() as u64,
            );
        }

        report.compaction = self.maybe_compact(&collection);
        report.duration_secs = start.elapsed().as_secs_f64();

        tracing::info!(
            "Ingestion into '{}' complete: {} upserted, {} failed in {:.2}s",
            report.collection,
            report.upserted,
            report.failed(),
            report.duration_secs
        );

        Ok(report)
    }

    /// One vector result per chunk. A failed batch request is retried chunk
    /// by chunk so a single bad input only fails itself.
    async fn embed_batch(
        &self,
        batch: &[SourceChunk],
        cancel: &CancellationToken,
    ) -> AppResult<Vec<AppResult<Vec<f32>>>> {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

        match self.resolver.resolve_batch(&texts, cancel).await {
            Ok(vectors) if vectors.len() == texts.len() => {
                return Ok(vectors.into_iter().map(Ok).collect())
            }
            Ok(vectors) => tracing::warn!(
                "Provider returned {} vectors for {} texts, embedding individually",
                vectors.len(),
                texts.len()
            ),
            Err(AppError::Cancelled(what)) => return Err(AppError::Cancelled(what)),
            Err(e) if batch.len() == 1 => return Ok(vec![Err(e)]),
            Err(e) => tracing::warn!("Batch embedding failed, embedding individually: {}", e),
        }

        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            match self
                .resolver
                .resolve_cancellable(QueryInput::Text(text), cancel)
                .await
            {
                Err(AppError::Cancelled(what)) => return Err(AppError::Cancelled(what)),
                other => results.push(other),
            }
        }
        Ok(results)
    }

    fn maybe_compact(&self, collection: &Collection) -> Option<crate::vector::CompactionReport> {
        let limit = self.config.compact_orphan_ratio?;
        let ratio = collection.stats().orphan_ratio();
        if ratio > limit {
            tracing::debug!(
                "Orphan ratio {:.2} exceeds {:.2}, compacting '{}'",
                ratio,
                limit,
                collection.name()
            );
            Some(collection.compact())
        } else {
            None
        }
    }

    /// Embed `query`, search the collection and drop results that miss the
    /// threshold. Results keep the collection's ranking order.
    pub async fn query(
        &self,
        query: impl Into<QueryInput>,
        request: SearchRequest,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<RagResult>> {
        let collection = self.store.collection(&self.config.collection)?;
        if request.limit == 0 {
            return Ok(Vec::new());
        }

        let hits = collection
            .search(&self.resolver, query, request.limit, cancel)
            .await?;

        let metric = collection.metric();
        let candidates = hits.len();
        let results: Vec<RagResult> = hits
            .into_iter()
            .filter(|hit| metric.passes_threshold(hit.score, request.threshold))
            .map(|hit| RagResult {
                content: hit.record.content.clone(),
                source_id: hit.record.source_id.clone(),
                score: hit.score,
            })
            .collect();

        self.progress
            .search(results.len() as u64, collection.name());

        if results.is_empty() {
            tracing::info!(
                "No results passed the {} threshold {:.2} ({} candidates)",
                metric,
                request.threshold,
                candidates
            );
        } else {
            tracing::info!(
                "Returning {} results (best score {:.3})",
                results.len(),
                results[0].score
            );
        }

        Ok(results)
    }

    /// Ingest `location`, then run `query` against the same collection.
    pub async fn run(
        &self,
        location: &Path,
        query: impl Into<QueryInput>,
        request: SearchRequest,
        cancel: &CancellationToken,
    ) -> AppResult<RagResponse> {
        let ingest = self.ingest(location, cancel).await?;
        let results = self.query(query, request, cancel).await?;
        Ok(RagResponse { results, ingest })
    }
}

fn cancelled(what: &str) -> AppError {
    AppError::Cancelled(what.to_string())
}

/// Build a pipeline from application configuration: fresh store, provider
/// from the embedding settings and a file producer.
pub fn pipeline_from_config(config: &AppConfig) -> AppResult<RetrievalPipeline> {
    config.validate()?;

    let provider = create_provider(&EmbeddingConfig::from_app_config(config))?;
    let store = Arc::new(Store::new(collection_options(config)));
    let producer = Arc::new(FileChunkProducer::new(chunking_options(config)));

    Ok(RetrievalPipeline::new(
        store,
        EmbeddingResolver::new(provider),
        producer,
        PipelineConfig::from_app_config(config),
    ))
}

/// Search the files at `path` for `query` in one call.
///
/// `limit` and `threshold` fall back to the configured defaults.
pub async fn rag_search(
    config: &AppConfig,
    path: &Path,
    query: &str,
    limit: Option<usize>,
    threshold: Option<f32>,
) -> AppResult<Vec<RagResult>> {
    let pipeline = pipeline_from_config(config)?;
    let defaults = pipeline.default_request();
    let request = SearchRequest {
        limit: limit.unwrap_or(defaults.limit),
        threshold: threshold.unwrap_or(defaults.threshold),
    };

    let response = pipeline
        .run(path, query, request, &CancellationToken::new())
        .await?;
    Ok(response.results)
}
