//! Pipeline settings derived from the application configuration.

use docrag_core::AppConfig;
use serde::{Deserialize, Serialize};

use crate::ingest::ChunkingOptions;
use crate::vector::{CollectionOptions, HnswParams};

/// Per-pipeline settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Target collection
    pub collection: String,

    /// Default number of results
    pub top: usize,

    /// Default score threshold, applied in the collection metric's direction
    pub threshold: f32,

    /// Texts per embedding request
    pub embed_batch_size: usize,

    /// Compact after ingestion once the orphan ratio exceeds this
    pub compact_orphan_ratio: Option<f32>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            collection: "infos".to_string(),
            top: 3,
            threshold: 0.2,
            embed_batch_size: 32,
            compact_orphan_ratio: None,
        }
    }
}

impl PipelineConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        let retrieval = &config.retrieval;
        Self {
            collection: retrieval.collection.clone(),
            top: retrieval.top,
            threshold: retrieval.threshold,
            compact_orphan_ratio: retrieval.compact_orphan_ratio,
            ..Default::default()
        }
    }
}

/// Collection options for stores built from the application configuration.
pub fn collection_options(config: &AppConfig) -> CollectionOptions {
    CollectionOptions {
        metric: config.retrieval.metric,
        orphan_margin: config.retrieval.orphan_margin,
        hnsw: HnswParams::default(),
    }
}

/// Chunking options for the file producer.
pub fn chunking_options(config: &AppConfig) -> ChunkingOptions {
    ChunkingOptions {
        chunk_size: config.retrieval.chunk_size,
        chunk_overlap: config.retrieval.chunk_overlap,
        prefix_file_name: true,
    }
}
