//! Docrag retrieval core.
//!
//! Ingests text into named in-memory collections backed by an HNSW index and
//! answers similarity queries ranked by the collection's metric.
//!
//! - [`vector`]: store, collections, ANN adapter, record contract
//! - [`embeddings`]: providers and the embedding resolver
//! - [`ingest`]: chunk producers
//! - [`rag`]: the retrieval pipeline

pub mod config;
pub mod embeddings;
pub mod ingest;
pub mod progress;
pub mod rag;
pub mod vector;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use embeddings::{EmbeddingProvider, EmbeddingResolver, QueryInput};
pub use ingest::{ChunkProducer, FileChunkProducer, SourceChunk, StaticChunkProducer};
pub use progress::{ProgressEvent, ProgressReporter};
pub use rag::{rag_search, RagResponse, RagResult, RetrievalPipeline, SearchRequest};
pub use vector::{Collection, CollectionOptions, Record, SearchHit, Store};

pub use docrag_core::{AppError, AppResult};
