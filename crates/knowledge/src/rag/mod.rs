//! Retrieval-augmented search over ingested documents.
//!
//! The pipeline ingests a corpus into a collection and answers queries with
//! ranked `{content, sourceId, score}` results.

pub mod pipeline;
pub mod types;

pub use pipeline::{pipeline_from_config, rag_search, RetrievalPipeline};
pub use types::{ChunkFailure, IngestReport, RagResponse, RagResult, SearchRequest};
