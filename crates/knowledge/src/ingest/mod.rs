//! Corpus ingestion: discovering files, decoding text, splitting chunks.

pub mod producer;
pub mod signature;

pub use producer::{
    ChunkProducer, ChunkingOptions, FileChunkProducer, SourceChunk, StaticChunkProducer,
};
