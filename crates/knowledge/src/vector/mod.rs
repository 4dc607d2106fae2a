//! In-memory vector store.
//!
//! A [`Store`] owns named [`Collection`]s. Each collection maps record keys
//! to internal ids in an append-only HNSW graph and keeps the full records
//! alongside.

pub mod ann;
pub mod collection;
pub mod record;
pub mod store;

pub use ann::{HnswIndex, HnswParams, InternalId, VectorIndex};
pub use collection::{
    hnsw_index, Collection, CollectionOptions, CollectionStats, CompactionReport, IndexFactory,
    SearchHit,
};
pub use record::Record;
pub use store::Store;
