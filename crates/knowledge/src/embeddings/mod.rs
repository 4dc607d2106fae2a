//! Embedding capability.
//!
//! Providers turn text into vectors; the [`EmbeddingResolver`] decides
//! whether an input needs a provider at all.

pub mod config;
pub mod provider;
pub mod providers;
pub mod resolver;

pub use config::EmbeddingConfig;
pub use provider::{create_provider, EmbeddingProvider};
pub use resolver::{EmbeddingResolver, QueryInput};
