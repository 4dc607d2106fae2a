//! Embedding provider implementations.

pub mod openai;
pub mod trigram;

pub use openai::OpenAiProvider;
pub use trigram::TrigramProvider;
