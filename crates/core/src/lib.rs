//! Docrag Core Library
//!
//! This crate provides the foundational utilities shared by the retrieval
//! engine and the CLI:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management
//! - The distance metric used to rank search results

pub mod config;
pub mod error;
pub mod logging;
pub mod metric;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use metric::DistanceMetric;
