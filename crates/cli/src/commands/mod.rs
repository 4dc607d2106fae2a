//! Command handlers for the docrag CLI.

pub mod ingest;
pub mod search;

pub use ingest::IngestCommand;
pub use search::SearchCommand;

use docrag_knowledge::{ProgressEvent, ProgressReporter};
use std::sync::Arc;

/// Reporter that prints progress lines to stderr, or only logs when `quiet`.
fn progress_reporter(quiet: bool) -> ProgressReporter {
    if quiet {
        return ProgressReporter::noop();
    }
    ProgressReporter::new(Arc::new(|event: ProgressEvent| {
        eprintln!("{}", event.format_simple());
    }))
}
