//! Search command handler.
//!
//! Ingests a corpus into a fresh in-memory collection and prints the ranked
//! results for one query.

use anyhow::Context;
use clap::Args;
use docrag_core::AppConfig;
use docrag_knowledge::rag::pipeline_from_config;
use docrag_knowledge::{RagResult, SearchRequest};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Search a file or directory for passages relevant to a query
#[derive(Args, Debug)]
pub struct SearchCommand {
    /// File or directory to ingest
    pub path: PathBuf,

    /// Query text
    pub query: String,

    /// Maximum number of results (default: retrieval.top)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Minimum score, or maximum distance for L2 (default: retrieval.threshold)
    #[arg(short, long)]
    pub threshold: Option<f32>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchCommand {
    pub async fn execute(
        &self,
        config: &AppConfig,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        tracing::info!("Searching {:?} for '{}'", self.path, self.query);

        let pipeline = pipeline_from_config(config)?
            .with_progress(super::progress_reporter(self.json));
        let defaults = pipeline.default_request();
        let request = SearchRequest {
            limit: self.limit.unwrap_or(defaults.limit),
            threshold: self.threshold.unwrap_or(defaults.threshold),
        };

        let response = pipeline
            .run(&self.path, self.query.as_str(), request, cancel)
            .await?;

        if response.ingest.failed() > 0 {
            tracing::warn!(
                "{} of {} chunks could not be ingested",
                response.ingest.failed(),
                response.ingest.chunks_total
            );
        }

        if self.json {
            let output = serde_json::to_string_pretty(&response.results)
                .context("Failed to serialize results")?;
            println!("{}", output);
        } else {
            print_results(&response.results);
        }

        Ok(())
    }
}

fn print_results(results: &[RagResult]) {
    if results.is_empty() {
        println!("No relevant results found.");
        return;
    }

    for (i, result) in results.iter().enumerate() {
        println!("{}. [{:.3}] {}", i + 1, result.score, result.source_id);
        println!("   {}", preview(&result.content, 200));
        println!();
    }
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
fn preview(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}
