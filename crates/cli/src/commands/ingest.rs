//! Ingest command handler.
//!
//! Runs ingestion alone and reports what was stored, which is useful for
//! checking chunking and embedding settings before searching.

use anyhow::Context;
use clap::Args;
use docrag_core::AppConfig;
use docrag_knowledge::rag::pipeline_from_config;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Ingest a file or directory and print collection statistics
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// File or directory to ingest
    pub path: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(
        &self,
        config: &AppConfig,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        tracing::info!("Ingesting {:?}", self.path);

        let pipeline = pipeline_from_config(config)?
            .with_progress(super::progress_reporter(self.json));
        let report = pipeline.ingest(&self.path, cancel).await?;
        let stats = pipeline
            .store()
            .collection(&report.collection)?
            .stats();

        if self.json {
            let output = serde_json::json!({
                "report": report,
                "stats": stats,
            });
            let output = serde_json::to_string_pretty(&output)
                .context("Failed to serialize ingest report")?;
            println!("{}", output);
            return Ok(());
        }

        println!(
            "Ingested {} of {} chunks into '{}' in {:.2}s",
            report.upserted, report.chunks_total, report.collection, report.duration_secs
        );
        println!(
            "  metric: {}, dimension: {}, records: {}",
            stats.metric,
            stats
                .dimension
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unset".to_string()),
            stats.records
        );
        for failure in &report.failures {
            println!("  failed: {} ({})", failure.source_id, failure.reason);
        }
        if let Some(compaction) = report.compaction {
            println!(
                "  compacted: {} ids -> {}",
                compaction.ids_before, compaction.ids_after
            );
        }

        Ok(())
    }
}
