//! Retrieval request and response types.

use serde::{Deserialize, Serialize};

use crate::vector::CompactionReport;

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagResult {
    pub content: String,
    pub source_id: String,
    pub score: f32,
}

/// Limit and threshold for a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub limit: usize,
    pub threshold: f32,
}

/// A chunk that could not be embedded or upserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkFailure {
    pub source_id: String,
    pub reason: String,
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub collection: String,
    pub chunks_total: usize,
    pub upserted: usize,
    pub failures: Vec<ChunkFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compaction: Option<CompactionReport>,
    pub duration_secs: f64,
}

impl IngestReport {
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}

/// Results of a full ingest-then-query run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResponse {
    pub results: Vec<RagResult>,
    pub ingest: IngestReport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_serializes_source_id_camel_case() {
        let result = RagResult {
            content: "cat".to_string(),
            source_id: "animals.txt".to_string(),
            score: 0.9,
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["sourceId"], "animals.txt");
        assert_eq!(json["content"], "cat");
    }

    #[test]
    fn test_report_failed_count() {
        let report = IngestReport {
            failures: vec![ChunkFailure {
                source_id: "a".to_string(),
                reason: "timeout".to_string(),
            }],
            ..Default::default()
        };
        assert_eq!(report.failed(), 1);
        assert!(serde_json::to_string(&report).unwrap().contains("chunksTotal"));
    }
}
