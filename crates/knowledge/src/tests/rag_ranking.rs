//! Tests for metric-dependent ranking and threshold filtering.

use super::normalize;
use crate::embeddings::EmbeddingResolver;
use crate::ingest::StaticChunkProducer;
use crate::rag::{RetrievalPipeline, SearchRequest};
use crate::vector::{Collection, CollectionOptions, Record, Store};
use crate::PipelineConfig;
use docrag_core::DistanceMetric;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn collection(metric: DistanceMetric) -> Collection {
    Collection::new(
        "ranking",
        CollectionOptions {
            metric,
            ..Default::default()
        },
    )
}

fn insert(c: &Collection, key: &str, v: &[f32]) {
    c.upsert(Record::new(key, format!("Text {}", key), "source1").with_vector(v.to_vec()))
        .unwrap();
}

/// Pipeline over an existing store with a vectors-only resolver.
fn pipeline(store: Arc<Store>, threshold: f32) -> RetrievalPipeline {
    RetrievalPipeline::new(
        store,
        EmbeddingResolver::vectors_only(),
        Arc::new(StaticChunkProducer::default()),
        PipelineConfig {
            collection: "ranking".to_string(),
            threshold,
            ..Default::default()
        },
    )
}

#[test]
fn test_inner_product_scores_are_non_increasing() {
    let c = collection(DistanceMetric::InnerProduct);
    insert(&c, "chunk1", &normalize(&[1.0, 0.0, 0.0]));
    insert(&c, "chunk2", &normalize(&[0.7, 0.7, 0.0]));
    insert(&c, "chunk3", &normalize(&[0.0, 1.0, 0.0]));
    insert(&c, "chunk4", &normalize(&[-1.0, 0.0, 0.0]));

    let hits = c.search_vector(&normalize(&[1.0, 0.0, 0.0]), 10).unwrap();

    assert_eq!(hits.len(), 4);
    for pair in hits.windows(2) {
        assert!(
            pair[0].score >= pair[1].score,
            "Scores should be ordered: {} >= {}",
            pair[0].score,
            pair[1].score
        );
    }
    assert_eq!(hits[0].record.key, "chunk1");
    assert!(hits[0].score > 0.99, "Perfect match should score near 1.0");
    assert_eq!(hits[3].record.key, "chunk4");
    assert!(hits[3].score < -0.99);
}

#[test]
fn test_l2_scores_are_non_decreasing() {
    let c = collection(DistanceMetric::L2Distance);
    insert(&c, "far", &[10.0, 10.0]);
    insert(&c, "near", &[0.1, 0.0]);
    insert(&c, "mid", &[2.0, 0.0]);

    let hits = c.search_vector(&[0.0, 0.0], 3).unwrap();
    let keys: Vec<&str> = hits.iter().map(|h| h.record.key.as_str()).collect();
    assert_eq!(keys, vec!["near", "mid", "far"]);

    for pair in hits.windows(2) {
        assert!(pair[0].score <= pair[1].score);
    }
    assert!((hits[1].score - 2.0).abs() < 1e-5);
}

#[test]
fn test_top_caps_result_count() {
    let c = collection(DistanceMetric::InnerProduct);
    for i in 0..10 {
        insert(&c, &format!("k{}", i), &normalize(&[1.0, i as f32 * 0.1]));
    }
    assert_eq!(c.search_vector(&[1.0, 0.0], 3).unwrap().len(), 3);
    assert!(c.search_vector(&[1.0, 0.0], 0).unwrap().is_empty());
}

#[test]
fn test_orthogonal_vector_scores_low() {
    let c = collection(DistanceMetric::InnerProduct);
    insert(&c, "programming", &normalize(&[1.0, 0.0, 0.0, 0.0]));

    let hits = c
        .search_vector(&normalize(&[0.0, 1.0, 0.0, 0.0]), 5)
        .unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].score.abs() < 1e-6);
}

#[tokio::test]
async fn test_threshold_filters_inner_product() {
    let store = Arc::new(Store::default());
    let c = store.get_or_create_collection("ranking").unwrap();
    insert(&c, "relevant", &normalize(&[1.0, 0.5, 0.2, 0.1]));
    insert(&c, "unrelated", &normalize(&[-0.3, -0.8, 0.4, -0.2]));

    let results = pipeline(Arc::clone(&store), 0.2)
        .query(
            normalize(&[0.9, 0.4, 0.3, 0.1]),
            SearchRequest {
                limit: 5,
                threshold: 0.2,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].content, "Text relevant");
    assert_eq!(results[0].source_id, "source1");
    assert!(results[0].score > 0.8);
}

#[tokio::test]
async fn test_threshold_filters_l2_as_max_distance() {
    let store = Arc::new(Store::new(CollectionOptions {
        metric: DistanceMetric::L2Distance,
        ..Default::default()
    }));
    let c = store.get_or_create_collection("ranking").unwrap();
    insert(&c, "close", &[0.0, 0.5]);
    insert(&c, "edge", &[1.0, 0.0]);
    insert(&c, "distant", &[3.0, 4.0]);

    let results = pipeline(Arc::clone(&store), 1.0)
        .query(
            vec![0.0, 0.0],
            SearchRequest {
                limit: 10,
                threshold: 1.0,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let contents: Vec<&str> = results.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["Text close", "Text edge"]);
}

#[tokio::test]
async fn test_empty_filtered_results_are_not_an_error() {
    let store = Arc::new(Store::default());
    let c = store.get_or_create_collection("ranking").unwrap();
    insert(&c, "a", &[1.0, 0.0]);

    let results = pipeline(Arc::clone(&store), 0.99)
        .query(
            vec![0.0, 1.0],
            SearchRequest {
                limit: 3,
                threshold: 0.99,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(results.is_empty());

    // Ingest with an empty producer is a no-op
    let report = pipeline(store, 0.2)
        .ingest(Path::new("unused"), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.chunks_total, 0);
    assert_eq!(report.upserted, 0);
}
