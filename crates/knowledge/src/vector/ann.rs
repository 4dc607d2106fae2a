//! Approximate nearest-neighbor index adapter.
//!
//! Wraps `hnsw_rs` graphs behind a small trait. The graph is append-only:
//! vectors are added under an explicit internal id and are never updated or
//! removed. Stale ids are filtered by the owning collection.

use anndists::dist::distances::{DistL2, Distance};
use docrag_core::{AppError, AppResult, DistanceMetric};
use hnsw_rs::prelude::*;
use serde::{Deserialize, Serialize};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Position of a vector in a collection's arena and graph.
pub type InternalId = u64;

/// Construction and query parameters for the HNSW graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HnswParams {
    /// Maximum links per node (M)
    pub max_connections: usize,

    /// Number of layers, capped at 16 by hnsw_rs
    pub max_layers: usize,

    /// Candidate list size while building
    pub ef_construction: usize,

    /// Minimum candidate list size while searching
    pub ef_search: usize,

    /// Expected number of elements, used to size the layer distribution
    pub capacity: usize,
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            max_connections: 16,
            max_layers: 16,
            ef_construction: 200,
            ef_search: 64,
            capacity: 1024,
        }
    }
}

/// Exponent bound keeping [`ExpNegDot`] finite and non-zero in f32.
const EXP_NEG_DOT_LIMIT: f32 = 80.0;

/// `exp(-dot)` as a graph distance.
///
/// hnsw_rs requires non-negative distances, and the largest inner product
/// must be the nearest neighbor. `exp(-dot)` is positive and strictly
/// decreasing in the dot product. Unlike `DistDot` it does not require
/// unit-length inputs. Dot products beyond the exponent bound saturate; the
/// collection rescores candidates exactly, so only graph navigation sees
/// the clamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExpNegDot;

impl Distance<f32> for ExpNegDot {
    fn eval(&self, va: &[f32], vb: &[f32]) -> f32 {
        (-dot(va, vb))
            .clamp(-EXP_NEG_DOT_LIMIT, EXP_NEG_DOT_LIMIT)
            .exp()
    }
}

/// Inner product of two equal-length vectors.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Euclidean distance of two equal-length vectors.
pub fn l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Score of `candidate` against `query` in the metric's native unit.
pub fn score(metric: DistanceMetric, query: &[f32], candidate: &[f32]) -> f32 {
    match metric {
        DistanceMetric::InnerProduct => dot(query, candidate),
        DistanceMetric::L2Distance => l2(query, candidate),
    }
}

/// Append-only ANN index.
///
/// Both operations take `&self`: implementations must allow searches to run
/// while other threads append, and an id must only become visible to search
/// once its vector is fully inserted.
pub trait VectorIndex: Send + Sync + std::fmt::Debug {
    /// Add a vector under an explicit id.
    ///
    /// On error the vector must not be counted by [`len`](Self::len).
    fn add(&self, id: InternalId, vector: &[f32]) -> AppResult<()>;

    /// Up to `k` nearest candidate ids, nearest first.
    fn search(&self, query: &[f32], k: usize) -> Vec<InternalId>;

    /// Number of vectors ever added.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

enum Graph {
    Dot(Hnsw<'static, f32, ExpNegDot>),
    L2(Hnsw<'static, f32, DistL2>),
}

/// HNSW graph for one metric.
pub struct HnswIndex {
    graph: Graph,
    params: HnswParams,
    count: AtomicUsize,
}

impl std::fmt::Debug for HnswIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let metric = match self.graph {
            Graph::Dot(_) => DistanceMetric::InnerProduct,
            Graph::L2(_) => DistanceMetric::L2Distance,
        };
        f.debug_struct("HnswIndex")
            .field("metric", &metric)
            .field("len", &self.len())
            .field("params", &self.params)
            .finish()
    }
}

impl HnswIndex {
    /// Create an empty graph for `metric`.
    pub fn new(metric: DistanceMetric, params: HnswParams) -> Self {
        let max_layers = params.max_layers.clamp(1, 16);
        let capacity = params.capacity.max(1);

        let graph = match metric {
            DistanceMetric::InnerProduct => Graph::Dot(Hnsw::<f32, ExpNegDot>::new(
                params.max_connections,
                capacity,
                max_layers,
                params.ef_construction,
                ExpNegDot,
            )),
            DistanceMetric::L2Distance => Graph::L2(Hnsw::<f32, DistL2>::new(
                params.max_connections,
                capacity,
                max_layers,
                params.ef_construction,
                DistL2 {},
            )),
        };

        Self {
            graph,
            params,
            count: AtomicUsize::new(0),
        }
    }
}

impl VectorIndex for HnswIndex {
    fn add(&self, id: InternalId, vector: &[f32]) -> AppResult<()> {
        if vector.is_empty() || vector.iter().any(|v| !v.is_finite()) {
            return Err(AppError::Knowledge(format!(
                "vector for id {} is empty or non-finite",
                id
            )));
        }

        let data_id = id as usize;
        // hnsw_rs reports broken invariants by panicking; surface them as errors
        let inserted = catch_unwind(AssertUnwindSafe(|| match &self.graph {
            Graph::Dot(h) => h.insert_slice((vector, data_id)),
            Graph::L2(h) => h.insert_slice((vector, data_id)),
        }));
        if inserted.is_err() {
            return Err(AppError::Knowledge(format!(
                "HNSW insert failed for id {}",
                id
            )));
        }

        self.count.fetch_add(1, Ordering::Release);
        Ok(())
    }

    fn search(&self, query: &[f32], k: usize) -> Vec<InternalId> {
        if k == 0 || self.is_empty() {
            return Vec::new();
        }

        let ef = self.params.ef_search.max(k);
        let neighbours = match &self.graph {
            Graph::Dot(h) => h.search(query, k, ef),
            Graph::L2(h) => h.search(query, k, ef),
        };

        neighbours.into_iter().map(|n| n.d_id as InternalId).collect()
    }

    fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }
}
