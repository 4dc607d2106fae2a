//! A named set of records plus one append-only ANN index.
//!
//! Layout:
//! - `live`: key -> record and the internal id currently owned by the key.
//!   Record and mapping live in one map entry, so they always change together.
//! - arena: `Slot`s indexed by internal id. Never shrinks outside of `compact`.
//!   A slot whose graph insert failed is emptied and its id is never reused.
//! - graph: HNSW over the arena vectors.
//!
//! Deleting or re-upserting a key only touches `live`. The previous vector
//! stays in the arena and graph as an orphan and is filtered out at search
//! time: a candidate id is valid only while its slot's key still maps to it.
//!
//! Appends and searches share the generation lock. `compact` and
//! `ensure_deleted` take it exclusively because they replace the arena and
//! graph wholesale.
//!
//! Two concurrent upserts of the same key both append a vector; whichever
//! writes the mapping last owns the key and the other vector is orphaned.

use dashmap::DashMap;
use docrag_core::{AppError, AppResult, DistanceMetric};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::ann::{self, HnswIndex, HnswParams, InternalId, VectorIndex};
use super::record::Record;
use crate::embeddings::{EmbeddingResolver, QueryInput};

/// Per-collection tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CollectionOptions {
    /// Metric used to score and order results
    pub metric: DistanceMetric,

    /// Extra candidates requested from the graph to make up for orphans
    pub orphan_margin: usize,

    /// Graph parameters
    pub hnsw: HnswParams,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::InnerProduct,
            orphan_margin: 8,
            hnsw: HnswParams::default(),
        }
    }
}

/// A search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub record: Arc<Record>,
    /// Similarity for inner product, Euclidean distance for L2
    pub score: f32,
}

/// Point-in-time counters for a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStats {
    pub name: String,
    pub metric: DistanceMetric,
    pub dimension: Option<usize>,
    pub records: usize,
    pub live_vectors: usize,
    pub assigned_ids: usize,
    pub orphans: usize,
}

impl CollectionStats {
    /// Fraction of assigned ids that are orphaned.
    pub fn orphan_ratio(&self) -> f32 {
        if self.assigned_ids == 0 {
            0.0
        } else {
            self.orphans as f32 / self.assigned_ids as f32
        }
    }
}

/// Outcome of a compaction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionReport {
    pub ids_before: usize,
    pub ids_after: usize,
    pub orphans_dropped: usize,
}

#[derive(Debug)]
struct LiveEntry {
    record: Arc<Record>,
    internal_id: Option<InternalId>,
}

#[derive(Debug)]
struct Slot {
    key: String,
    vector: Arc<[f32]>,
}

/// Builds the ANN index for a fresh generation.
pub type IndexFactory = fn(&CollectionOptions) -> Box<dyn VectorIndex>;

/// Default [`IndexFactory`]: an HNSW graph for the collection's metric.
pub fn hnsw_index(options: &CollectionOptions) -> Box<dyn VectorIndex> {
    Box::new(HnswIndex::new(options.metric, options.hnsw))
}

#[derive(Debug)]
struct Generation {
    /// `None` marks an id whose vector the graph rejected
    slots: RwLock<Vec<Option<Slot>>>,
    graph: Box<dyn VectorIndex>,
}

impl Generation {
    fn new(options: &CollectionOptions, factory: IndexFactory) -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
            graph: factory(options),
        }
    }
}

/// A named collection of records with similarity search.
pub struct Collection {
    name: String,
    options: CollectionOptions,
    index_factory: IndexFactory,
    /// 0 while unset
    dimension: AtomicUsize,
    live: DashMap<String, LiveEntry>,
    generation: RwLock<Generation>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("dimension", &self.dimension())
            .field("records", &self.live.len())
            .finish()
    }
}

impl Collection {
    /// Create an empty collection backed by an HNSW graph.
    pub fn new(name: impl Into<String>, options: CollectionOptions) -> Self {
        Self::with_index_factory(name, options, hnsw_index)
    }

    /// Create an empty collection whose index generations come from `factory`.
    pub fn with_index_factory(
        name: impl Into<String>,
        options: CollectionOptions,
        factory: IndexFactory,
    ) -> Self {
        Self {
            name: name.into(),
            dimension: AtomicUsize::new(0),
            live: DashMap::new(),
            generation: RwLock::new(Generation::new(&options, factory)),
            index_factory: factory,
            options,
        }
    }

    fn new_generation(&self) -> Generation {
        Generation::new(&self.options, self.index_factory)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metric(&self) -> DistanceMetric {
        self.options.metric
    }

    /// Dimension fixed by the first vector, if any vector was ever added.
    pub fn dimension(&self) -> Option<usize> {
        match self.dimension.load(Ordering::Acquire) {
            0 => None,
            d => Some(d),
        }
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Insert or overwrite a record.
    ///
    /// Returns the internal id allocated for the record's vector, or `None`
    /// when the record has no vector. A vector whose length differs from the
    /// collection dimension is rejected with `DimensionMismatch` and nothing
    /// is modified. Neither is anything modified when the index rejects the
    /// vector: its slot is emptied and a dimension claimed by this call is
    /// released.
    pub fn upsert(&self, record: Record) -> AppResult<Option<InternalId>> {
        let generation = self.generation.read();

        let Some(vector) = record.vector.as_deref() else {
            self.live.insert(
                record.key.clone(),
                LiveEntry {
                    record: Arc::new(record),
                    internal_id: None,
                },
            );
            return Ok(None);
        };

        validate_values(vector)?;

        let vector: Arc<[f32]> = Arc::from(vector);
        let (id, claimed) = {
            let mut slots = generation.slots.write();
            let claimed = self.claim_dimension(vector.len())?;
            let id = slots.len() as InternalId;
            slots.push(Some(Slot {
                key: record.key.clone(),
                vector: Arc::clone(&vector),
            }));
            (id, claimed)
        };

        // The id only becomes reachable from search once the graph insert
        // returns, and its slot is already in place by then.
        if let Err(e) = generation.graph.add(id, &vector) {
            self.reject_slot(&generation, id, vector.len(), claimed);
            tracing::warn!(
                collection = %self.name,
                key = %record.key,
                "index rejected vector: {}",
                e
            );
            return Err(e);
        }

        self.live.insert(
            record.key.clone(),
            LiveEntry {
                record: Arc::new(record),
                internal_id: Some(id),
            },
        );

        Ok(Some(id))
    }

    /// Upsert from a loosely-typed field map.
    pub fn upsert_fields(&self, fields: &Map<String, Value>) -> AppResult<Option<InternalId>> {
        self.upsert(Record::from_fields(fields)?)
    }

    /// Upsert each record independently; one failure does not stop the rest.
    pub fn upsert_batch(
        &self,
        records: impl IntoIterator<Item = Record>,
    ) -> Vec<AppResult<Option<InternalId>>> {
        records.into_iter().map(|r| self.upsert(r)).collect()
    }

    /// Look up a record by key.
    pub fn get(&self, key: &str) -> Option<Arc<Record>> {
        self.live.get(key).map(|entry| Arc::clone(&entry.record))
    }

    /// Records matching `predicate`, at most `limit` of them, in no
    /// particular order. The result is a snapshot taken during the scan.
    pub fn get_many<F>(&self, predicate: F, limit: usize) -> Vec<Arc<Record>>
    where
        F: Fn(&Record) -> bool,
    {
        self.live
            .iter()
            .filter(|entry| predicate(&entry.record))
            .take(limit)
            .map(|entry| Arc::clone(&entry.record))
            .collect()
    }

    /// Internal id currently owned by `key`.
    pub fn internal_id(&self, key: &str) -> Option<InternalId> {
        self.live.get(key).and_then(|entry| entry.internal_id)
    }

    /// Remove a record. Returns whether the key was present.
    pub fn delete(&self, key: &str) -> bool {
        self.live.remove(key).is_some()
    }

    /// Resolve `input` to a vector and search.
    pub async fn search(
        &self,
        resolver: &EmbeddingResolver,
        input: impl Into<QueryInput>,
        top: usize,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<SearchHit>> {
        let query = resolver.resolve_cancellable(input.into(), cancel).await?;
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled(format!("search in '{}'", self.name)));
        }
        self.search_vector(&query, top)
    }

    /// Up to `top` live records nearest to `query`, best first.
    pub fn search_vector(&self, query: &[f32], top: usize) -> AppResult<Vec<SearchHit>> {
        let generation = self.generation.read();
        let total = generation.graph.len();
        if top == 0 || total == 0 {
            return Ok(Vec::new());
        }

        if let Some(expected) = self.dimension() {
            if query.len() != expected {
                return Err(AppError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        let mut want = (top + self.options.orphan_margin).min(total);
        loop {
            let candidates = generation.graph.search(query, want);
            let hits = self.live_hits(&generation, query, &candidates, top);
            if hits.len() >= top || want >= total {
                tracing::trace!(
                    collection = %self.name,
                    requested = want,
                    returned = hits.len(),
                    "search complete"
                );
                return Ok(hits);
            }
            want = want.saturating_mul(2).min(total);
        }
    }

    fn live_hits(
        &self,
        generation: &Generation,
        query: &[f32],
        candidates: &[InternalId],
        top: usize,
    ) -> Vec<SearchHit> {
        let slots = generation.slots.read();
        let mut hits: Vec<SearchHit> = candidates
            .iter()
            .filter_map(|&id| {
                let slot = slots.get(id as usize)?.as_ref()?;
                let entry = self.live.get(&slot.key)?;
                if entry.internal_id != Some(id) {
                    return None;
                }
                Some(SearchHit {
                    record: Arc::clone(&entry.record),
                    score: ann::score(self.options.metric, query, &slot.vector),
                })
            })
            .collect();

        self.options.metric.sort_by_score(&mut hits, |h| h.score);
        hits.truncate(top);
        hits
    }

    /// Collections exist from construction; kept for callers that
    /// address collections through an ensure/teardown lifecycle.
    pub fn ensure_exists(&self) {}

    /// Drop every record, the id mapping, the index and the dimension.
    pub fn ensure_deleted(&self) {
        let mut generation = self.generation.write();
        self.live.clear();
        self.dimension.store(0, Ordering::Release);
        *generation = self.new_generation();
        tracing::debug!(collection = %self.name, "collection cleared");
    }

    /// Rebuild the arena and graph from live records, dropping orphans.
    ///
    /// Internal ids are renumbered densely from zero.
    pub fn compact(&self) -> CompactionReport {
        let mut generation = self.generation.write();
        let old_slots = std::mem::take(generation.slots.get_mut());
        let ids_before = old_slots.iter().flatten().count();
        let fresh = self.new_generation();
        let mut slots = Vec::with_capacity(self.live.len());

        for mut entry in self.live.iter_mut() {
            let Some(old_id) = entry.internal_id else {
                continue;
            };
            let Some(slot) = old_slots.get(old_id as usize).and_then(Option::as_ref) else {
                entry.internal_id = None;
                continue;
            };

            let new_id = slots.len() as InternalId;
            if let Err(e) = fresh.graph.add(new_id, &slot.vector) {
                tracing::warn!(
                    collection = %self.name,
                    key = %entry.key(),
                    "dropping vector during compaction: {}",
                    e
                );
                entry.internal_id = None;
                continue;
            }
            slots.push(Some(Slot {
                key: entry.key().clone(),
                vector: Arc::clone(&slot.vector),
            }));
            entry.internal_id = Some(new_id);
        }

        let report = CompactionReport {
            ids_before,
            ids_after: slots.len(),
            orphans_dropped: ids_before.saturating_sub(slots.len()),
        };

        *fresh.slots.write() = slots;
        *generation = fresh;

        tracing::info!(
            collection = %self.name,
            before = report.ids_before,
            after = report.ids_after,
            "compacted collection"
        );
        report
    }

    pub fn stats(&self) -> CollectionStats {
        let generation = self.generation.read();
        let assigned_ids = generation.slots.read().iter().flatten().count();
        let live_vectors = self
            .live
            .iter()
            .filter(|entry| entry.internal_id.is_some())
            .count();

        CollectionStats {
            name: self.name.clone(),
            metric: self.options.metric,
            dimension: self.dimension(),
            records: self.live.len(),
            live_vectors,
            assigned_ids,
            orphans: assigned_ids.saturating_sub(live_vectors),
        }
    }

    /// Fix the dimension to `len` if unset. Returns whether this call set it.
    fn claim_dimension(&self, len: usize) -> AppResult<bool> {
        match self
            .dimension
            .compare_exchange(0, len, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(true),
            Err(existing) if existing == len => Ok(false),
            Err(existing) => Err(AppError::DimensionMismatch {
                expected: existing,
                actual: len,
            }),
        }
    }

    /// Undo the arena side of an upsert whose graph insert failed.
    ///
    /// Runs under the same generation read guard as the upsert, so the
    /// arena cannot have been replaced in between.
    fn reject_slot(&self, generation: &Generation, id: InternalId, len: usize, claimed: bool) {
        let mut slots = generation.slots.write();
        if let Some(slot) = slots.get_mut(id as usize) {
            *slot = None;
        }
        if claimed && slots.iter().all(Option::is_none) {
            // Another upsert of the same length may have pushed meanwhile;
            // the dimension is only released when no vector holds it.
            let _ = self
                .dimension
                .compare_exchange(len, 0, Ordering::AcqRel, Ordering::Acquire);
        }
    }
}

fn validate_values(vector: &[f32]) -> AppResult<()> {
    if vector.is_empty() {
        return Err(AppError::Knowledge("vector must not be empty".to_string()));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(AppError::Knowledge(
            "vector contains non-finite values".to_string(),
        ));
    }
    Ok(())
}
