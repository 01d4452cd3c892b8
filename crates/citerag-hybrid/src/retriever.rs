//! Query-time orchestration: embed, vector search, fuse.
use std::time::Instant;

use citerag_core::config::{FusionSettings, RetrievalSettings};
use citerag_core::traits::{Embedder, VectorSearch};
use citerag_core::types::{Candidate, Query, SearchRequest};
use citerag_core::{Error, Result};

use crate::fusion::FusionEngine;

/// Holds no per-call state, so one instance can serve concurrent queries.
pub struct Retriever<E, V> {
    embedder: E,
    store: V,
    fusion: FusionEngine,
    rerank: bool,
}

impl<E: Embedder, V: VectorSearch> Retriever<E, V> {
    pub fn new(embedder: E, store: V, fusion: FusionEngine) -> Self {
        Self { embedder, store, fusion, rerank: true }
    }

    pub fn from_settings(embedder: E, store: V, retrieval: &RetrievalSettings, fusion: &FusionSettings) -> Self {
        Self::new(embedder, store, FusionEngine::new(fusion.clone())).with_rerank(retrieval.rerank)
    }

    #[must_use]
    pub fn with_rerank(mut self, rerank: bool) -> Self {
        self.rerank = rerank;
        self
    }

    /// Ranked candidates for `query`, best first, at most
    /// [`Query::final_count`] of them.
    pub fn retrieve(&self, query: &Query) -> Result<Vec<Candidate>> {
        let text = query.text.trim();
        if text.is_empty() || query.top_k == 0 {
            tracing::debug!("blank query or zero top_k; nothing to retrieve");
            return Ok(Vec::new());
        }
        let start = Instant::now();

        let vector = self.embedder.embed(text).map_err(Error::embedding)?;
        if vector.len() != self.embedder.dim() {
            return Err(Error::DimensionMismatch { expected: self.embedder.dim(), actual: vector.len() });
        }

        let request = SearchRequest {
            vector: &vector,
            limit: query.top_k,
            score_threshold: query.score_threshold,
            filter: query.filter.as_ref(),
        };
        let points = self.store.search(&request).map_err(|e| match e.downcast::<Error>() {
            Ok(err) => err,
            Err(other) => Error::vector_store(other),
        })?;
        if points.is_empty() {
            tracing::info!(top_k = query.top_k, "vector search returned no candidates");
            return Ok(Vec::new());
        }

        let candidates: Vec<Candidate> = points.into_iter().map(Candidate::from).collect();
        let retrieved = candidates.len();
        let ranked = self.fusion.rank(text, candidates, query.final_count(), self.rerank);
        tracing::info!(
            retrieved,
            returned = ranked.len(),
            rerank = self.rerank,
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "retrieval complete"
        );
        Ok(ranked)
    }
}
