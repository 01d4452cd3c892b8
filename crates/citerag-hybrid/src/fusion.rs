//! Score fusion: vector similarity, per-call BM25 over the candidate texts,
//! and a trust boost per corpus origin.
use std::cmp::Ordering;

use citerag_core::config::FusionSettings;
use citerag_core::types::Candidate;
use citerag_lexical::{Bm25Params, LexicalIndex};

#[derive(Debug, Clone, Default)]
pub struct FusionEngine {
    settings: FusionSettings,
}

impl FusionEngine {
    pub fn new(settings: FusionSettings) -> Self { Self { settings } }

    /// `min(lexical / divisor, 1)` for positive scores, else `0`.
    pub fn normalize_lexical(&self, lexical: f32) -> f32 {
        if lexical > 0.0 { (lexical / self.settings.lexical_divisor).min(1.0) } else { 0.0 }
    }

    pub fn boost_for(&self, source_type: &str) -> f32 {
        self.settings.source_boost.get(source_type).copied().unwrap_or(self.settings.default_boost)
    }

    pub fn fuse(&self, vector_score: f32, normalized_lexical: f32, boost: f32) -> f32 {
        (self.settings.vector_weight * vector_score + self.settings.lexical_weight * normalized_lexical) * boost
    }

    /// Ranks `candidates` (in vector-stage order) and keeps the best `limit`.
    ///
    /// With `rerank` off, or fewer than two candidates, the input order and
    /// scores are returned untouched. Ties keep their vector-stage order.
    pub fn rank(&self, query: &str, mut candidates: Vec<Candidate>, limit: usize, rerank: bool) -> Vec<Candidate> {
        if !rerank || candidates.len() < 2 {
            candidates.truncate(limit);
            return candidates;
        }

        let index = LexicalIndex::build(candidates.iter().map(|c| c.chunk.text.as_str()), Bm25Params::from(&self.settings.bm25));
        let lexical = index.score_query(query);
        for (candidate, lexical) in candidates.iter_mut().zip(lexical) {
            candidate.lexical_score = lexical;
            candidate.normalized_lexical_score = self.normalize_lexical(lexical);
            candidate.source_boost = self.boost_for(&candidate.chunk.source_type);
            candidate.final_score = self.fuse(candidate.vector_score, candidate.normalized_lexical_score, candidate.source_boost);
        }
        // +0.0 and -0.0 must compare equal so ties keep vector-stage order
        candidates.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap_or(Ordering::Equal));
        candidates.truncate(limit);
        tracing::debug!(query_terms = query.split_whitespace().count(), kept = candidates.len(), "fused candidate scores");
        candidates
    }
}
