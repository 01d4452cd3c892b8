//! In-process [`VectorSearch`] with brute-force cosine scoring.
use anyhow::Result;
use std::sync::{PoisonError, RwLock};

use citerag_core::traits::VectorSearch;
use citerag_core::types::{CollectionInfo, ScoredPoint, SearchRequest, VectorPoint};
use citerag_core::Error;

use crate::cosine_similarity;

#[derive(Debug)]
pub struct MemoryVectorStore {
    name: String,
    dim: usize,
    points: RwLock<Vec<VectorPoint>>,
}

impl MemoryVectorStore {
    pub fn new(name: impl Into<String>, dim: usize) -> Self {
        Self { name: name.into(), dim, points: RwLock::new(Vec::new()) }
    }

    pub fn len(&self) -> usize { self.points.read().unwrap_or_else(PoisonError::into_inner).len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn check_dim(&self, actual: usize) -> Result<()> {
        if actual != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual }.into());
        }
        Ok(())
    }
}

impl VectorSearch for MemoryVectorStore {
    fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<ScoredPoint>> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }
        self.check_dim(request.vector.len())?;
        if let Some(filter) = request.filter {
            filter.validate()?;
        }
        let points = self.points.read().unwrap_or_else(PoisonError::into_inner);
        let mut hits: Vec<ScoredPoint> = points
            .iter()
            .filter(|p| request.filter.is_none_or(|f| f.matches(&p.payload)))
            .map(|p| ScoredPoint {
                id: p.id.clone(),
                score: Some(cosine_similarity(request.vector, &p.vector)),
                payload: p.payload.clone(),
            })
            .filter(|p| match (request.score_threshold, p.score) {
                (Some(t), Some(s)) => s >= t,
                _ => true,
            })
            .collect();
        hits.sort_by(|a, b| b.score.unwrap_or(0.0).total_cmp(&a.score.unwrap_or(0.0)));
        hits.truncate(request.limit);
        Ok(hits)
    }

    fn upsert(&self, points: &[VectorPoint]) -> Result<()> {
        for p in points {
            self.check_dim(p.vector.len())?;
        }
        let mut stored = self.points.write().unwrap_or_else(PoisonError::into_inner);
        for p in points {
            match stored.iter_mut().find(|s| s.id == p.id) {
                Some(existing) => *existing = p.clone(),
                None => stored.push(p.clone()),
            }
        }
        Ok(())
    }

    fn collection_info(&self) -> Result<CollectionInfo> {
        Ok(CollectionInfo { name: self.name.clone(), points_count: self.len(), dimension: self.dim })
    }
}
