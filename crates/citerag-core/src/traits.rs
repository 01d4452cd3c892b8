use anyhow::anyhow;

use crate::types::{CollectionInfo, ScoredPoint, SearchRequest, VectorPoint};

/// Maps text to fixed-dimension vectors. Implementations must be
/// deterministic for identical input within one model version.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow!("embedder returned no vector"))
    }
}

/// Persists vectors with payloads and answers cosine nearest-neighbour
/// lookups, best match first. An empty or missing collection yields an
/// empty result, never an error.
///
/// Filters may only name the fields in
/// [`FILTERABLE_STRING_FIELDS`](crate::types::FILTERABLE_STRING_FIELDS) and
/// [`FILTERABLE_INT_FIELDS`](crate::types::FILTERABLE_INT_FIELDS); any other
/// filter fails with [`Error::InvalidFilter`](crate::Error::InvalidFilter)
/// (see [`SearchFilter::validate`](crate::types::SearchFilter::validate)).
pub trait VectorSearch: Send + Sync {
    fn search(&self, request: &SearchRequest<'_>) -> anyhow::Result<Vec<ScoredPoint>>;
    fn upsert(&self, points: &[VectorPoint]) -> anyhow::Result<()>;
    fn collection_info(&self) -> anyhow::Result<CollectionInfo>;
}

impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn dim(&self) -> usize { (**self).dim() }
    fn max_len(&self) -> usize { (**self).max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> { (**self).embed_batch(texts) }
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> { (**self).embed(text) }
}

impl<T: VectorSearch + ?Sized> VectorSearch for Box<T> {
    fn search(&self, request: &SearchRequest<'_>) -> anyhow::Result<Vec<ScoredPoint>> { (**self).search(request) }
    fn upsert(&self, points: &[VectorPoint]) -> anyhow::Result<()> { (**self).upsert(points) }
    fn collection_info(&self) -> anyhow::Result<CollectionInfo> { (**self).collection_info() }
}
