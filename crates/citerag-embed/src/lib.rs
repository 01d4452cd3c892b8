//! citerag-embed
//!
//! Text embedders behind the core [`Embedder`] trait: a candle sentence
//! encoder for real corpora and a hashing embedder for tests and offline use.
use anyhow::Result;
use std::hash::{Hash, Hasher};
use twox_hash::XxHash64;

use citerag_core::config::{expand_path, EmbeddingBackend, EmbeddingSettings};
use citerag_core::traits::Embedder;
use citerag_core::Error;

pub mod device;
pub mod model;
pub mod pool;
pub mod tokenize;

pub use model::SentenceEmbedder;
pub use pool::masked_mean_l2;

/// Deterministic bag-of-tokens embedder: each whitespace token is hashed
/// into one of `dim` buckets, then the vector is L2-normalized.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = usize::try_from(h % self.dim as u64).unwrap_or(0);
            v[idx] += 0.5 + f32::from((h >> 48) as u16) / f32::from(u16::MAX);
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for HashEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Builds the configured embedder and checks that its dimension matches
/// `settings.dim`, which must also be the vector store's dimension.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    let embedder: Box<dyn Embedder> = match settings.backend {
        EmbeddingBackend::Hash => {
            tracing::info!(dim = settings.dim, "using hash embedder");
            Box::new(HashEmbedder::new(settings.dim))
        }
        EmbeddingBackend::Candle => {
            let dir = model::resolve_model_dir(&expand_path(&settings.model_dir))?;
            Box::new(SentenceEmbedder::load(&dir, settings.max_len, settings.batch_size)?)
        }
    };
    if embedder.dim() != settings.dim {
        return Err(Error::DimensionMismatch { expected: settings.dim, actual: embedder.dim() }.into());
    }
    Ok(embedder)
}
