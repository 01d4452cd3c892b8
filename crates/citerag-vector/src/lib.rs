//! Vector storage for chunk embeddings.
//!
//! [`LanceVectorStore`] persists points in an embedded LanceDB table;
//! [`MemoryVectorStore`] keeps them in process for tests and small corpora.
//! [`IngestPipeline`] embeds chunk records and upserts them under the
//! single-run ingestion guard.

pub mod ingest;
pub mod lance;
pub mod memory;
pub mod schema;
pub mod table;

pub use ingest::{IngestPipeline, IngestReport};
pub use lance::LanceVectorStore;
pub use memory::MemoryVectorStore;

/// Cosine similarity; `0.0` when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na <= 0.0 || nb <= 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}
