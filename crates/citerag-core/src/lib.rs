//! citerag-core
//!
//! Shared vocabulary of the retrieval pipeline: chunk and candidate types,
//! the embedding and vector-store seams, the error taxonomy, layered
//! configuration, chunking of source documents and the ingestion task state.

pub mod chunker;
pub mod config;
pub mod error;
pub mod task;
pub mod telemetry;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
