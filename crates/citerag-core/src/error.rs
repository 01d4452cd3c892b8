use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Embedding failed: {0}")]
    Embedding(#[source] BoxError),

    #[error("Vector store failed: {0}")]
    VectorStore(#[source] BoxError),

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Ingestion already running: {task_id}")]
    IngestionInProgress { task_id: String },

    #[error("Ingestion cancelled: {task_id}")]
    IngestionCancelled { task_id: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn embedding(err: anyhow::Error) -> Self { Self::Embedding(err.into()) }

    pub fn vector_store(err: anyhow::Error) -> Self { Self::VectorStore(err.into()) }
}

pub type Result<T> = std::result::Result<T, Error>;
