//! Embeds chunk records and writes them to a vector store.
//!
//! Runs under an [`IngestionTask`] guard; cancellation is honoured between
//! batches, so an already-submitted batch is always written completely.
use anyhow::anyhow;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use citerag_core::chunker::ChunkRecord;
use citerag_core::task::{IngestionTask, IngestionTaskManager};
use citerag_core::traits::{Embedder, VectorSearch};
use citerag_core::types::VectorPoint;
use citerag_core::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub task_id: String,
    pub chunks_indexed: usize,
    pub batches: usize,
}

pub struct IngestPipeline<'a, E: ?Sized, V: ?Sized> {
    embedder: &'a E,
    store: &'a V,
    batch_size: usize,
    show_progress: bool,
}

impl<'a, E, V> IngestPipeline<'a, E, V>
where
    E: Embedder + ?Sized,
    V: VectorSearch + ?Sized,
{
    pub fn new(embedder: &'a E, store: &'a V, batch_size: usize) -> Self {
        Self { embedder, store, batch_size: batch_size.max(1), show_progress: false }
    }

    #[must_use]
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Starts a new ingestion run and indexes `records`. Fails with
    /// [`Error::IngestionInProgress`] if another run holds the manager.
    pub fn run(&self, tasks: &IngestionTaskManager, records: &[ChunkRecord]) -> Result<IngestReport> {
        let task = tasks.start()?;
        self.run_task(&task, records)
    }

    pub fn run_task(&self, task: &IngestionTask<'_>, records: &[ChunkRecord]) -> Result<IngestReport> {
        let pb = if self.show_progress { ProgressBar::new(records.len() as u64) } else { ProgressBar::hidden() };
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
                .map(|s| s.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let mut report = IngestReport { task_id: task.id().to_string(), ..IngestReport::default() };
        for batch in records.chunks(self.batch_size) {
            task.check_cancelled()?;
            let texts: Vec<String> = batch.iter().map(|r| r.chunk_text.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).map_err(Error::embedding)?;
            if vectors.len() != batch.len() {
                return Err(Error::embedding(anyhow!("embedder returned {} vectors for {} texts", vectors.len(), batch.len())));
            }
            let mut points = Vec::with_capacity(batch.len());
            for (record, vector) in batch.iter().zip(vectors) {
                if vector.len() != self.embedder.dim() {
                    return Err(Error::DimensionMismatch { expected: self.embedder.dim(), actual: vector.len() });
                }
                points.push(VectorPoint { id: record.id.clone(), vector, payload: record.to_payload()? });
            }
            self.store.upsert(&points).map_err(Error::vector_store)?;
            report.chunks_indexed += points.len();
            report.batches += 1;
            pb.set_position(report.chunks_indexed as u64);
            tracing::debug!(task_id = %report.task_id, indexed = report.chunks_indexed, total = records.len(), "ingested batch");
        }
        pb.finish_and_clear();
        tracing::info!(task_id = %report.task_id, chunks = report.chunks_indexed, batches = report.batches, "ingestion complete");
        Ok(report)
    }
}
