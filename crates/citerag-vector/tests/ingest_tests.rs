use citerag_core::chunker::{ChunkRecord, Chunker, SourceDocument};
use citerag_core::task::IngestionTaskManager;
use citerag_core::traits::{Embedder, VectorSearch};
use citerag_core::types::SearchRequest;
use citerag_core::Error;
use citerag_embed::HashEmbedder;
use citerag_vector::{IngestPipeline, MemoryVectorStore};

fn records(n: usize) -> Vec<ChunkRecord> {
    let chunker = Chunker::default();
    (0..n)
        .flat_map(|i| {
            let doc = SourceDocument {
                url: format!("https://docs/{i}"),
                title: Some(format!("Page {i}")),
                body: format!("page {i} explains option number {i}"),
                ..SourceDocument::default()
            };
            chunker.chunk_document(&doc, "swc_docs")
        })
        .collect()
}

/// Requests cancellation once it has embedded `after` batches.
struct CancelAfter<'a> {
    inner: HashEmbedder,
    tasks: &'a IngestionTaskManager,
    after: usize,
    calls: std::sync::atomic::AtomicUsize,
}

impl Embedder for CancelAfter<'_> {
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let calls = self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        if calls >= self.after {
            self.tasks.request_cancel();
        }
        self.inner.embed_batch(texts)
    }
}

#[test]
fn pipeline_indexes_all_records_in_batches() {
    let embedder = HashEmbedder::new(32);
    let store = MemoryVectorStore::new("documents", 32);
    let tasks = IngestionTaskManager::new();
    let recs = records(5);

    let report = IngestPipeline::new(&embedder, &store, 2).run(&tasks, &recs).expect("ingest");
    assert_eq!(report.chunks_indexed, 5);
    assert_eq!(report.batches, 3);
    assert!(report.task_id.starts_with("ingest-"));
    assert!(!tasks.snapshot().running, "state resets after completion");

    let q = embedder.embed("page 3 explains option number 3").unwrap();
    let hits = store.search(&SearchRequest::new(&q, 1)).unwrap();
    assert_eq!(hits[0].payload.get("title").and_then(|v| v.as_str()), Some("Page 3"));
}

#[test]
fn second_run_is_rejected_while_one_is_active() {
    let embedder = HashEmbedder::new(8);
    let store = MemoryVectorStore::new("documents", 8);
    let tasks = IngestionTaskManager::new();
    let _running = tasks.start_with_id("ingest-first").unwrap();

    let err = IngestPipeline::new(&embedder, &store, 2).run(&tasks, &records(1)).unwrap_err();
    assert!(matches!(err, Error::IngestionInProgress { ref task_id } if task_id == "ingest-first"));
    assert!(store.is_empty());
}

#[test]
fn cancellation_stops_between_batches_and_resets_state() {
    let tasks = IngestionTaskManager::new();
    let embedder = CancelAfter { inner: HashEmbedder::new(8), tasks: &tasks, after: 1, calls: 0.into() };
    let store = MemoryVectorStore::new("documents", 8);

    let err = IngestPipeline::new(&embedder, &store, 2).run(&tasks, &records(6)).unwrap_err();
    assert!(matches!(err, Error::IngestionCancelled { .. }));
    assert_eq!(store.len(), 2, "the batch in flight is written, later ones are not");
    let state = tasks.snapshot();
    assert!(!state.running && !state.cancel_requested && state.task_id.is_none());
}

#[test]
fn dimension_mismatch_is_reported() {
    let embedder = HashEmbedder::new(8);
    let store = MemoryVectorStore::new("documents", 16);
    let tasks = IngestionTaskManager::new();
    let err = IngestPipeline::new(&embedder, &store, 4).run(&tasks, &records(1)).unwrap_err();
    assert!(matches!(err, Error::VectorStore(_)));
}
