use serde_json::json;

use citerag_core::traits::VectorSearch;
use citerag_core::Error;
use citerag_core::types::{Payload, SearchFilter, SearchRequest, VectorPoint};
use citerag_vector::LanceVectorStore;

fn point(id: &str, vector: Vec<f32>, source: &str, title: &str) -> VectorPoint {
    let payload: Payload = serde_json::from_value(json!({
        "id": id, "source": source, "title": title, "chunk_text": format!("text of {id}"),
        "url": format!("https://x/{id}"), "chunk_index": 0, "metadata": {"total_chunks": 1, "code_blocks_count": 0}
    }))
    .unwrap();
    VectorPoint { id: id.to_string(), vector, payload }
}

#[test]
fn missing_table_is_empty_not_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let store = LanceVectorStore::open(&tmp.path().to_string_lossy(), "documents", 3).unwrap();
    assert!(store.search(&SearchRequest::new(&[1.0, 0.0, 0.0], 5)).unwrap().is_empty());
    assert_eq!(store.collection_info().unwrap().points_count, 0);
}

#[test]
fn upsert_search_and_filter_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let store = LanceVectorStore::open(&tmp.path().to_string_lossy(), "documents", 3).unwrap();
    store
        .upsert(&[
            point("a", vec![1.0, 0.0, 0.0], "swc_docs", "Minify"),
            point("b", vec![0.7, 0.7, 0.0], "slack", "Thread"),
            point("c", vec![0.0, 0.0, 1.0], "github", "O'Reilly"),
        ])
        .unwrap();
    assert_eq!(store.collection_info().unwrap().points_count, 3);

    let hits = store.search(&SearchRequest::new(&[1.0, 0.0, 0.0], 2)).unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].id, "a");
    assert!((hits[0].score.unwrap() - 1.0).abs() < 1e-4);
    assert_eq!(hits[0].payload.get("title").and_then(|v| v.as_str()), Some("Minify"));
    assert!(hits[0].score >= hits[1].score);

    let filter = SearchFilter::new().must("title", "O'Reilly");
    let req = SearchRequest { filter: Some(&filter), ..SearchRequest::new(&[1.0, 0.0, 0.0], 5) };
    let hits = store.search(&req).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "c");

    let req = SearchRequest { score_threshold: Some(0.5), ..SearchRequest::new(&[1.0, 0.0, 0.0], 5) };
    assert_eq!(store.search(&req).unwrap().len(), 2);
}

#[test]
fn upsert_overwrites_existing_ids() {
    let tmp = tempfile::tempdir().unwrap();
    let store = LanceVectorStore::open(&tmp.path().to_string_lossy(), "documents", 3).unwrap();
    store.upsert(&[point("a", vec![1.0, 0.0, 0.0], "swc_docs", "Old")]).unwrap();
    store.upsert(&[point("a", vec![1.0, 0.0, 0.0], "swc_docs", "New"), point("b", vec![0.0, 1.0, 0.0], "slack", "B")]).unwrap();
    assert_eq!(store.collection_info().unwrap().points_count, 2);
    let hits = store.search(&SearchRequest::new(&[1.0, 0.0, 0.0], 1)).unwrap();
    assert_eq!(hits[0].payload.get("title").and_then(|v| v.as_str()), Some("New"));
}

#[test]
fn unknown_filter_key_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    let store = LanceVectorStore::open(&tmp.path().to_string_lossy(), "documents", 3).unwrap();
    store.upsert(&[point("a", vec![1.0, 0.0, 0.0], "swc_docs", "A")]).unwrap();
    let filter = SearchFilter::new().must("author", "x");
    let req = SearchRequest { filter: Some(&filter), ..SearchRequest::new(&[1.0, 0.0, 0.0], 5) };
    let err = store.search(&req).unwrap_err();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidFilter(_))));
}
