//! Domain types used by the vector gateway, the ranking engine and the
//! context budgeter.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub type ChunkId = String;

/// Opaque key/value payload stored next to every vector. Only a handful of
/// fields are read by name (see [`Chunk::from_payload`]); everything else is
/// passed through untouched.
pub type Payload = Map<String, Value>;

/// Well-known corpus origins. The set is open: any other tag is accepted and
/// simply receives the neutral boost.
pub mod source {
    pub const DOCS: &str = "swc_docs";
    pub const CODE: &str = "github";
    pub const CHAT: &str = "slack";
}

/// A bounded span of normalized text from one source document.
///
/// - `id`: stable per corpus generation, `<hash(source id)>_<position>`
/// - `source_type`: corpus origin tag, only used for trust boosting
/// - `text`: normalized chunk text
/// - `title`/`heading_path`/`url`: citation metadata
/// - `sequence_index`/`total_in_source`: position within the parent source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub source_type: String,
    pub text: String,
    pub title: String,
    pub heading_path: String,
    pub url: String,
    pub sequence_index: usize,
    pub total_in_source: usize,
}

impl Chunk {
    /// Reads the chunk fields out of a vector-store payload. Missing or
    /// mistyped fields fall back to empty strings and zero; `fallback_id` is
    /// used when the payload carries no `id`.
    pub fn from_payload(fallback_id: &str, payload: &Payload) -> Self {
        let id = match payload.get("id") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => fallback_id.to_string(),
        };
        let total_in_source = payload
            .get("metadata")
            .and_then(|m| m.get("total_chunks"))
            .or_else(|| payload.get("total_chunks"))
            .and_then(Value::as_u64)
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(0);
        Self {
            id,
            source_type: str_field(payload, "source"),
            text: str_field(payload, "chunk_text"),
            title: str_field(payload, "title"),
            heading_path: str_field(payload, "heading_path"),
            url: str_field(payload, "url"),
            sequence_index: payload
                .get("chunk_index")
                .and_then(Value::as_u64)
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(0),
            total_in_source,
        }
    }
}

fn str_field(payload: &Payload, key: &str) -> String {
    payload.get(key).and_then(Value::as_str).map(str::to_owned).unwrap_or_default()
}

/// Payload fields with string values that every vector store can filter on.
pub const FILTERABLE_STRING_FIELDS: &[&str] = &["id", "source", "url", "title", "heading_path", "chunk_text"];
/// Payload fields with integer values that every vector store can filter on.
pub const FILTERABLE_INT_FIELDS: &[&str] = &["chunk_index"];

/// One equality condition of a [`SearchFilter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMatch {
    pub key: String,
    pub value: Value,
}

/// Conjunction of payload equality conditions applied by the vector store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    must: Vec<FieldMatch>,
}

impl SearchFilter {
    pub fn new() -> Self { Self::default() }

    #[must_use]
    pub fn must(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.must.push(FieldMatch { key: key.into(), value: value.into() });
        self
    }

    pub fn conditions(&self) -> &[FieldMatch] { &self.must }

    pub fn is_empty(&self) -> bool { self.must.is_empty() }

    /// Rejects conditions on fields outside [`FILTERABLE_STRING_FIELDS`] and
    /// [`FILTERABLE_INT_FIELDS`], or with a value of the wrong type.
    pub fn validate(&self) -> Result<()> {
        for cond in &self.must {
            let key = cond.key.as_str();
            let is_string = FILTERABLE_STRING_FIELDS.contains(&key);
            let is_int = FILTERABLE_INT_FIELDS.contains(&key);
            if !is_string && !is_int {
                return Err(Error::InvalidFilter(format!("field {key} cannot be filtered")));
            }
            let value_ok = match &cond.value {
                Value::String(_) => is_string,
                Value::Number(n) => is_int && n.is_i64(),
                _ => false,
            };
            if !value_ok {
                return Err(Error::InvalidFilter(format!("unsupported value {} for field {key}", cond.value)));
            }
        }
        Ok(())
    }

    /// True when every condition equals the payload's value for that key.
    pub fn matches(&self, payload: &Payload) -> bool {
        self.must.iter().all(|c| payload.get(&c.key) == Some(&c.value))
    }
}

/// Arguments of one nearest-neighbour lookup.
#[derive(Debug, Clone, Copy)]
pub struct SearchRequest<'a> {
    pub vector: &'a [f32],
    pub limit: usize,
    pub score_threshold: Option<f32>,
    pub filter: Option<&'a SearchFilter>,
}

impl<'a> SearchRequest<'a> {
    pub fn new(vector: &'a [f32], limit: usize) -> Self {
        Self { vector, limit, score_threshold: None, filter: None }
    }
}

/// A point returned by the vector store. `score` is the cosine similarity;
/// `None` when the backend did not report one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: ChunkId,
    pub score: Option<f32>,
    pub payload: Payload,
}

/// A point written to the vector store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: ChunkId,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

/// Health summary of a vector collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    pub points_count: usize,
    pub dimension: usize,
}

/// A chunk scored against one query. Created per retrieval call and never
/// persisted.
///
/// Until fusion runs, `final_score` mirrors `vector_score`, the lexical
/// scores are zero and `source_boost` is neutral.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub chunk: Chunk,
    pub payload: Payload,
    pub vector_score: f32,
    pub lexical_score: f32,
    pub normalized_lexical_score: f32,
    pub source_boost: f32,
    pub final_score: f32,
}

impl Candidate {
    pub fn from_point(point: ScoredPoint) -> Self {
        let vector_score = point.score.filter(|s| s.is_finite()).unwrap_or(0.0);
        let chunk = Chunk::from_payload(&point.id, &point.payload);
        Self {
            chunk,
            payload: point.payload,
            vector_score,
            lexical_score: 0.0,
            normalized_lexical_score: 0.0,
            source_boost: 1.0,
            final_score: vector_score,
        }
    }

    pub fn id(&self) -> &str { &self.chunk.id }
}

impl From<ScoredPoint> for Candidate {
    fn from(point: ScoredPoint) -> Self { Self::from_point(point) }
}

/// A request-scoped retrieval query.
///
/// `top_k` bounds the vector stage; `rerank_top_k` bounds the ranked output
/// and defaults to `top_k`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub text: String,
    pub top_k: usize,
    pub rerank_top_k: Option<usize>,
    pub score_threshold: Option<f32>,
    pub filter: Option<SearchFilter>,
}

impl Query {
    pub fn new(text: impl Into<String>, top_k: usize) -> Self {
        Self { text: text.into(), top_k, ..Self::default() }
    }

    #[must_use]
    pub fn rerank_top_k(mut self, k: usize) -> Self { self.rerank_top_k = Some(k); self }

    #[must_use]
    pub fn score_threshold(mut self, threshold: f32) -> Self { self.score_threshold = Some(threshold); self }

    #[must_use]
    pub fn filter(mut self, filter: SearchFilter) -> Self { self.filter = Some(filter); self }

    pub fn final_count(&self) -> usize { self.rerank_top_k.unwrap_or(self.top_k) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: Value) -> Payload {
        match v { Value::Object(m) => m, _ => Payload::new() }
    }

    #[test]
    fn chunk_from_full_payload() {
        let p = payload(json!({
            "id": "abc_0", "source": "github", "chunk_text": "fn main() {}",
            "title": "main.rs", "heading_path": "src", "url": "https://x/y",
            "chunk_index": 3, "metadata": {"total_chunks": 7}, "author": "kept"
        }));
        let c = Chunk::from_payload("fallback", &p);
        assert_eq!(c.id, "abc_0");
        assert_eq!(c.source_type, "github");
        assert_eq!(c.sequence_index, 3);
        assert_eq!(c.total_in_source, 7);
    }

    #[test]
    fn chunk_from_sparse_payload_uses_defaults() {
        let c = Chunk::from_payload("point-9", &Payload::new());
        assert_eq!(c.id, "point-9");
        assert!(c.text.is_empty() && c.title.is_empty() && c.source_type.is_empty());
        assert_eq!(c.total_in_source, 0);
    }

    #[test]
    fn candidate_defaults_missing_or_nan_score_to_zero() {
        let missing = Candidate::from_point(ScoredPoint { id: "a".into(), score: None, payload: Payload::new() });
        assert_eq!(missing.vector_score, 0.0);
        let nan = Candidate::from_point(ScoredPoint { id: "b".into(), score: Some(f32::NAN), payload: Payload::new() });
        assert_eq!(nan.final_score, 0.0);
        assert_eq!(nan.source_boost, 1.0);
    }

    #[test]
    fn filter_matches_all_conditions() {
        let p = payload(json!({"source": "slack", "title": "t"}));
        assert!(SearchFilter::new().matches(&p));
        assert!(SearchFilter::new().must("source", "slack").matches(&p));
        assert!(!SearchFilter::new().must("source", "slack").must("title", "u").matches(&p));
    }

    #[test]
    fn filter_validation_limits_fields_and_types() {
        assert!(SearchFilter::new().validate().is_ok());
        assert!(SearchFilter::new().must("source", "slack").must("chunk_index", 3).validate().is_ok());
        assert!(matches!(SearchFilter::new().must("author", "bob").validate(), Err(Error::InvalidFilter(_))));
        assert!(matches!(SearchFilter::new().must("source", 3).validate(), Err(Error::InvalidFilter(_))));
        assert!(matches!(SearchFilter::new().must("chunk_index", "3").validate(), Err(Error::InvalidFilter(_))));
    }

    #[test]
    fn query_final_count_defaults_to_top_k() {
        assert_eq!(Query::new("q", 50).final_count(), 50);
        assert_eq!(Query::new("q", 50).rerank_top_k(5).final_count(), 5);
    }
}
