//! Okapi BM25 over an in-memory corpus.
//!
//! `score(q, d) = Σ idf(t) · tf(t,d)·(k1+1) / (tf(t,d) + k1·(1 − b + b·|d|/avgdl))`
//! with the smoothed `idf(t) = ln(1 + (N − n_t + 0.5) / (n_t + 0.5))`, which
//! stays positive even when a term occurs in most of a tiny corpus.

use std::collections::HashMap;

use citerag_core::config::Bm25Settings;

use crate::tokenize::tokenize;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f32,
    /// Document-length normalization strength, in `[0, 1]`.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self { Self { k1: 1.5, b: 0.75 } }
}

impl From<&Bm25Settings> for Bm25Params {
    fn from(s: &Bm25Settings) -> Self { Self { k1: s.k1, b: s.b } }
}

/// Scores a fixed, ordered corpus. Score `i` always belongs to document `i`.
#[derive(Debug, Clone, Default)]
pub struct LexicalIndex {
    params: Bm25Params,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lengths: Vec<usize>,
    avg_doc_length: f32,
    idf: HashMap<String, f32>,
}

impl LexicalIndex {
    pub fn build<I, S>(corpus: I, params: Bm25Params) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut term_freqs = Vec::new();
        let mut doc_lengths = Vec::new();
        let mut doc_freq: HashMap<String, u32> = HashMap::new();
        for text in corpus {
            let tokens = tokenize(text.as_ref());
            doc_lengths.push(tokens.len());
            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                *tf.entry(token).or_insert(0) += 1;
            }
            for term in tf.keys() {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(tf);
        }

        let n = doc_lengths.len() as f32;
        let avg_doc_length = if doc_lengths.is_empty() { 0.0 } else { doc_lengths.iter().sum::<usize>() as f32 / n };
        let idf = doc_freq
            .into_iter()
            .map(|(term, df)| {
                let df = df as f32;
                (term, (1.0 + (n - df + 0.5) / (df + 0.5)).ln())
            })
            .collect();

        tracing::debug!(corpus_size = doc_lengths.len(), avg_doc_length, "built lexical index");
        Self { params, term_freqs, doc_lengths, avg_doc_length, idf }
    }

    pub fn len(&self) -> usize { self.doc_lengths.len() }

    pub fn is_empty(&self) -> bool { self.doc_lengths.is_empty() }

    /// Inverse document frequency of a term; `0.0` for unseen terms.
    pub fn idf(&self, term: &str) -> f32 { self.idf.get(term).copied().unwrap_or(0.0) }

    /// One non-negative score per corpus document, in corpus order. Each
    /// occurrence of a repeated query token contributes again.
    pub fn scores(&self, query_tokens: &[String]) -> Vec<f32> {
        let mut scores = vec![0.0f32; self.len()];
        if self.avg_doc_length <= 0.0 {
            return scores;
        }
        let Bm25Params { k1, b } = self.params;
        for token in query_tokens {
            let Some(&idf) = self.idf.get(token) else { continue };
            for (i, tf) in self.term_freqs.iter().enumerate() {
                let Some(&tf) = tf.get(token) else { continue };
                let tf = tf as f32;
                let dl = self.doc_lengths[i] as f32;
                let norm = tf + k1 * (1.0 - b + b * dl / self.avg_doc_length);
                scores[i] += idf * tf * (k1 + 1.0) / norm;
            }
        }
        scores
    }

    /// Tokenizes `query` with [`tokenize`] and scores it.
    pub fn score_query(&self, query: &str) -> Vec<f32> { self.scores(&tokenize(query)) }
}
