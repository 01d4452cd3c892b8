//! Normalization and overlapping chunking of source documents.
//!
//! Documents arrive as JSONL records from the crawlers/importers; each is
//! turned into chunk records whose ids are derived from the source id and
//! the chunk position, so re-chunking identical input yields identical ids.
use anyhow::Result;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::config::ChunkingSettings;
use crate::types::{Chunk, Payload};

const FENCE: &str = "```";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeBlock {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub code: String,
}

/// A normalized document record as produced by the ingesters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceDocument {
    pub url: String,
    pub thread_id: Option<String>,
    pub title: Option<String>,
    pub heading_path: String,
    pub body: String,
    pub code_blocks: Vec<CodeBlock>,
    pub timestamp: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkMetadata {
    pub total_chunks: usize,
    pub code_blocks_count: usize,
}

/// One chunk as written to the chunk JSONL files and stored as the vector
/// payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkRecord {
    pub id: String,
    pub source: String,
    pub url: String,
    pub title: String,
    pub heading_path: String,
    pub chunk_index: usize,
    pub chunk_text: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: String,
    pub author: String,
    pub metadata: ChunkMetadata,
}

impl ChunkRecord {
    /// The record as a vector-store payload, field for field.
    pub fn to_payload(&self) -> serde_json::Result<Payload> {
        serde_json::to_value(self).and_then(serde_json::from_value)
    }
}

impl From<&ChunkRecord> for Chunk {
    fn from(r: &ChunkRecord) -> Self {
        Self {
            id: r.id.clone(),
            source_type: r.source.clone(),
            text: r.chunk_text.clone(),
            title: r.title.clone(),
            heading_path: r.heading_path.clone(),
            url: r.url.clone(),
            sequence_index: r.chunk_index,
            total_in_source: r.metadata.total_chunks,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200 }
    }
}

impl From<&ChunkingSettings> for ChunkingConfig {
    fn from(s: &ChunkingSettings) -> Self {
        Self { chunk_size: s.chunk_size, chunk_overlap: s.chunk_overlap }
    }
}

/// Stable chunk id: first 16 hex chars of the BLAKE3 hash of the source id,
/// then the zero-based chunk position.
pub fn chunk_id(base_id: &str, index: usize) -> String {
    let hash = blake3::hash(base_id.as_bytes()).to_hex();
    format!("{}_{}", &hash.as_str()[..16], index)
}

/// Splits text into chunking units: prose words, and whole fenced code
/// blocks kept verbatim. An unterminated fence is treated as prose.
fn units(text: &str) -> Vec<String> {
    let segments: Vec<&str> = text.split(FENCE).collect();
    let closed = segments.len() % 2 == 1;
    let mut out = Vec::new();
    for (i, segment) in segments.iter().enumerate() {
        let is_code = i % 2 == 1 && (closed || i + 1 < segments.len());
        if is_code {
            out.push(format!("{FENCE}{segment}{FENCE}"));
        } else if i % 2 == 1 {
            out.extend(format!("{FENCE}{segment}").split_whitespace().map(str::to_owned));
        } else {
            out.extend(segment.split_whitespace().map(str::to_owned));
        }
    }
    out
}

#[derive(Debug, Default)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Self { Self { config } }

    /// Greedy word packing up to `chunk_size` characters. Each new chunk
    /// starts with the last `chunk_overlap / 10` units of the previous one.
    pub fn split(&self, text: &str) -> Vec<String> {
        let overlap_units = self.config.chunk_overlap / 10;
        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_len = 0usize;
        for unit in units(text) {
            let unit_len = unit.chars().count() + 1;
            if current_len + unit_len > self.config.chunk_size && !current.is_empty() {
                chunks.push(current.join(" "));
                // always drop at least one unit so a chunk never repeats whole
                let keep = overlap_units.min(current.len() - 1);
                current.drain(..current.len() - keep);
                current.push(unit);
                current_len = current.iter().map(|u| u.chars().count() + 1).sum();
            } else {
                current.push(unit);
                current_len += unit_len;
            }
        }
        if !current.is_empty() {
            chunks.push(current.join(" "));
        }
        chunks
    }

    pub fn chunk_document(&self, doc: &SourceDocument, source: &str) -> Vec<ChunkRecord> {
        let code_text = doc
            .code_blocks
            .iter()
            .map(|cb| format!("{FENCE}{}\n{}\n{FENCE}", cb.language, cb.code))
            .collect::<Vec<_>>()
            .join("\n\n");
        let full_text = format!("{}\n\n{}", doc.body, code_text);
        let full_text = full_text.trim();
        if full_text.is_empty() {
            return Vec::new();
        }

        let chunks = self.split(full_text);
        let base_id = if doc.url.is_empty() { doc.thread_id.as_deref().unwrap_or("unknown") } else { doc.url.as_str() };
        let timestamp = doc.timestamp.clone().unwrap_or_else(|| Utc::now().to_rfc3339());
        let total_chunks = chunks.len();
        chunks
            .into_iter()
            .enumerate()
            .map(|(idx, chunk_text)| ChunkRecord {
                id: chunk_id(base_id, idx),
                source: source.to_string(),
                url: doc.url.clone(),
                title: doc.title.clone().unwrap_or_else(|| "Untitled".to_string()),
                heading_path: doc.heading_path.clone(),
                chunk_index: idx,
                chunk_text,
                kind: "text".to_string(),
                timestamp: timestamp.clone(),
                author: doc.author.clone().unwrap_or_else(|| "unknown".to_string()),
                metadata: ChunkMetadata { total_chunks, code_blocks_count: doc.code_blocks.len() },
            })
            .collect()
    }

    /// Chunks every document of a JSONL file into a chunk JSONL file and
    /// returns the number of chunks written.
    pub fn process_jsonl(&self, input: &Path, output: &Path, source: &str) -> Result<usize> {
        let docs: Vec<SourceDocument> = read_jsonl(input)?;
        let records: Vec<ChunkRecord> = docs.iter().flat_map(|d| self.chunk_document(d, source)).collect();
        let written = write_jsonl(output, &records)?;
        tracing::info!(input = %input.display(), output = %output.display(), documents = docs.len(), chunks = written, "chunked file");
        Ok(written)
    }
}

/// Reads one JSON value per non-empty line. Malformed lines are logged and
/// skipped.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let reader = BufReader::new(fs::File::open(path)?);
    let mut out = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(v) => out.push(v),
            Err(e) => tracing::warn!(path = %path.display(), line = line_no + 1, error = %e, "skipping malformed JSONL line"),
        }
    }
    Ok(out)
}

pub fn write_jsonl<T: Serialize>(path: &Path, items: &[T]) -> Result<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(fs::File::create(path)?);
    for item in items {
        serde_json::to_writer(&mut writer, item)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(items.len())
}
