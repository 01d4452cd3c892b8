//! LanceDB-backed [`VectorSearch`].
//!
//! The store owns a tokio runtime and blocks on it, so callers stay
//! synchronous. Do not call it from inside another tokio runtime.
use anyhow::{anyhow, Context, Result};
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Runtime;

use citerag_core::config::StoreSettings;
use citerag_core::traits::VectorSearch;
use citerag_core::types::{Chunk, CollectionInfo, Payload, ScoredPoint, SearchFilter, SearchRequest, VectorPoint};
use citerag_core::Error;

use crate::schema::build_arrow_schema;
use crate::table::{open_db, open_table_if_exists};

pub struct LanceVectorStore {
    rt: Runtime,
    db: Connection,
    table_name: String,
    dim: usize,
}

impl LanceVectorStore {
    pub fn open(uri: &str, table_name: &str, dim: usize) -> Result<Self> {
        let rt = Runtime::new()?;
        let db = rt.block_on(open_db(uri)).with_context(|| format!("opening LanceDB at {uri}"))?;
        tracing::info!(uri, table = table_name, dim, "opened vector store");
        Ok(Self { rt, db, table_name: table_name.to_string(), dim })
    }

    pub fn from_settings(settings: &StoreSettings, dim: usize) -> Result<Self> {
        let uri = citerag_core::config::expand_path(&settings.uri);
        Self::open(&uri.to_string_lossy(), &settings.table, dim)
    }

    pub fn table_name(&self) -> &str { &self.table_name }

    fn check_dim(&self, actual: usize) -> Result<()> {
        if actual != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual }.into());
        }
        Ok(())
    }

    fn points_to_record_batch(&self, points: &[&VectorPoint]) -> Result<RecordBatch> {
        let dim = i32::try_from(self.dim).context("vector dimension does not fit the table schema")?;
        let mut ids = Vec::with_capacity(points.len());
        let mut sources = Vec::with_capacity(points.len());
        let mut urls = Vec::with_capacity(points.len());
        let mut titles = Vec::with_capacity(points.len());
        let mut headings = Vec::with_capacity(points.len());
        let mut texts = Vec::with_capacity(points.len());
        let mut chunk_indices = Vec::with_capacity(points.len());
        let mut total_chunks = Vec::with_capacity(points.len());
        let mut payloads = Vec::with_capacity(points.len());
        let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(points.len());
        for p in points {
            let chunk = Chunk::from_payload(&p.id, &p.payload);
            ids.push(p.id.clone());
            sources.push(chunk.source_type);
            urls.push(chunk.url);
            titles.push(chunk.title);
            headings.push(chunk.heading_path);
            texts.push(chunk.text);
            chunk_indices.push(i32::try_from(chunk.sequence_index).unwrap_or(i32::MAX));
            total_chunks.push(i32::try_from(chunk.total_in_source).unwrap_or(i32::MAX));
            payloads.push(serde_json::to_string(&p.payload)?);
            vectors.push(Some(p.vector.iter().map(|&x| Some(x)).collect()));
        }
        let batch = RecordBatch::try_new(build_arrow_schema(dim), vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(urls)),
            Arc::new(StringArray::from(titles)),
            Arc::new(StringArray::from(headings)),
            Arc::new(StringArray::from(texts)),
            Arc::new(Int32Array::from(chunk_indices)),
            Arc::new(Int32Array::from(total_chunks)),
            Arc::new(StringArray::from(payloads)),
            Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors, dim)),
        ])?;
        Ok(batch)
    }
}

impl VectorSearch for LanceVectorStore {
    fn search(&self, request: &SearchRequest<'_>) -> Result<Vec<ScoredPoint>> {
        if request.limit == 0 {
            return Ok(Vec::new());
        }
        self.check_dim(request.vector.len())?;
        let predicate = request.filter.map(filter_to_sql).transpose()?.flatten();

        let mut points = self.rt.block_on(async {
            let Some(table) = open_table_if_exists(&self.db, &self.table_name).await? else {
                return Ok::<_, anyhow::Error>(Vec::new());
            };
            if table.count_rows(None).await? == 0 {
                return Ok(Vec::new());
            }
            let mut query = table
                .vector_search(request.vector.to_vec())?
                .distance_type(DistanceType::Cosine)
                .limit(request.limit);
            if let Some(predicate) = &predicate {
                query = query.only_if(predicate.as_str());
            }
            let mut stream = query.execute().await?;
            let mut points = Vec::new();
            while let Some(batch) = stream.try_next().await? {
                points.extend(batch_to_points(&batch)?);
            }
            Ok(points)
        })?;

        if let Some(threshold) = request.score_threshold {
            points.retain(|p| p.score.is_some_and(|s| s >= threshold));
        }
        points.sort_by(|a, b| b.score.unwrap_or(f32::MIN).total_cmp(&a.score.unwrap_or(f32::MIN)));
        points.truncate(request.limit);
        tracing::debug!(table = %self.table_name, hits = points.len(), filtered = predicate.is_some(), "vector search");
        Ok(points)
    }

    fn upsert(&self, points: &[VectorPoint]) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        for p in points {
            self.check_dim(p.vector.len())?;
        }
        // last write wins for ids repeated within one call
        let mut last: HashMap<&str, usize> = HashMap::new();
        for (i, p) in points.iter().enumerate() {
            last.insert(p.id.as_str(), i);
        }
        let unique: Vec<&VectorPoint> = points.iter().enumerate().filter(|(i, p)| last.get(p.id.as_str()) == Some(i)).map(|(_, p)| p).collect();

        let batch = self.points_to_record_batch(&unique)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        self.rt.block_on(async {
            match open_table_if_exists(&self.db, &self.table_name).await? {
                Some(table) => {
                    let mut mi = table.merge_insert(&["id"]);
                    mi.when_matched_update_all(None).when_not_matched_insert_all();
                    let _ = mi.execute(reader).await?;
                }
                None => {
                    self.db.create_table(&self.table_name, reader).execute().await?;
                }
            }
            Ok::<_, anyhow::Error>(())
        })?;
        tracing::debug!(table = %self.table_name, points = unique.len(), "upserted points");
        Ok(())
    }

    fn collection_info(&self) -> Result<CollectionInfo> {
        let points_count = self.rt.block_on(async {
            match open_table_if_exists(&self.db, &self.table_name).await? {
                Some(table) => Ok::<_, anyhow::Error>(table.count_rows(None).await?),
                None => Ok(0),
            }
        })?;
        Ok(CollectionInfo { name: self.table_name.clone(), points_count, dimension: self.dim })
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow!("{name} column missing"))
}

fn batch_to_points(batch: &RecordBatch) -> Result<Vec<ScoredPoint>> {
    let ids = string_column(batch, "id")?;
    let payloads = string_column(batch, "payload")?;
    let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let payload: Payload = serde_json::from_str(payloads.value(i))?;
        let score = distances.filter(|d| !d.is_null(i)).map(|d| 1.0 - d.value(i));
        out.push(ScoredPoint { id: ids.value(i).to_string(), score, payload });
    }
    Ok(out)
}

/// Renders a payload filter as a LanceDB SQL predicate over the scalar
/// columns; `None` for an empty filter.
pub fn filter_to_sql(filter: &SearchFilter) -> citerag_core::Result<Option<String>> {
    filter.validate()?;
    if filter.is_empty() {
        return Ok(None);
    }
    let clauses: Vec<String> = filter
        .conditions()
        .iter()
        .map(|cond| match &cond.value {
            Value::String(s) => format!("{} = '{}'", cond.key, s.replace('\'', "''")),
            other => format!("{} = {other}", cond.key),
        })
        .collect();
    Ok(Some(clauses.join(" AND ")))
}
