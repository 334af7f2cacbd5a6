//! Vector index abstraction for podcompanion.
//!
//! Stores one unit-normalized embedding per chunk, keyed by a deterministic
//! `episode_id::chunk_id` identifier, and answers nearest-neighbor and
//! metadata-filtered queries. Stores also keep a per-episode centroid cache so
//! recommendation does not have to rescan the whole corpus.

mod memory;
mod sqlite;

pub use memory::MemoryVectorStore;
pub use sqlite::SqliteVectorStore;

use crate::chunking::Chunk;
use crate::error::{CompanionError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Allowed deviation of an indexed vector's L2 norm from 1.
pub const NORM_TOLERANCE: f32 = 1e-4;

/// Characters of chunk text kept in record metadata.
pub const PREVIEW_CHARS: usize = 200;

/// Composite record key, globally unique across episodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RecordId {
    pub episode_id: String,
    pub chunk_id: u32,
}

impl RecordId {
    pub fn new(episode_id: impl Into<String>, chunk_id: u32) -> Self {
        Self {
            episode_id: episode_id.into(),
            chunk_id,
        }
    }

    /// Parse an `episode_id::chunk_id` key.
    pub fn parse(key: &str) -> Result<Self> {
        let (episode_id, chunk_id) = key.rsplit_once("::").ok_or_else(|| {
            CompanionError::InvalidInput(format!("malformed record id: {}", key))
        })?;
        let chunk_id = chunk_id.parse::<u32>().map_err(|_| {
            CompanionError::InvalidInput(format!("malformed chunk id in record id: {}", key))
        })?;
        Ok(Self::new(episode_id, chunk_id))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.episode_id, self.chunk_id)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for RecordId {
    type Error = CompanionError;

    fn try_from(value: String) -> Result<Self> {
        RecordId::parse(&value)
    }
}

/// Metadata stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub episode_id: String,
    pub chunk_id: u32,
    pub ts_start: f64,
    pub ts_end: f64,
    /// Leading characters of the chunk text.
    pub preview: String,
}

/// One indexed chunk embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub id: RecordId,
    /// Unit-normalized embedding vector.
    pub vector: Vec<f32>,
    pub metadata: RecordMetadata,
}

impl EmbeddingRecord {
    /// Build a record for a chunk from an already normalized vector.
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>) -> Self {
        Self {
            id: RecordId::new(chunk.episode_id.clone(), chunk.chunk_id),
            vector,
            metadata: RecordMetadata {
                episode_id: chunk.episode_id.clone(),
                chunk_id: chunk.chunk_id,
                ts_start: chunk.ts_start,
                ts_end: chunk.ts_end,
                preview: chunk.text.chars().take(PREVIEW_CHARS).collect(),
            },
        }
    }
}

/// A nearest-neighbor hit.
#[derive(Debug, Clone, Serialize)]
pub struct QueryHit {
    pub id: RecordId,
    /// Cosine distance (`1 - cosine similarity`), lower is closer.
    pub distance: f32,
    pub metadata: RecordMetadata,
}

impl QueryHit {
    /// Cosine similarity of the hit.
    pub fn similarity(&self) -> f32 {
        1.0 - self.distance
    }
}

/// Exact-match predicate over record metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    /// Only records of this episode.
    pub episode_id: Option<String>,
    /// Skip records of this episode.
    pub exclude_episode_id: Option<String>,
}

impl MetadataFilter {
    /// Match every record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Match the records of one episode.
    pub fn episode(episode_id: impl Into<String>) -> Self {
        Self {
            episode_id: Some(episode_id.into()),
            exclude_episode_id: None,
        }
    }

    /// Match everything except one episode.
    pub fn excluding(episode_id: impl Into<String>) -> Self {
        Self {
            episode_id: None,
            exclude_episode_id: Some(episode_id.into()),
        }
    }

    pub fn matches(&self, metadata: &RecordMetadata) -> bool {
        if let Some(ep) = &self.episode_id {
            if &metadata.episode_id != ep {
                return false;
            }
        }
        if let Some(ep) = &self.exclude_episode_id {
            if &metadata.episode_id == ep {
                return false;
            }
        }
        true
    }
}

/// Summary information about an indexed episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexedEpisode {
    pub episode_id: String,
    /// Number of indexed chunks.
    pub chunk_count: u32,
    /// Largest chunk end time in seconds.
    pub duration_seconds: f64,
    /// When the episode was last written.
    pub indexed_at: DateTime<Utc>,
}

/// Trait for vector store implementations.
///
/// Concurrent readers may observe a partially applied `upsert` from another
/// writer; `replace_episode` is atomic per episode.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or overwrite records by id.
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<usize>;

    /// Delete every record of an episode and insert the given ones in one step.
    async fn replace_episode(&self, episode_id: &str, records: &[EmbeddingRecord])
        -> Result<usize>;

    /// Nearest neighbors by cosine distance, closest first.
    async fn query_by_vector(&self, vector: &[f32], top_n: usize) -> Result<Vec<QueryHit>>;

    /// All records matching the filter, vectors included, ordered by id.
    async fn query_by_filter(&self, filter: &MetadataFilter) -> Result<Vec<EmbeddingRecord>>;

    /// Delete records by episode id.
    async fn delete_episode(&self, episode_id: &str) -> Result<usize>;

    /// Distinct indexed episode ids in lexicographic order.
    async fn list_episode_ids(&self) -> Result<Vec<String>>;

    /// Mean of an episode's vectors, `None` when it has no records.
    async fn episode_centroid(&self, episode_id: &str) -> Result<Option<Vec<f32>>> {
        let records = self
            .query_by_filter(&MetadataFilter::episode(episode_id))
            .await?;
        let vectors: Vec<&[f32]> = records.iter().map(|r| r.vector.as_slice()).collect();
        Ok(mean_vector(&vectors))
    }

    /// Per-episode summaries, most recently indexed first.
    async fn list_episodes(&self) -> Result<Vec<IndexedEpisode>>;

    /// Check if an episode has any records.
    async fn is_episode_indexed(&self, episode_id: &str) -> Result<bool> {
        Ok(self.episode_centroid(episode_id).await?.is_some())
    }

    /// Total record count.
    async fn record_count(&self) -> Result<usize>;
}

/// Reject records that would break the index invariants.
pub(crate) fn validate_records(
    records: &[EmbeddingRecord],
    existing_dimensions: Option<usize>,
) -> Result<()> {
    let mut dimensions = existing_dimensions;
    for record in records {
        if record.vector.is_empty() {
            return Err(CompanionError::InvalidInput(format!(
                "record {} has an empty vector",
                record.id
            )));
        }
        if record.metadata.episode_id != record.id.episode_id
            || record.metadata.chunk_id != record.id.chunk_id
        {
            return Err(CompanionError::InvalidInput(format!(
                "record {} metadata does not match its id",
                record.id
            )));
        }
        let norm = l2_norm(&record.vector);
        if !norm.is_finite() || (norm - 1.0).abs() > NORM_TOLERANCE {
            return Err(CompanionError::InvalidInput(format!(
                "record {} is not unit-normalized (norm {})",
                record.id, norm
            )));
        }
        match dimensions {
            Some(d) if d != record.vector.len() => {
                return Err(CompanionError::InvalidInput(format!(
                    "record {} has {} dimensions, index holds {}",
                    record.id,
                    record.vector.len(),
                    d
                )));
            }
            Some(_) => {}
            None => dimensions = Some(record.vector.len()),
        }
    }
    Ok(())
}

/// Reject a query vector whose dimension differs from the index.
pub(crate) fn validate_query(vector: &[f32], index_dimensions: Option<usize>) -> Result<()> {
    match index_dimensions {
        Some(d) if d != vector.len() => Err(CompanionError::InvalidInput(format!(
            "query has {} dimensions, index holds {}",
            vector.len(),
            d
        ))),
        _ => Ok(()),
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = l2_norm(a);
    let norm_b = l2_norm(b);

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Euclidean length of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale a vector to unit length. Zero or non-finite vectors are rejected.
pub fn l2_normalize(v: &[f32]) -> Result<Vec<f32>> {
    let norm = l2_norm(v);
    if norm == 0.0 || !norm.is_finite() {
        return Err(CompanionError::Embedding(
            "cannot normalize a zero or non-finite vector".to_string(),
        ));
    }
    Ok(v.iter().map(|x| x / norm).collect())
}

/// Elementwise arithmetic mean. `None` for no input or mixed dimensions.
pub fn mean_vector(vectors: &[&[f32]]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let dims = first.len();
    if vectors.iter().any(|v| v.len() != dims) {
        return None;
    }

    let mut sum = vec![0.0f32; dims];
    for v in vectors {
        for (acc, x) in sum.iter_mut().zip(v.iter()) {
            *acc += x;
        }
    }
    let n = vectors.len() as f32;
    Some(sum.into_iter().map(|x| x / n).collect())
}
