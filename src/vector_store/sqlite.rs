//! SQLite-based vector store implementation.
//!
//! Uses SQLite with cosine similarity computed in Rust for simplicity. The same
//! database file also holds the pipeline artifacts (transcripts, chunk sets and
//! affect profiles) so every stage can resume from what the previous one wrote.

use super::{
    cosine_similarity, mean_vector, validate_query, validate_records, EmbeddingRecord,
    IndexedEpisode, MetadataFilter, QueryHit, RecordId, RecordMetadata, VectorStore,
};
use crate::affect::AffectProfile;
use crate::artifacts::{ArtifactStore, StoredTranscript};
use crate::chunking::Chunk;
use crate::error::{CompanionError, Result};
use crate::transcript::Transcript;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, Row};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
    id TEXT PRIMARY KEY,
    episode_id TEXT NOT NULL,
    chunk_id INTEGER NOT NULL,
    ts_start REAL NOT NULL,
    ts_end REAL NOT NULL,
    preview TEXT NOT NULL,
    embedding BLOB NOT NULL,
    indexed_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_records_episode_id ON records(episode_id);

CREATE TABLE IF NOT EXISTS centroids (
    episode_id TEXT PRIMARY KEY,
    centroid BLOB NOT NULL,
    chunk_count INTEGER NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS transcripts (
    episode_id TEXT PRIMARY KEY,
    language TEXT NOT NULL,
    duration REAL NOT NULL,
    segment_count INTEGER NOT NULL,
    transcript_json TEXT NOT NULL,
    stored_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunk_sets (
    episode_id TEXT PRIMARY KEY,
    chunk_count INTEGER NOT NULL,
    segmented_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    episode_id TEXT NOT NULL,
    chunk_id INTEGER NOT NULL,
    text TEXT NOT NULL,
    ts_start REAL NOT NULL,
    ts_end REAL NOT NULL,
    PRIMARY KEY (episode_id, chunk_id)
);

CREATE TABLE IF NOT EXISTS affect_profiles (
    episode_id TEXT PRIMARY KEY,
    profile_json TEXT NOT NULL,
    profiled_at TEXT NOT NULL
);
"#;

const RECORD_COLUMNS: &str = "id, episode_id, chunk_id, ts_start, ts_end, preview, embedding";

/// SQLite-based vector store.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
}

impl SqliteVectorStore {
    /// Create a new SQLite vector store.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrent performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite vector store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite vector store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CompanionError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding
            .iter()
            .flat_map(|f| f.to_le_bytes())
            .collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn read_record(row: &Row<'_>) -> rusqlite::Result<EmbeddingRecord> {
        let episode_id: String = row.get(1)?;
        let chunk_id: u32 = row.get(2)?;
        let embedding_bytes: Vec<u8> = row.get(6)?;

        Ok(EmbeddingRecord {
            id: RecordId::new(episode_id.clone(), chunk_id),
            vector: Self::bytes_to_embedding(&embedding_bytes),
            metadata: RecordMetadata {
                episode_id,
                chunk_id,
                ts_start: row.get(3)?,
                ts_end: row.get(4)?,
                preview: row.get(5)?,
            },
        })
    }

    /// Dimension of stored vectors, optionally ignoring one episode.
    fn stored_dimensions(conn: &Connection, except_episode: Option<&str>) -> Result<Option<usize>> {
        let bytes: rusqlite::Result<i64> = match except_episode {
            Some(ep) => conn.query_row(
                "SELECT length(embedding) FROM records WHERE episode_id != ?1 LIMIT 1",
                params![ep],
                |row| row.get(0),
            ),
            None => conn.query_row("SELECT length(embedding) FROM records LIMIT 1", [], |row| {
                row.get(0)
            }),
        };

        match bytes {
            Ok(b) => Ok(Some(b as usize / 4)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn insert_records(conn: &Connection, records: &[EmbeddingRecord]) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut stmt = conn.prepare(
            r#"
            INSERT OR REPLACE INTO records
            (id, episode_id, chunk_id, ts_start, ts_end, preview, embedding, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )?;

        for record in records {
            stmt.execute(params![
                record.id.to_string(),
                record.metadata.episode_id,
                record.metadata.chunk_id,
                record.metadata.ts_start,
                record.metadata.ts_end,
                record.metadata.preview,
                Self::embedding_to_bytes(&record.vector),
                now,
            ])?;
        }
        Ok(())
    }

    /// Recompute the cached centroid of one episode from its records.
    fn refresh_centroid(conn: &Connection, episode_id: &str) -> Result<()> {
        let mut stmt = conn.prepare("SELECT embedding FROM records WHERE episode_id = ?1")?;
        let vectors = stmt
            .query_map(params![episode_id], |row| {
                let bytes: Vec<u8> = row.get(0)?;
                Ok(Self::bytes_to_embedding(&bytes))
            })?
            .collect::<rusqlite::Result<Vec<Vec<f32>>>>()?;

        let slices: Vec<&[f32]> = vectors.iter().map(|v| v.as_slice()).collect();
        match mean_vector(&slices) {
            Some(centroid) => {
                conn.execute(
                    r#"
                    INSERT OR REPLACE INTO centroids (episode_id, centroid, chunk_count, updated_at)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    params![
                        episode_id,
                        Self::embedding_to_bytes(&centroid),
                        vectors.len() as i64,
                        Utc::now().to_rfc3339(),
                    ],
                )?;
            }
            None => {
                conn.execute(
                    "DELETE FROM centroids WHERE episode_id = ?1",
                    params![episode_id],
                )?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        let conn = self.lock()?;
        validate_records(records, Self::stored_dimensions(&conn, None)?)?;

        let tx = conn.unchecked_transaction()?;
        Self::insert_records(&tx, records)?;

        let episodes: BTreeSet<&str> = records.iter().map(|r| r.id.episode_id.as_str()).collect();
        for episode_id in episodes {
            Self::refresh_centroid(&tx, episode_id)?;
        }

        tx.commit()?;
        info!("Upserted {} records", records.len());
        Ok(records.len())
    }

    #[instrument(skip(self, records), fields(count = records.len()))]
    async fn replace_episode(
        &self,
        episode_id: &str,
        records: &[EmbeddingRecord],
    ) -> Result<usize> {
        if let Some(stray) = records.iter().find(|r| r.id.episode_id != episode_id) {
            return Err(CompanionError::InvalidInput(format!(
                "record {} does not belong to episode {}",
                stray.id, episode_id
            )));
        }

        let conn = self.lock()?;
        validate_records(records, Self::stored_dimensions(&conn, Some(episode_id))?)?;

        let tx = conn.unchecked_transaction()?;
        let deleted = tx.execute(
            "DELETE FROM records WHERE episode_id = ?1",
            params![episode_id],
        )?;
        Self::insert_records(&tx, records)?;
        Self::refresh_centroid(&tx, episode_id)?;
        tx.commit()?;

        info!(
            "Replaced episode {} ({} old records, {} new)",
            episode_id,
            deleted,
            records.len()
        );
        Ok(records.len())
    }

    #[instrument(skip(self, vector))]
    async fn query_by_vector(&self, vector: &[f32], top_n: usize) -> Result<Vec<QueryHit>> {
        let conn = self.lock()?;
        validate_query(vector, Self::stored_dimensions(&conn, None)?)?;

        let mut stmt = conn.prepare(&format!("SELECT {} FROM records", RECORD_COLUMNS))?;
        let records = stmt
            .query_map([], Self::read_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut hits: Vec<QueryHit> = records
            .into_iter()
            .map(|r| QueryHit {
                distance: 1.0 - cosine_similarity(vector, &r.vector),
                id: r.id,
                metadata: r.metadata,
            })
            .collect();

        // Sort by distance ascending
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_n);

        debug!("Found {} nearest records", hits.len());
        Ok(hits)
    }

    #[instrument(skip(self))]
    async fn query_by_filter(&self, filter: &MetadataFilter) -> Result<Vec<EmbeddingRecord>> {
        let conn = self.lock()?;

        let mut clauses = Vec::new();
        let mut values: Vec<String> = Vec::new();
        if let Some(ep) = &filter.episode_id {
            values.push(ep.clone());
            clauses.push(format!("episode_id = ?{}", values.len()));
        }
        if let Some(ep) = &filter.exclude_episode_id {
            values.push(ep.clone());
            clauses.push(format!("episode_id != ?{}", values.len()));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM records {} ORDER BY episode_id, chunk_id",
            RECORD_COLUMNS, where_clause
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values.iter()), Self::read_record)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!("Filter matched {} records", records.len());
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn delete_episode(&self, episode_id: &str) -> Result<usize> {
        let conn = self.lock()?;

        let tx = conn.unchecked_transaction()?;
        let deleted = tx.execute(
            "DELETE FROM records WHERE episode_id = ?1",
            params![episode_id],
        )?;
        Self::refresh_centroid(&tx, episode_id)?;
        tx.commit()?;

        info!("Deleted {} records for episode {}", deleted, episode_id);
        Ok(deleted)
    }

    async fn list_episode_ids(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT episode_id FROM centroids ORDER BY episode_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    async fn episode_centroid(&self, episode_id: &str) -> Result<Option<Vec<f32>>> {
        let conn = self.lock()?;

        let centroid = conn.query_row(
            "SELECT centroid FROM centroids WHERE episode_id = ?1",
            params![episode_id],
            |row| {
                let bytes: Vec<u8> = row.get(0)?;
                Ok(Self::bytes_to_embedding(&bytes))
            },
        );

        match centroid {
            Ok(c) => Ok(Some(c)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn list_episodes(&self) -> Result<Vec<IndexedEpisode>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT episode_id, COUNT(*) as chunk_count,
                   MAX(ts_end) as duration, MAX(indexed_at) as indexed_at
            FROM records
            GROUP BY episode_id
            ORDER BY indexed_at DESC, episode_id
            "#,
        )?;

        let episodes = stmt
            .query_map([], |row| {
                let indexed_at_str: String = row.get(3)?;
                Ok(IndexedEpisode {
                    episode_id: row.get(0)?,
                    chunk_count: row.get(1)?,
                    duration_seconds: row.get(2)?,
                    indexed_at: Self::parse_timestamp(&indexed_at_str),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(episodes)
    }

    async fn record_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

// Pipeline artifacts share the database file with the vector index.
impl ArtifactStore for SqliteVectorStore {
    fn save_transcript(&self, transcript: &Transcript) -> Result<()> {
        let conn = self.lock()?;

        let transcript_json = serde_json::to_string(transcript)?;
        conn.execute(
            r#"
            INSERT OR REPLACE INTO transcripts
            (episode_id, language, duration, segment_count, transcript_json, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                transcript.episode_id,
                transcript.language,
                transcript.duration,
                transcript.segments.len() as i64,
                transcript_json,
                Utc::now().to_rfc3339(),
            ],
        )?;

        info!("Stored transcript for episode {}", transcript.episode_id);
        Ok(())
    }

    fn load_transcript(&self, episode_id: &str) -> Result<Option<Transcript>> {
        let conn = self.lock()?;

        let result = conn.query_row(
            "SELECT transcript_json FROM transcripts WHERE episode_id = ?1",
            params![episode_id],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_transcripts(&self) -> Result<Vec<StoredTranscript>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r#"
            SELECT episode_id, language, duration, segment_count, stored_at
            FROM transcripts
            ORDER BY stored_at DESC, episode_id
            "#,
        )?;

        let rows = stmt
            .query_map([], |row| {
                let stored_at: String = row.get(4)?;
                Ok(StoredTranscript {
                    episode_id: row.get(0)?,
                    language: row.get(1)?,
                    duration: row.get(2)?,
                    segment_count: row.get::<_, i64>(3)? as usize,
                    stored_at: Self::parse_timestamp(&stored_at),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
    }

    fn save_chunks(&self, episode_id: &str, chunks: &[Chunk]) -> Result<()> {
        let conn = self.lock()?;

        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM chunks WHERE episode_id = ?1", params![episode_id])?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO chunks (episode_id, chunk_id, text, ts_start, ts_end)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            for chunk in chunks {
                stmt.execute(params![
                    episode_id,
                    chunk.chunk_id,
                    chunk.text,
                    chunk.ts_start,
                    chunk.ts_end,
                ])?;
            }
        }
        tx.execute(
            "INSERT OR REPLACE INTO chunk_sets (episode_id, chunk_count, segmented_at) VALUES (?1, ?2, ?3)",
            params![episode_id, chunks.len() as i64, Utc::now().to_rfc3339()],
        )?;
        tx.commit()?;

        debug!("Stored {} chunks for episode {}", chunks.len(), episode_id);
        Ok(())
    }

    fn load_chunks(&self, episode_id: &str) -> Result<Option<Vec<Chunk>>> {
        let conn = self.lock()?;

        let known: i64 = conn.query_row(
            "SELECT COUNT(*) FROM chunk_sets WHERE episode_id = ?1",
            params![episode_id],
            |row| row.get(0),
        )?;
        if known == 0 {
            return Ok(None);
        }

        let mut stmt = conn.prepare(
            r#"
            SELECT episode_id, chunk_id, text, ts_start, ts_end
            FROM chunks
            WHERE episode_id = ?1
            ORDER BY chunk_id
            "#,
        )?;
        let chunks = stmt
            .query_map(params![episode_id], |row| {
                Ok(Chunk {
                    episode_id: row.get(0)?,
                    chunk_id: row.get(1)?,
                    text: row.get(2)?,
                    ts_start: row.get(3)?,
                    ts_end: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Some(chunks))
    }

    fn save_profile(&self, profile: &AffectProfile) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT OR REPLACE INTO affect_profiles (episode_id, profile_json, profiled_at) VALUES (?1, ?2, ?3)",
            params![
                profile.episode_id,
                serde_json::to_string(profile)?,
                profile.profiled_at.to_rfc3339(),
            ],
        )?;

        debug!("Stored affect profile for episode {}", profile.episode_id);
        Ok(())
    }

    fn delete_profile(&self, episode_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let deleted = conn.execute(
            "DELETE FROM affect_profiles WHERE episode_id = ?1",
            params![episode_id],
        )?;
        Ok(deleted > 0)
    }

    fn load_profile(&self, episode_id: &str) -> Result<Option<AffectProfile>> {
        let conn = self.lock()?;

        let result = conn.query_row(
            "SELECT profile_json FROM affect_profiles WHERE episode_id = ?1",
            params![episode_id],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
