//! In-memory vector store implementation.
//!
//! Useful for testing and small datasets.

use super::{
    cosine_similarity, mean_vector, validate_query, validate_records, EmbeddingRecord,
    IndexedEpisode, MetadataFilter, QueryHit, RecordId, VectorStore,
};
use crate::error::{CompanionError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Inner {
    records: BTreeMap<RecordId, EmbeddingRecord>,
    centroids: HashMap<String, Vec<f32>>,
    indexed_at: HashMap<String, DateTime<Utc>>,
}

impl Inner {
    fn dimensions(&self) -> Option<usize> {
        self.records.values().next().map(|r| r.vector.len())
    }

    fn refresh_centroid(&mut self, episode_id: &str) {
        let vectors: Vec<&[f32]> = self
            .records
            .values()
            .filter(|r| r.id.episode_id == episode_id)
            .map(|r| r.vector.as_slice())
            .collect();
        match mean_vector(&vectors) {
            Some(centroid) => {
                self.centroids.insert(episode_id.to_string(), centroid);
            }
            None => {
                self.centroids.remove(episode_id);
                self.indexed_at.remove(episode_id);
            }
        }
    }

    fn insert_all(&mut self, records: &[EmbeddingRecord]) {
        let now = Utc::now();
        let mut touched = BTreeSet::new();
        for record in records {
            touched.insert(record.id.episode_id.clone());
            self.records.insert(record.id.clone(), record.clone());
        }
        for episode_id in touched {
            self.indexed_at.insert(episode_id.clone(), now);
            self.refresh_centroid(&episode_id);
        }
    }

    fn remove_episode(&mut self, episode_id: &str) -> usize {
        let initial_len = self.records.len();
        self.records.retain(|id, _| id.episode_id != episode_id);
        self.refresh_centroid(episode_id);
        initial_len - self.records.len()
    }
}

/// In-memory vector store.
#[derive(Default)]
pub struct MemoryVectorStore {
    inner: RwLock<Inner>,
}

impl MemoryVectorStore {
    /// Create a new in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|e| CompanionError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|e| CompanionError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn upsert(&self, records: &[EmbeddingRecord]) -> Result<usize> {
        let mut inner = self.write()?;
        validate_records(records, inner.dimensions())?;
        inner.insert_all(records);
        Ok(records.len())
    }

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

        let mut inner = self.write()?;
        let remaining_dims = inner
            .records
            .values()
            .find(|r| r.id.episode_id != episode_id)
            .map(|r| r.vector.len());
        validate_records(records, remaining_dims)?;

        inner.remove_episode(episode_id);
        inner.insert_all(records);
        Ok(records.len())
    }

    async fn query_by_vector(&self, vector: &[f32], top_n: usize) -> Result<Vec<QueryHit>> {
        let inner = self.read()?;
        validate_query(vector, inner.dimensions())?;

        let mut hits: Vec<QueryHit> = inner
            .records
            .values()
            .map(|r| QueryHit {
                id: r.id.clone(),
                distance: 1.0 - cosine_similarity(vector, &r.vector),
                metadata: r.metadata.clone(),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_n);

        Ok(hits)
    }

    async fn query_by_filter(&self, filter: &MetadataFilter) -> Result<Vec<EmbeddingRecord>> {
        let inner = self.read()?;
        Ok(inner
            .records
            .values()
            .filter(|r| filter.matches(&r.metadata))
            .cloned()
            .collect())
    }

    async fn delete_episode(&self, episode_id: &str) -> Result<usize> {
        let mut inner = self.write()?;
        Ok(inner.remove_episode(episode_id))
    }

    async fn list_episode_ids(&self) -> Result<Vec<String>> {
        let inner = self.read()?;
        let ids: BTreeSet<String> = inner.centroids.keys().cloned().collect();
        Ok(ids.into_iter().collect())
    }

    async fn episode_centroid(&self, episode_id: &str) -> Result<Option<Vec<f32>>> {
        let inner = self.read()?;
        Ok(inner.centroids.get(episode_id).cloned())
    }

    async fn list_episodes(&self) -> Result<Vec<IndexedEpisode>> {
        let inner = self.read()?;

        let mut episode_map: HashMap<String, IndexedEpisode> = HashMap::new();

        for record in inner.records.values() {
            let entry = episode_map
                .entry(record.id.episode_id.clone())
                .or_insert_with(|| IndexedEpisode {
                    episode_id: record.id.episode_id.clone(),
                    chunk_count: 0,
                    duration_seconds: 0.0,
                    indexed_at: inner
                        .indexed_at
                        .get(&record.id.episode_id)
                        .copied()
                        .unwrap_or_else(Utc::now),
                });

            entry.chunk_count += 1;
            if record.metadata.ts_end > entry.duration_seconds {
                entry.duration_seconds = record.metadata.ts_end;
            }
        }

        let mut episodes: Vec<IndexedEpisode> = episode_map.into_values().collect();
        episodes.sort_by(|a, b| {
            b.indexed_at
                .cmp(&a.indexed_at)
                .then_with(|| a.episode_id.cmp(&b.episode_id))
        });

        Ok(episodes)
    }

    async fn record_count(&self) -> Result<usize> {
        let inner = self.read()?;
        Ok(inner.records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::record;
    use super::*;

    #[tokio::test]
    async fn test_memory_vector_store() {
        let store = MemoryVectorStore::new();

        store
            .upsert(&[record("ep1", 0, &[1.0, 0.0, 0.0]), record("ep1", 1, &[0.0, 1.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(store.record_count().await.unwrap(), 2);

        let hits = store.query_by_vector(&[1.0, 0.0, 0.0], 10).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id.to_string(), "ep1::0");
        assert!(hits[0].distance < hits[1].distance);
        assert!((hits[0].similarity() - 1.0).abs() < 1e-4);

        let episodes = store.list_episodes().await.unwrap();
        assert_eq!(episodes.len(), 1);
        assert_eq!(episodes[0].chunk_count, 2);
        assert_eq!(episodes[0].duration_seconds, 20.0);
    }

    #[tokio::test]
    async fn test_query_dimension_mismatch_is_rejected() {
        let store = MemoryVectorStore::new();
        assert!(store.query_by_vector(&[1.0, 0.0], 5).await.unwrap().is_empty());

        store.upsert(&[record("ep", 0, &[1.0, 0.0, 0.0])]).await.unwrap();
        assert!(matches!(
            store.query_by_vector(&[1.0, 0.0], 5).await,
            Err(CompanionError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_repeated_upsert_does_not_duplicate() {
        let store = MemoryVectorStore::new();
        let records = vec![record("ep", 0, &[1.0, 0.0]), record("ep", 1, &[0.0, 1.0])];

        store.upsert(&records).await.unwrap();
        store.upsert(&records).await.unwrap();

        assert_eq!(store.record_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_replace_episode_drops_stale_chunks() {
        let store = MemoryVectorStore::new();
        store
            .upsert(&[
                record("ep", 0, &[1.0, 0.0]),
                record("ep", 1, &[0.0, 1.0]),
                record("ep", 2, &[1.0, 1.0]),
                record("other", 0, &[1.0, 0.0]),
            ])
            .await
            .unwrap();

        store
            .replace_episode("ep", &[record("ep", 0, &[0.0, 1.0])])
            .await
            .unwrap();

        let ep = store.query_by_filter(&MetadataFilter::episode("ep")).await.unwrap();
        assert_eq!(ep.len(), 1);
        assert_eq!(store.record_count().await.unwrap(), 2);

        let centroid = store.episode_centroid("ep").await.unwrap().unwrap();
        assert!((centroid[1] - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_replace_rejects_foreign_records() {
        let store = MemoryVectorStore::new();
        let err = store
            .replace_episode("ep", &[record("other", 0, &[1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, CompanionError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_centroid_cache_tracks_writes() {
        let store = MemoryVectorStore::new();
        store
            .upsert(&[record("a", 0, &[1.0, 0.0]), record("a", 1, &[0.0, 1.0])])
            .await
            .unwrap();
        store.upsert(&[record("b", 0, &[1.0, 0.0])]).await.unwrap();

        let centroid = store.episode_centroid("a").await.unwrap().unwrap();
        assert!((centroid[0] - 0.5).abs() < 1e-6);
        assert!((centroid[1] - 0.5).abs() < 1e-6);
        assert_eq!(store.list_episode_ids().await.unwrap(), vec!["a", "b"]);

        assert_eq!(store.delete_episode("a").await.unwrap(), 2);
        assert!(store.episode_centroid("a").await.unwrap().is_none());
        assert!(!store.is_episode_indexed("a").await.unwrap());
        assert_eq!(store.list_episode_ids().await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_rejects_dimension_change() {
        let store = MemoryVectorStore::new();
        store.upsert(&[record("a", 0, &[1.0, 0.0])]).await.unwrap();
        assert!(store.upsert(&[record("b", 0, &[1.0, 0.0, 0.0])]).await.is_err());
    }

    #[tokio::test]
    async fn test_filter_excluding() {
        let store = MemoryVectorStore::new();
        store
            .upsert(&[record("a", 0, &[1.0, 0.0]), record("b", 0, &[0.0, 1.0])])
            .await
            .unwrap();

        let others = store.query_by_filter(&MetadataFilter::excluding("a")).await.unwrap();
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].metadata.episode_id, "b");
    }
}
