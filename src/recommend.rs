//! Episode-to-episode recommendation.
//!
//! Candidates are scored by blending the cosine similarity of episode
//! centroids with the similarity of their affect profiles:
//!
//! ```text
//! blended = alpha * semantic + (1 - alpha) * affect
//! ```
//!
//! When either profile is missing or the label sets are incompatible the
//! candidate falls back to `blended = semantic`.

use crate::affect::{AffectProfile, LabelPolicy};
use crate::artifacts::ArtifactStore;
use crate::error::{CompanionError, Result};
use crate::vector_store::{cosine_similarity, VectorStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Query knobs for a recommendation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendOptions {
    /// Maximum number of results.
    pub top_k: usize,
    /// Weight of the semantic score; `1 - alpha` goes to the affect score.
    pub alpha: f32,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            alpha: 0.8,
        }
    }
}

impl RecommendOptions {
    pub fn validate(&self) -> Result<()> {
        if !self.alpha.is_finite() || !(0.0..=1.0).contains(&self.alpha) {
            return Err(CompanionError::InvalidInput(format!(
                "alpha must be within [0, 1], got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// One ranked candidate episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationResult {
    pub candidate_episode_id: String,
    pub blended_score: f32,
    pub semantic_score: f32,
    /// Affect similarity, present only when it contributed to the blend.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub affect_score: Option<f32>,
}

/// Ranks indexed episodes against a query episode.
pub struct RecommendationEngine {
    vector_store: Arc<dyn VectorStore>,
    artifacts: Arc<dyn ArtifactStore>,
    label_policy: LabelPolicy,
}

impl RecommendationEngine {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        artifacts: Arc<dyn ArtifactStore>,
        label_policy: LabelPolicy,
    ) -> Self {
        Self {
            vector_store,
            artifacts,
            label_policy,
        }
    }

    /// Rank every other indexed episode by blended score, best first.
    ///
    /// An episode with no indexed chunks has no recommendations.
    #[instrument(skip(self))]
    pub async fn recommend(
        &self,
        query_episode_id: &str,
        options: RecommendOptions,
    ) -> Result<Vec<RecommendationResult>> {
        options.validate()?;
        if options.top_k == 0 {
            return Ok(Vec::new());
        }

        let query_centroid = match self.vector_store.episode_centroid(query_episode_id).await? {
            Some(centroid) => centroid,
            None => {
                debug!("Episode {} is not indexed", query_episode_id);
                return Ok(Vec::new());
            }
        };
        let query_profile = self.artifacts.load_profile(query_episode_id)?;

        let mut results = Vec::new();
        for candidate_id in self.vector_store.list_episode_ids().await? {
            if candidate_id == query_episode_id {
                continue;
            }

            let Some(candidate_centroid) =
                self.vector_store.episode_centroid(&candidate_id).await?
            else {
                continue;
            };

            let semantic_score = cosine_similarity(&query_centroid, &candidate_centroid);
            let affect_score = match &query_profile {
                Some(query) => self.affect_score(query, &candidate_id)?,
                None => None,
            };

            results.push(blend(candidate_id, semantic_score, affect_score, options.alpha));
        }

        // Stable sort keeps lexicographic episode order among equal scores.
        results.sort_by(|a, b| {
            b.blended_score
                .partial_cmp(&a.blended_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(options.top_k);

        info!(
            "Found {} recommendations for {}",
            results.len(),
            query_episode_id
        );
        Ok(results)
    }

    fn affect_score(&self, query: &AffectProfile, candidate_id: &str) -> Result<Option<f32>> {
        let Some(candidate) = self.artifacts.load_profile(candidate_id)? else {
            return Ok(None);
        };
        let score = query.similarity(&candidate, self.label_policy);
        if score.is_none() {
            debug!(
                "Affect profiles of {} and {} are not comparable",
                query.episode_id, candidate_id
            );
        }
        Ok(score)
    }
}

fn blend(
    candidate_episode_id: String,
    semantic_score: f32,
    affect_score: Option<f32>,
    alpha: f32,
) -> RecommendationResult {
    let blended_score = match affect_score {
        Some(affect) => alpha * semantic_score + (1.0 - alpha) * affect,
        None => semantic_score,
    };
    RecommendationResult {
        candidate_episode_id,
        blended_score,
        semantic_score,
        affect_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::MemoryArtifactStore;
    use crate::vector_store::{l2_normalize, EmbeddingRecord, MemoryVectorStore};
    use crate::chunking::Chunk;
    use std::collections::BTreeMap;

    fn record(episode_id: &str, chunk_id: u32, raw: &[f32]) -> EmbeddingRecord {
        let chunk = Chunk {
            episode_id: episode_id.to_string(),
            chunk_id,
            text: format!("{} {}", episode_id, chunk_id),
            ts_start: 0.0,
            ts_end: 1.0,
        };
        EmbeddingRecord::from_chunk(&chunk, l2_normalize(raw).unwrap())
    }

    fn profile(episode_id: &str, pairs: &[(&str, f32)]) -> AffectProfile {
        AffectProfile::new(
            episode_id,
            pairs.iter().map(|(l, _)| l.to_string()).collect(),
            pairs
                .iter()
                .map(|(l, s)| (l.to_string(), *s))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    /// Query `q` plus candidates where semantic and affect rankings disagree:
    /// `near` is semantically closest but emotionally opposite, `far` the reverse.
    async fn fixture() -> (RecommendationEngine, Arc<MemoryArtifactStore>) {
        let store = Arc::new(MemoryVectorStore::new());
        store
            .upsert(&[
                record("q", 0, &[1.0, 0.0]),
                record("q", 1, &[1.0, 0.1]),
                record("near", 0, &[1.0, 0.05]),
                record("mid", 0, &[1.0, 0.5]),
                record("far", 0, &[0.2, 1.0]),
            ])
            .await
            .unwrap();

        let artifacts = Arc::new(MemoryArtifactStore::new());
        artifacts
            .save_profile(&profile("q", &[("joy", 0.9), ("sadness", 0.1)]))
            .unwrap();
        artifacts
            .save_profile(&profile("near", &[("joy", 0.1), ("sadness", 0.9)]))
            .unwrap();
        artifacts
            .save_profile(&profile("mid", &[("joy", 0.5), ("sadness", 0.5)]))
            .unwrap();
        artifacts
            .save_profile(&profile("far", &[("sadness", 0.1), ("joy", 0.9)]))
            .unwrap();

        let engine = RecommendationEngine::new(store, artifacts.clone(), LabelPolicy::Strict);
        (engine, artifacts)
    }

    fn ids(results: &[RecommendationResult]) -> Vec<&str> {
        results
            .iter()
            .map(|r| r.candidate_episode_id.as_str())
            .collect()
    }

    fn options(top_k: usize, alpha: f32) -> RecommendOptions {
        RecommendOptions { top_k, alpha }
    }

    #[tokio::test]
    async fn test_alpha_one_ranks_by_semantic_score() {
        let (engine, _) = fixture().await;
        let results = engine.recommend("q", options(10, 1.0)).await.unwrap();

        assert_eq!(ids(&results), vec!["near", "mid", "far"]);
        for r in &results {
            assert!((r.blended_score - r.semantic_score).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_alpha_zero_ranks_by_affect_score() {
        let (engine, _) = fixture().await;
        let results = engine.recommend("q", options(10, 0.0)).await.unwrap();

        assert_eq!(ids(&results), vec!["far", "mid", "near"]);
        for r in &results {
            assert!((r.blended_score - r.affect_score.unwrap()).abs() < 1e-6);
        }
        assert!((results[0].affect_score.unwrap() - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_blend_is_convex_combination() {
        let (engine, _) = fixture().await;
        let results = engine.recommend("q", options(10, 0.8)).await.unwrap();

        for r in &results {
            let expected = 0.8 * r.semantic_score + 0.2 * r.affect_score.unwrap();
            assert!((r.blended_score - expected).abs() < 1e-6);
        }
    }

    #[tokio::test]
    async fn test_missing_candidate_profile_falls_back_to_semantic() {
        let store = Arc::new(MemoryVectorStore::new());
        store
            .upsert(&[record("q", 0, &[1.0, 0.0]), record("c", 0, &[1.0, 1.0])])
            .await
            .unwrap();
        let artifacts = Arc::new(MemoryArtifactStore::new());
        artifacts.save_profile(&profile("q", &[("joy", 1.0)])).unwrap();

        let engine = RecommendationEngine::new(store, artifacts, LabelPolicy::Strict);
        let results = engine.recommend("q", options(5, 0.3)).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].blended_score, results[0].semantic_score);
        assert!(results[0].affect_score.is_none());
    }

    #[tokio::test]
    async fn test_incompatible_labels_fall_back_to_semantic() {
        let (engine, artifacts) = fixture().await;
        artifacts
            .save_profile(&profile("mid", &[("anger", 0.5), ("fear", 0.5)]))
            .unwrap();

        let results = engine.recommend("q", options(10, 0.0)).await.unwrap();
        let mid = results
            .iter()
            .find(|r| r.candidate_episode_id == "mid")
            .unwrap();
        assert_eq!(mid.blended_score, mid.semantic_score);
    }

    #[tokio::test]
    async fn test_unindexed_episode_has_no_recommendations() {
        let (engine, _) = fixture().await;
        assert!(engine.recommend("missing", options(5, 0.5)).await.unwrap().is_empty());

        let empty = RecommendationEngine::new(
            Arc::new(MemoryVectorStore::new()),
            Arc::new(MemoryArtifactStore::new()),
            LabelPolicy::Strict,
        );
        assert!(empty.recommend("q", options(5, 0.5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_top_k_and_alpha_bounds() {
        let (engine, _) = fixture().await;
        assert_eq!(engine.recommend("q", options(2, 1.0)).await.unwrap().len(), 2);
        assert!(engine.recommend("q", options(0, 1.0)).await.unwrap().is_empty());

        let err = engine.recommend("q", options(5, 1.5)).await.unwrap_err();
        assert!(matches!(err, CompanionError::InvalidInput(_)));
        assert!(engine.recommend("q", options(5, f32::NAN)).await.is_err());
    }

    #[tokio::test]
    async fn test_ties_keep_lexicographic_order() {
        let store = Arc::new(MemoryVectorStore::new());
        store
            .upsert(&[
                record("q", 0, &[1.0, 0.0]),
                record("b", 0, &[0.0, 1.0]),
                record("a", 0, &[0.0, 1.0]),
            ])
            .await
            .unwrap();
        let engine = RecommendationEngine::new(
            store,
            Arc::new(MemoryArtifactStore::new()),
            LabelPolicy::Strict,
        );

        let results = engine.recommend("q", options(5, 1.0)).await.unwrap();
        assert_eq!(ids(&results), vec!["a", "b"]);
    }
}
