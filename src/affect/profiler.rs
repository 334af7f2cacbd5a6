//! Episode-level aggregation of chunk affect scores.

use super::{AffectClassifier, AffectProfile, LabelScore};
use crate::chunking::Chunk;
use crate::error::{CompanionError, Result};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Builds affect profiles by classifying every chunk of an episode.
pub struct AffectProfiler {
    classifier: Arc<dyn AffectClassifier>,
    max_concurrent: usize,
}

impl AffectProfiler {
    pub fn new(classifier: Arc<dyn AffectClassifier>, max_concurrent: usize) -> Self {
        Self {
            classifier,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Classify each chunk and average the scores into one profile.
    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    pub async fn profile(&self, episode_id: &str, chunks: &[Chunk]) -> Result<AffectProfile> {
        if chunks.is_empty() {
            return Err(CompanionError::EmptyChunkSet(episode_id.to_string()));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let scores = self
            .classifier
            .classify_batch(&texts, self.max_concurrent)
            .await?;

        if scores.len() != chunks.len() {
            return Err(CompanionError::Affect(format!(
                "classifier returned {} results for {} chunks",
                scores.len(),
                chunks.len()
            )));
        }

        let profile = aggregate_scores(episode_id, &scores)?;
        info!(
            "Profiled {} chunks for {} ({} labels)",
            chunks.len(),
            episode_id,
            profile.emotion_labels.len()
        );
        Ok(profile)
    }
}

/// Average per-chunk label scores into an episode profile.
///
/// The first chunk fixes the canonical label order. Every other chunk must
/// carry exactly the same label set, in any order.
pub fn aggregate_scores(episode_id: &str, per_chunk: &[Vec<LabelScore>]) -> Result<AffectProfile> {
    let first = per_chunk
        .first()
        .ok_or_else(|| CompanionError::EmptyChunkSet(episode_id.to_string()))?;

    let labels: Vec<String> = first.iter().map(|s| s.label.clone()).collect();
    if labels.is_empty() {
        return Err(CompanionError::LabelMismatch {
            episode_id: episode_id.to_string(),
            details: "classifier returned no labels".to_string(),
        });
    }

    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    for label in &labels {
        if sums.insert(label.clone(), 0.0).is_some() {
            return Err(CompanionError::LabelMismatch {
                episode_id: episode_id.to_string(),
                details: format!("duplicate label '{}'", label),
            });
        }
    }

    for (index, scores) in per_chunk.iter().enumerate() {
        let by_label: HashMap<&str, f32> =
            scores.iter().map(|s| (s.label.as_str(), s.score)).collect();

        if scores.len() != labels.len()
            || by_label.len() != labels.len()
            || !labels.iter().all(|l| by_label.contains_key(l.as_str()))
        {
            let got: Vec<&str> = scores.iter().map(|s| s.label.as_str()).collect();
            return Err(CompanionError::LabelMismatch {
                episode_id: episode_id.to_string(),
                details: format!("chunk {} has labels {:?}, expected {:?}", index, got, labels),
            });
        }

        for (label, sum) in sums.iter_mut() {
            let score = by_label[label.as_str()];
            if !score.is_finite() || !(0.0..=1.0).contains(&score) {
                return Err(CompanionError::Affect(format!(
                    "chunk {} score for '{}' out of range: {}",
                    index, label, score
                )));
            }
            *sum += f64::from(score);
        }
    }

    let n = per_chunk.len() as f64;
    let mean_profile: BTreeMap<String, f32> = sums
        .into_iter()
        .map(|(label, sum)| (label, (sum / n) as f32))
        .collect();

    debug!("Aggregated {} chunk score sets for {}", per_chunk.len(), episode_id);
    Ok(AffectProfile::new(episode_id, labels, mean_profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    fn scores(pairs: &[(&str, f32)]) -> Vec<LabelScore> {
        pairs.iter().map(|(l, s)| LabelScore::new(*l, *s)).collect()
    }

    fn chunk(chunk_id: u32, text: &str) -> Chunk {
        Chunk {
            episode_id: "ep".to_string(),
            chunk_id,
            text: text.to_string(),
            ts_start: chunk_id as f64,
            ts_end: chunk_id as f64 + 1.0,
        }
    }

    /// Scores "happy" text as joy and everything else as sadness.
    struct KeywordClassifier {
        labels: Vec<String>,
    }

    impl KeywordClassifier {
        fn new() -> Self {
            Self {
                labels: vec!["joy".to_string(), "sadness".to_string()],
            }
        }
    }

    #[async_trait]
    impl AffectClassifier for KeywordClassifier {
        fn labels(&self) -> &[String] {
            &self.labels
        }

        async fn classify(&self, text: &str) -> Result<Vec<LabelScore>> {
            let joy = if text.contains("happy") { 0.8 } else { 0.2 };
            Ok(scores(&[("joy", joy), ("sadness", 1.0 - joy)]))
        }
    }

    #[test]
    fn test_mean_over_chunks() {
        let profile = aggregate_scores(
            "ep",
            &[
                scores(&[("joy", 0.8), ("sadness", 0.2)]),
                scores(&[("joy", 0.4), ("sadness", 0.6)]),
            ],
        )
        .unwrap();

        assert_eq!(profile.emotion_labels, vec!["joy", "sadness"]);
        assert!((profile.mean_profile["joy"] - 0.6).abs() < 1e-6);
        assert!((profile.mean_profile["sadness"] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_label_order_may_differ_between_chunks() {
        let profile = aggregate_scores(
            "ep",
            &[
                scores(&[("joy", 1.0), ("fear", 0.0)]),
                scores(&[("fear", 1.0), ("joy", 0.0)]),
            ],
        )
        .unwrap();

        assert_eq!(profile.emotion_labels, vec!["joy", "fear"]);
        assert!((profile.mean_profile["joy"] - 0.5).abs() < 1e-6);
        assert!((profile.mean_profile["fear"] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_label_mismatch_fails() {
        let err = aggregate_scores(
            "ep",
            &[
                scores(&[("joy", 1.0), ("fear", 0.0)]),
                scores(&[("joy", 1.0), ("anger", 0.0)]),
            ],
        )
        .unwrap_err();
        assert!(matches!(err, CompanionError::LabelMismatch { .. }));

        let err = aggregate_scores(
            "ep",
            &[scores(&[("joy", 1.0)]), scores(&[("joy", 1.0), ("fear", 0.0)])],
        )
        .unwrap_err();
        assert!(matches!(err, CompanionError::LabelMismatch { .. }));
    }

    #[test]
    fn test_out_of_range_score_fails() {
        let err = aggregate_scores("ep", &[scores(&[("joy", 1.5)])]).unwrap_err();
        assert!(matches!(err, CompanionError::Affect(_)));
    }

    #[test]
    fn test_empty_input_fails() {
        let err = aggregate_scores("ep", &[]).unwrap_err();
        assert!(matches!(err, CompanionError::EmptyChunkSet(_)));
    }

    #[tokio::test]
    async fn test_profiler_classifies_every_chunk() {
        let profiler = AffectProfiler::new(Arc::new(KeywordClassifier::new()), 2);
        let chunks = vec![chunk(0, "so happy"), chunk(1, "gloomy"), chunk(2, "happy again")];

        let profile = profiler.profile("ep", &chunks).await.unwrap();
        assert_eq!(profile.episode_id, "ep");
        assert!((profile.mean_profile["joy"] - 0.6).abs() < 1e-6);
        assert!((profile.mean_profile["sadness"] - 0.4).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_profiler_rejects_empty_chunk_set() {
        let profiler = AffectProfiler::new(Arc::new(KeywordClassifier::new()), 2);
        let err = profiler.profile("ep", &[]).await.unwrap_err();
        assert!(matches!(err, CompanionError::EmptyChunkSet(_)));
    }
}
