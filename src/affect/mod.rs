//! Affect (emotional tone) profiling of episodes.
//!
//! Every chunk is scored by an external multi-label classifier over a fixed
//! label set; an episode's profile is the elementwise mean of its chunk scores.
//! Profiles carry explicit `label -> score` maps and are compared by label key,
//! never by position.

mod openai;
mod profiler;

pub use openai::OpenAIAffectClassifier;
pub use profiler::{aggregate_scores, AffectProfiler};

use crate::error::Result;
use crate::vector_store::{cosine_similarity, l2_normalize};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Score of one emotion label for one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelScore {
    pub label: String,
    /// Score in [0, 1]; scores of one text need not sum to 1.
    pub score: f32,
}

impl LabelScore {
    pub fn new(label: impl Into<String>, score: f32) -> Self {
        Self {
            label: label.into(),
            score,
        }
    }
}

/// Trait for affect classifiers.
#[async_trait]
pub trait AffectClassifier: Send + Sync {
    /// Label set every classification is scored against.
    fn labels(&self) -> &[String];

    /// Score one text against the classifier's label set.
    async fn classify(&self, text: &str) -> Result<Vec<LabelScore>>;

    /// Score many texts with bounded concurrency, keeping input order.
    async fn classify_batch(
        &self,
        texts: &[String],
        concurrency: usize,
    ) -> Result<Vec<Vec<LabelScore>>> {
        let futures: Vec<_> = texts.iter().map(|text| self.classify(text)).collect();
        stream::iter(futures)
            .buffered(concurrency.max(1))
            .try_collect()
            .await
    }
}

/// How two profiles with different label sets are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelPolicy {
    /// Label sets must match exactly, otherwise the pair is incomparable.
    #[default]
    Strict,
    /// Compare on the labels both profiles share.
    Shared,
}

impl std::str::FromStr for LabelPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "strict" => Ok(LabelPolicy::Strict),
            "shared" | "intersect" => Ok(LabelPolicy::Shared),
            _ => Err(format!("Unknown label policy: {}", s)),
        }
    }
}

/// Mean emotion-label distribution of one episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffectProfile {
    pub episode_id: String,
    /// Canonical label order, taken from the first classified chunk.
    pub emotion_labels: Vec<String>,
    /// Mean score per label.
    pub mean_profile: BTreeMap<String, f32>,
    #[serde(default = "Utc::now")]
    pub profiled_at: DateTime<Utc>,
}

impl AffectProfile {
    pub fn new(
        episode_id: impl Into<String>,
        emotion_labels: Vec<String>,
        mean_profile: BTreeMap<String, f32>,
    ) -> Self {
        Self {
            episode_id: episode_id.into(),
            emotion_labels,
            mean_profile,
            profiled_at: Utc::now(),
        }
    }

    /// Scores in canonical label order.
    pub fn vector(&self) -> Vec<f32> {
        self.emotion_labels
            .iter()
            .map(|l| self.mean_profile.get(l).copied().unwrap_or(0.0))
            .collect()
    }

    /// The label with the highest mean score.
    pub fn dominant_label(&self) -> Option<(&str, f32)> {
        self.emotion_labels
            .iter()
            .filter_map(|l| self.mean_profile.get(l).map(|s| (l.as_str(), *s)))
            .fold(None, |best, (label, score)| match best {
                Some((_, s)) if s >= score => best,
                _ => Some((label, score)),
            })
    }

    fn label_set(&self) -> BTreeSet<&str> {
        self.emotion_labels
            .iter()
            .filter(|l| self.mean_profile.contains_key(*l))
            .map(|l| l.as_str())
            .collect()
    }

    /// Score vectors of both profiles aligned by label key, in this profile's
    /// label order. `None` when the policy finds the label sets incompatible.
    pub fn aligned_vectors(
        &self,
        other: &AffectProfile,
        policy: LabelPolicy,
    ) -> Option<(Vec<f32>, Vec<f32>)> {
        let mine = self.label_set();
        let theirs = other.label_set();

        let labels: Vec<&str> = match policy {
            LabelPolicy::Strict => {
                if mine != theirs || mine.len() != self.emotion_labels.len() {
                    return None;
                }
                self.emotion_labels.iter().map(|l| l.as_str()).collect()
            }
            LabelPolicy::Shared => self
                .emotion_labels
                .iter()
                .map(|l| l.as_str())
                .filter(|l| theirs.contains(l) && mine.contains(l))
                .collect(),
        };

        if labels.is_empty() {
            return None;
        }

        let pick = |p: &AffectProfile| -> Vec<f32> {
            labels.iter().map(|l| p.mean_profile[*l]).collect()
        };
        Some((pick(self), pick(other)))
    }

    /// Cosine similarity of the two L2-normalized affect vectors.
    pub fn similarity(&self, other: &AffectProfile, policy: LabelPolicy) -> Option<f32> {
        let (a, b) = self.aligned_vectors(other, policy)?;
        let a = l2_normalize(&a).ok()?;
        let b = l2_normalize(&b).ok()?;
        Some(cosine_similarity(&a, &b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn profile(episode_id: &str, pairs: &[(&str, f32)]) -> AffectProfile {
        AffectProfile::new(
            episode_id,
            pairs.iter().map(|(l, _)| l.to_string()).collect(),
            pairs.iter().map(|(l, s)| (l.to_string(), *s)).collect(),
        )
    }

    #[test]
    fn test_alignment_is_by_label_not_position() {
        let a = profile("a", &[("joy", 0.9), ("fear", 0.1)]);
        let b = profile("b", &[("fear", 0.1), ("joy", 0.9)]);

        let (va, vb) = a.aligned_vectors(&b, LabelPolicy::Strict).unwrap();
        assert_eq!(va, vb);
        assert!((a.similarity(&b, LabelPolicy::Strict).unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_strict_rejects_different_label_sets() {
        let a = profile("a", &[("joy", 0.9), ("fear", 0.1)]);
        let b = profile("b", &[("joy", 0.9), ("anger", 0.1)]);
        assert!(a.similarity(&b, LabelPolicy::Strict).is_none());

        let shared = a.aligned_vectors(&b, LabelPolicy::Shared).unwrap();
        assert_eq!(shared, (vec![0.9], vec![0.9]));
    }

    #[test]
    fn test_disjoint_labels_are_incomparable() {
        let a = profile("a", &[("joy", 0.9)]);
        let b = profile("b", &[("anger", 0.9)]);
        assert!(a.similarity(&b, LabelPolicy::Shared).is_none());
    }

    #[test]
    fn test_zero_profile_is_incomparable() {
        let a = profile("a", &[("joy", 0.0), ("fear", 0.0)]);
        let b = profile("b", &[("joy", 0.5), ("fear", 0.5)]);
        assert!(a.similarity(&b, LabelPolicy::Strict).is_none());
    }

    #[test]
    fn test_vector_and_dominant_label() {
        let p = profile("a", &[("anger", 0.2), ("joy", 0.7), ("fear", 0.1)]);
        assert_eq!(p.vector(), vec![0.2, 0.7, 0.1]);
        assert_eq!(p.dominant_label(), Some(("joy", 0.7)));
    }

    #[test]
    fn test_profile_json_shape() {
        let p = profile("ep", &[("joy", 0.5)]);
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(json["episode_id"], "ep");
        assert_eq!(json["emotion_labels"][0], "joy");
        assert_eq!(json["mean_profile"]["joy"], 0.5);

        let legacy = r#"{"episode_id":"x","emotion_labels":["joy"],"mean_profile":{"joy":0.25}}"#;
        let parsed: AffectProfile = serde_json::from_str(legacy).unwrap();
        assert_eq!(parsed.mean_profile["joy"], 0.25);
    }

    #[test]
    fn test_label_policy_parse() {
        assert_eq!("Strict".parse::<LabelPolicy>().unwrap(), LabelPolicy::Strict);
        assert_eq!("shared".parse::<LabelPolicy>().unwrap(), LabelPolicy::Shared);
        assert!("fuzzy".parse::<LabelPolicy>().is_err());
    }
}
