//! Pipeline orchestrator for podcompanion.
//!
//! Holds the shared clients and stores, and runs the per-episode stages:
//! ingest, segment, index, profile. Every stage reads its input from the
//! artifact store and persists its output before the next one starts.

use crate::affect::{AffectClassifier, AffectProfile, AffectProfiler, OpenAIAffectClassifier};
use crate::artifacts::{ArtifactStore, MemoryArtifactStore};
use crate::chunking::{segment, Chunk};
use crate::config::Settings;
use crate::embedding::{embed_normalized, Embedder, OpenAIEmbedder};
use crate::error::{CompanionError, Result};
use crate::recommend::{RecommendOptions, RecommendationEngine, RecommendationResult};
use crate::transcript::Transcript;
use crate::vector_store::{
    l2_normalize, EmbeddingRecord, MemoryVectorStore, QueryHit, SqliteVectorStore, VectorStore,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// The main orchestrator for the podcompanion pipeline.
pub struct Orchestrator {
    settings: Settings,
    embedder: Arc<dyn Embedder>,
    classifier: Arc<dyn AffectClassifier>,
    vector_store: Arc<dyn VectorStore>,
    artifacts: Arc<dyn ArtifactStore>,
}

impl Orchestrator {
    /// Create a new orchestrator from settings.
    pub fn new(settings: Settings) -> Result<Self> {
        if settings.embedding.provider != "openai" {
            return Err(CompanionError::Config(format!(
                "Unknown embedding provider: {}",
                settings.embedding.provider
            )));
        }

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::with_config(
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        )?);

        let classifier: Arc<dyn AffectClassifier> = Arc::new(OpenAIAffectClassifier::new(
            &settings.affect.model,
            settings.affect.labels.clone(),
        )?);

        let (vector_store, artifacts): (Arc<dyn VectorStore>, Arc<dyn ArtifactStore>) =
            match settings.vector_store.provider.as_str() {
                "sqlite" => {
                    let store = Arc::new(SqliteVectorStore::new(&settings.sqlite_path())?);
                    (
                        store.clone() as Arc<dyn VectorStore>,
                        store as Arc<dyn ArtifactStore>,
                    )
                }
                "memory" => {
                    warn!("Using in-memory storage; nothing survives this process");
                    (
                        Arc::new(MemoryVectorStore::new()) as Arc<dyn VectorStore>,
                        Arc::new(MemoryArtifactStore::new()) as Arc<dyn ArtifactStore>,
                    )
                }
                other => {
                    return Err(CompanionError::Config(format!(
                        "Unknown vector store provider: {}",
                        other
                    )))
                }
            };

        Ok(Self::with_components(
            settings,
            embedder,
            classifier,
            vector_store,
            artifacts,
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        embedder: Arc<dyn Embedder>,
        classifier: Arc<dyn AffectClassifier>,
        vector_store: Arc<dyn VectorStore>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            settings,
            embedder,
            classifier,
            vector_store,
            artifacts,
        }
    }

    /// Get the settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Get a reference to the vector store.
    pub fn vector_store(&self) -> Arc<dyn VectorStore> {
        self.vector_store.clone()
    }

    /// Get a reference to the artifact store.
    pub fn artifacts(&self) -> Arc<dyn ArtifactStore> {
        self.artifacts.clone()
    }

    /// Validate and persist a transcript.
    #[instrument(skip(self, transcript), fields(episode_id = %transcript.episode_id))]
    pub fn ingest_transcript(&self, transcript: &Transcript) -> Result<()> {
        transcript.validate()?;
        self.artifacts.save_transcript(transcript)?;
        info!(
            "Ingested transcript {} ({} segments)",
            transcript.episode_id,
            transcript.segments.len()
        );
        Ok(())
    }

    /// Segment the stored transcript and replace the episode's chunk set.
    #[instrument(skip(self))]
    pub fn segment_episode(&self, episode_id: &str) -> Result<Vec<Chunk>> {
        let transcript = self.artifacts.load_transcript(episode_id)?.ok_or_else(|| {
            CompanionError::NotFound(format!("transcript for episode {}", episode_id))
        })?;

        let chunks = segment(&transcript, &self.settings.segmentation.chunking_config());
        self.artifacts.save_chunks(episode_id, &chunks)?;

        info!("Created {} chunks for {}", chunks.len(), episode_id);
        Ok(chunks)
    }

    /// Embed the stored chunk set and replace the episode's index entries.
    #[instrument(skip(self))]
    pub async fn index_episode(&self, episode_id: &str) -> Result<usize> {
        let chunks = self.stored_chunks(episode_id)?;

        if chunks.is_empty() {
            self.vector_store.replace_episode(episode_id, &[]).await?;
            info!("Episode {} has no chunks, nothing indexed", episode_id);
            return Ok(0);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embed_normalized(self.embedder.as_ref(), &texts).await?;

        let records: Vec<EmbeddingRecord> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| EmbeddingRecord::from_chunk(chunk, vector))
            .collect();

        let count = self
            .vector_store
            .replace_episode(episode_id, &records)
            .await?;

        info!("Indexed {} chunks for {}", count, episode_id);
        Ok(count)
    }

    /// Classify the stored chunk set and replace the episode's affect profile.
    #[instrument(skip(self))]
    pub async fn profile_episode(&self, episode_id: &str) -> Result<AffectProfile> {
        let chunks = self.stored_chunks(episode_id)?;
        debug!("Profiling against labels {:?}", self.classifier.labels());

        let profiler =
            AffectProfiler::new(self.classifier.clone(), self.settings.affect.max_concurrent);
        let profile = profiler.profile(episode_id, &chunks).await?;
        self.artifacts.save_profile(&profile)?;

        Ok(profile)
    }

    /// Run every stage for a transcript.
    #[instrument(skip(self, transcript), fields(episode_id = %transcript.episode_id))]
    pub async fn process_transcript(
        &self,
        transcript: &Transcript,
        options: ProcessOptions,
    ) -> Result<ProcessResult> {
        let episode_id = transcript.episode_id.clone();

        if !options.force && self.vector_store.is_episode_indexed(&episode_id).await? {
            if options.skip_affect || self.artifacts.load_profile(&episode_id)?.is_some() {
                info!("Episode {} is already indexed, skipping", episode_id);
                return Ok(ProcessResult::skipped(episode_id));
            }

            // A previous run stopped between indexing and profiling
            info!("Episode {} is indexed but not profiled, resuming", episode_id);
            self.profile_episode(&episode_id).await?;
            return Ok(ProcessResult {
                episode_id,
                chunks_created: 0,
                chunks_indexed: 0,
                profiled: true,
                skipped: false,
            });
        }

        self.ingest_transcript(transcript)?;
        self.run_stages(&episode_id, options.skip_affect).await
    }

    /// Re-run segmentation, indexing and profiling from the stored transcript.
    #[instrument(skip(self))]
    pub async fn rechunk_episode(&self, episode_id: &str, skip_affect: bool) -> Result<ProcessResult> {
        self.run_stages(episode_id, skip_affect).await
    }

    async fn run_stages(&self, episode_id: &str, skip_affect: bool) -> Result<ProcessResult> {
        let chunks = self.segment_episode(episode_id)?;
        let chunks_indexed = self.index_episode(episode_id).await?;

        let profiled = if skip_affect || chunks.is_empty() {
            if chunks.is_empty() && !skip_affect {
                warn!("Episode {} has no chunks, skipping affect profile", episode_id);
            }
            // A profile of the previous chunk set no longer describes the episode
            if self.artifacts.delete_profile(episode_id)? {
                info!("Dropped stale affect profile for {}", episode_id);
            }
            false
        } else {
            self.profile_episode(episode_id).await?;
            true
        };

        Ok(ProcessResult {
            episode_id: episode_id.to_string(),
            chunks_created: chunks.len(),
            chunks_indexed,
            profiled,
            skipped: false,
        })
    }

    /// Rank other indexed episodes against one episode.
    pub async fn recommend(
        &self,
        episode_id: &str,
        options: RecommendOptions,
    ) -> Result<Vec<RecommendationResult>> {
        RecommendationEngine::new(
            self.vector_store.clone(),
            self.artifacts.clone(),
            self.settings.affect.label_policy,
        )
        .recommend(episode_id, options)
        .await
    }

    /// Find the chunks closest to a free-text query.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, top_n: usize) -> Result<Vec<QueryHit>> {
        if query.trim().is_empty() {
            return Err(CompanionError::InvalidInput("empty search query".to_string()));
        }

        let vector = l2_normalize(&self.embedder.embed(query).await?)?;
        self.vector_store.query_by_vector(&vector, top_n).await
    }

    /// Stored chunk set of an episode.
    pub fn stored_chunks(&self, episode_id: &str) -> Result<Vec<Chunk>> {
        self.artifacts.load_chunks(episode_id)?.ok_or_else(|| {
            CompanionError::NotFound(format!("chunk set for episode {}", episode_id))
        })
    }
}

/// Flags for a full pipeline run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    /// Reprocess an episode that is already indexed.
    pub force: bool,
    /// Do not build an affect profile.
    pub skip_affect: bool,
}

/// Result of processing an episode.
#[derive(Debug)]
pub struct ProcessResult {
    pub episode_id: String,
    /// Chunks produced by segmentation.
    pub chunks_created: usize,
    /// Records written to the vector store.
    pub chunks_indexed: usize,
    /// Whether an affect profile was stored.
    pub profiled: bool,
    /// Whether processing was skipped (already indexed).
    pub skipped: bool,
}

impl ProcessResult {
    fn skipped(episode_id: String) -> Self {
        Self {
            episode_id,
            chunks_created: 0,
            chunks_indexed: 0,
            profiled: false,
            skipped: true,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::affect::LabelScore;
    use crate::transcript::Segment;
    use async_trait::async_trait;

    /// Embeds text as vowel counts plus a constant, so nothing is ever zero.
    pub(crate) struct VowelEmbedder;

    #[async_trait]
    impl Embedder for VowelEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let count = |c: char| text.chars().filter(|t| *t == c).count() as f32;
            Ok(vec![count('a'), count('e'), count('o'), 1.0])
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::with_capacity(texts.len());
            for text in texts {
                out.push(self.embed(text).await?);
            }
            Ok(out)
        }

        fn dimensions(&self) -> usize {
            4
        }
    }

    /// Scores "great" as joy and everything else as sadness.
    pub(crate) struct MoodClassifier {
        labels: Vec<String>,
    }

    impl MoodClassifier {
        pub(crate) fn new() -> Self {
            Self {
                labels: vec!["joy".to_string(), "sadness".to_string()],
            }
        }
    }

    #[async_trait]
    impl AffectClassifier for MoodClassifier {
        fn labels(&self) -> &[String] {
            &self.labels
        }

        async fn classify(&self, text: &str) -> Result<Vec<LabelScore>> {
            let joy = if text.contains("great") { 0.9 } else { 0.1 };
            Ok(vec![
                LabelScore::new("joy", joy),
                LabelScore::new("sadness", 1.0 - joy),
            ])
        }
    }

    pub(crate) fn test_orchestrator(settings: Settings) -> Orchestrator {
        Orchestrator::with_components(
            settings,
            Arc::new(VowelEmbedder),
            Arc::new(MoodClassifier::new()),
            Arc::new(MemoryVectorStore::new()),
            Arc::new(MemoryArtifactStore::new()),
        )
    }

    pub(crate) fn small_chunks() -> Settings {
        let mut settings = Settings::default();
        settings.segmentation.max_chars = 30;
        settings.segmentation.overlap_chars = 5;
        settings
    }

    pub(crate) fn transcript(episode_id: &str, texts: &[&str]) -> Transcript {
        let segments = texts
            .iter()
            .enumerate()
            .map(|(i, t)| Segment::new(i as f64 * 10.0, i as f64 * 10.0 + 10.0, *t))
            .collect();
        Transcript::new(episode_id, segments)
    }

    #[tokio::test]
    async fn test_process_runs_every_stage() {
        let orch = test_orchestrator(small_chunks());
        let t = transcript(
            "ep1",
            &["what a great day", "the weather is lovely", "and the food was great"],
        );

        let result = orch
            .process_transcript(&t, ProcessOptions::default())
            .await
            .unwrap();

        assert!(!result.skipped);
        assert!(result.chunks_created >= 2);
        assert_eq!(result.chunks_indexed, result.chunks_created);
        assert!(result.profiled);

        let chunks = orch.stored_chunks("ep1").unwrap();
        assert_eq!(chunks.len(), result.chunks_created);
        assert_eq!(
            orch.vector_store().record_count().await.unwrap(),
            chunks.len()
        );

        let profile = orch.artifacts().load_profile("ep1").unwrap().unwrap();
        assert_eq!(profile.emotion_labels, vec!["joy", "sadness"]);
    }

    #[tokio::test]
    async fn test_reprocessing_is_idempotent() {
        let orch = test_orchestrator(small_chunks());
        let t = transcript("ep", &["alpha beta gamma", "delta epsilon zeta", "eta theta"]);

        let first = orch.process_transcript(&t, ProcessOptions::default()).await.unwrap();
        let skipped = orch.process_transcript(&t, ProcessOptions::default()).await.unwrap();
        assert!(skipped.skipped);

        let forced = orch
            .process_transcript(
                &t,
                ProcessOptions {
                    force: true,
                    skip_affect: false,
                },
            )
            .await
            .unwrap();
        assert_eq!(forced.chunks_indexed, first.chunks_indexed);
        assert_eq!(
            orch.vector_store().record_count().await.unwrap(),
            first.chunks_indexed
        );
    }

    #[tokio::test]
    async fn test_reprocess_without_affect_drops_old_profile() {
        let orch = test_orchestrator(Settings::default());
        let t = transcript("ep", &["what a great great day"]);
        orch.process_transcript(&t, ProcessOptions::default())
            .await
            .unwrap();
        assert!(orch.artifacts().load_profile("ep").unwrap().is_some());

        let forced = ProcessOptions {
            force: true,
            skip_affect: true,
        };
        let result = orch
            .process_transcript(&transcript("ep", &["a gloomy gloomy night"]), forced)
            .await
            .unwrap();
        assert!(!result.profiled);
        assert!(orch.artifacts().load_profile("ep").unwrap().is_none());
        assert_eq!(orch.stored_chunks("ep").unwrap()[0].text, "a gloomy gloomy night");
    }

    #[tokio::test]
    async fn test_reprocess_to_empty_transcript_drops_old_profile() {
        let orch = test_orchestrator(Settings::default());
        orch.process_transcript(&transcript("ep", &["a great show"]), ProcessOptions::default())
            .await
            .unwrap();

        let forced = ProcessOptions {
            force: true,
            skip_affect: false,
        };
        let result = orch
            .process_transcript(&transcript("ep", &[]), forced)
            .await
            .unwrap();
        assert_eq!(result.chunks_indexed, 0);
        assert!(orch.artifacts().load_profile("ep").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_process_resumes_missing_profile() {
        let orch = test_orchestrator(Settings::default());
        let t = transcript("ep", &["a great opening", "and a sad ending"]);

        // Stages up to indexing, as left by an interrupted run
        orch.ingest_transcript(&t).unwrap();
        orch.segment_episode("ep").unwrap();
        orch.index_episode("ep").await.unwrap();
        assert!(orch.artifacts().load_profile("ep").unwrap().is_none());

        let result = orch.process_transcript(&t, ProcessOptions::default()).await.unwrap();
        assert!(!result.skipped);
        assert!(result.profiled);
        assert!(orch.artifacts().load_profile("ep").unwrap().is_some());

        let again = orch.process_transcript(&t, ProcessOptions::default()).await.unwrap();
        assert!(again.skipped);
    }

    #[tokio::test]
    async fn test_indexed_episode_without_profile_skips_when_affect_disabled() {
        let orch = test_orchestrator(Settings::default());
        let t = transcript("ep", &["plain words"]);
        let no_affect = ProcessOptions {
            force: false,
            skip_affect: true,
        };

        orch.process_transcript(&t, no_affect).await.unwrap();
        let again = orch.process_transcript(&t, no_affect).await.unwrap();
        assert!(again.skipped);
        assert!(orch.artifacts().load_profile("ep").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_store_backs_index_and_artifacts() {
        let store = Arc::new(SqliteVectorStore::in_memory().unwrap());
        let orch = Orchestrator::with_components(
            Settings::default(),
            Arc::new(VowelEmbedder),
            Arc::new(MoodClassifier::new()),
            store.clone(),
            store.clone(),
        );

        for (id, text) in [
            ("a", "a great banana cabana"),
            ("b", "a great banana salad"),
            ("c", "oolong tea on a cold morning"),
        ] {
            orch.process_transcript(&transcript(id, &[text]), ProcessOptions::default())
                .await
                .unwrap();
        }

        assert!(store.load_profile("b").unwrap().is_some());
        let results = orch
            .recommend("a", RecommendOptions { top_k: 5, alpha: 0.5 })
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].candidate_episode_id, "b");
        assert!(results[0].affect_score.is_some());
        assert!(results[0].blended_score >= results[1].blended_score);
    }

    #[tokio::test]
    async fn test_rechunk_replaces_chunk_set() {
        let vector_store: Arc<dyn VectorStore> = Arc::new(MemoryVectorStore::new());
        let artifacts: Arc<dyn ArtifactStore> = Arc::new(MemoryArtifactStore::new());
        let build = |settings: Settings| {
            Orchestrator::with_components(
                settings,
                Arc::new(VowelEmbedder),
                Arc::new(MoodClassifier::new()),
                vector_store.clone(),
                artifacts.clone(),
            )
        };

        let t = transcript("ep", &["one two three four", "five six seven", "eight nine ten"]);
        let small = build(small_chunks());
        let first = small
            .process_transcript(&t, ProcessOptions::default())
            .await
            .unwrap();
        assert!(first.chunks_indexed > 1);

        let large = build(Settings::default());
        let result = large.rechunk_episode("ep", true).await.unwrap();
        assert_eq!(result.chunks_created, 1);
        assert_eq!(vector_store.record_count().await.unwrap(), 1);
        assert_eq!(large.stored_chunks("ep").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_missing_stage_input_is_not_found() {
        let orch = test_orchestrator(Settings::default());

        assert!(orch.segment_episode("nope").unwrap_err().is_not_found());
        assert!(orch.index_episode("nope").await.unwrap_err().is_not_found());
        assert!(orch.profile_episode("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_empty_transcript_indexes_nothing() {
        let orch = test_orchestrator(Settings::default());
        let t = transcript("quiet", &[]);

        let result = orch.process_transcript(&t, ProcessOptions::default()).await.unwrap();
        assert_eq!(result.chunks_created, 0);
        assert_eq!(result.chunks_indexed, 0);
        assert!(!result.profiled);

        let err = orch.profile_episode("quiet").await.unwrap_err();
        assert!(matches!(err, CompanionError::EmptyChunkSet(_)));
    }

    #[tokio::test]
    async fn test_invalid_transcript_is_rejected() {
        let orch = test_orchestrator(Settings::default());
        let t = Transcript::new("bad", vec![Segment::new(5.0, 1.0, "backwards")]);

        let err = orch.process_transcript(&t, ProcessOptions::default()).await.unwrap_err();
        assert!(matches!(err, CompanionError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_recommend_and_search() {
        let orch = test_orchestrator(Settings::default());
        for (id, text) in [
            ("a", "banana bandana cabana"),
            ("b", "a banana salad"),
            ("c", "oolong tea, good mood"),
        ] {
            orch.process_transcript(&transcript(id, &[text]), ProcessOptions::default())
                .await
                .unwrap();
        }

        let results = orch
            .recommend("a", RecommendOptions { top_k: 5, alpha: 1.0 })
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].candidate_episode_id, "b");

        let hits = orch.search("good food", 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata.episode_id, "c");

        assert!(orch.search("   ", 3).await.is_err());
    }
}
