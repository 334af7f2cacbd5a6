//! Durable per-episode artifacts handed from one pipeline stage to the next.
//!
//! Each stage reads its input from here and persists its output before the next
//! stage starts, so a crashed run can resume at stage granularity.

use crate::affect::AffectProfile;
use crate::chunking::Chunk;
use crate::error::{CompanionError, Result};
use crate::transcript::Transcript;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Summary of a stored transcript.
#[derive(Debug, Clone, Serialize)]
pub struct StoredTranscript {
    pub episode_id: String,
    pub language: String,
    pub duration: f64,
    pub segment_count: usize,
    pub stored_at: DateTime<Utc>,
}

/// Storage for transcripts, chunk sets and affect profiles.
pub trait ArtifactStore: Send + Sync {
    /// Store a transcript, replacing any previous one for the episode.
    fn save_transcript(&self, transcript: &Transcript) -> Result<()>;

    /// Retrieve a stored transcript.
    fn load_transcript(&self, episode_id: &str) -> Result<Option<Transcript>>;

    /// List all stored transcripts.
    fn list_transcripts(&self) -> Result<Vec<StoredTranscript>>;

    /// Replace an episode's chunk set atomically.
    fn save_chunks(&self, episode_id: &str, chunks: &[Chunk]) -> Result<()>;

    /// Retrieve a chunk set; `None` if the episode was never segmented.
    fn load_chunks(&self, episode_id: &str) -> Result<Option<Vec<Chunk>>>;

    /// Store an affect profile, replacing any previous one for the episode.
    fn save_profile(&self, profile: &AffectProfile) -> Result<()>;

    /// Retrieve a stored affect profile.
    fn load_profile(&self, episode_id: &str) -> Result<Option<AffectProfile>>;

    /// Drop an episode's affect profile. Returns whether one existed.
    fn delete_profile(&self, episode_id: &str) -> Result<bool>;
}

#[derive(Default)]
struct Artifacts {
    transcripts: HashMap<String, (Transcript, DateTime<Utc>)>,
    chunks: HashMap<String, Vec<Chunk>>,
    profiles: HashMap<String, AffectProfile>,
}

/// In-memory artifact store.
#[derive(Default)]
pub struct MemoryArtifactStore {
    inner: RwLock<Artifacts>,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Artifacts>> {
        self.inner
            .read()
            .map_err(|e| CompanionError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Artifacts>> {
        self.inner
            .write()
            .map_err(|e| CompanionError::VectorStore(format!("Failed to acquire lock: {}", e)))
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn save_transcript(&self, transcript: &Transcript) -> Result<()> {
        self.write()?.transcripts.insert(
            transcript.episode_id.clone(),
            (transcript.clone(), Utc::now()),
        );
        Ok(())
    }

    fn load_transcript(&self, episode_id: &str) -> Result<Option<Transcript>> {
        Ok(self
            .read()?
            .transcripts
            .get(episode_id)
            .map(|(t, _)| t.clone()))
    }

    fn list_transcripts(&self) -> Result<Vec<StoredTranscript>> {
        let inner = self.read()?;
        let mut stored: Vec<StoredTranscript> = inner
            .transcripts
            .values()
            .map(|(t, stored_at)| StoredTranscript {
                episode_id: t.episode_id.clone(),
                language: t.language.clone(),
                duration: t.duration,
                segment_count: t.segments.len(),
                stored_at: *stored_at,
            })
            .collect();
        stored.sort_by(|a, b| {
            b.stored_at
                .cmp(&a.stored_at)
                .then_with(|| a.episode_id.cmp(&b.episode_id))
        });
        Ok(stored)
    }

    fn save_chunks(&self, episode_id: &str, chunks: &[Chunk]) -> Result<()> {
        self.write()?
            .chunks
            .insert(episode_id.to_string(), chunks.to_vec());
        Ok(())
    }

    fn load_chunks(&self, episode_id: &str) -> Result<Option<Vec<Chunk>>> {
        Ok(self.read()?.chunks.get(episode_id).cloned())
    }

    fn save_profile(&self, profile: &AffectProfile) -> Result<()> {
        self.write()?
            .profiles
            .insert(profile.episode_id.clone(), profile.clone());
        Ok(())
    }

    fn load_profile(&self, episode_id: &str) -> Result<Option<AffectProfile>> {
        Ok(self.read()?.profiles.get(episode_id).cloned())
    }

    fn delete_profile(&self, episode_id: &str) -> Result<bool> {
        Ok(self.write()?.profiles.remove(episode_id).is_some())
    }
}
