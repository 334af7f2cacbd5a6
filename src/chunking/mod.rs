//! Transcript segmentation into overlapping, time-stamped text chunks.
//!
//! Chunks are the unit of embedding, retrieval and affect classification.

mod overlap;

pub use overlap::segment;

use crate::transcript::format_timestamp;
use serde::{Deserialize, Serialize};

/// Seconds subtracted from a flushed chunk's end to estimate where the carried
/// overlap text begins in the audio.
///
/// This is a time heuristic, not a text-offset-accurate mapping.
pub const DEFAULT_OVERLAP_LOOKBACK_SECONDS: f64 = 5.0;

/// A chunk of episode transcript text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Episode this chunk belongs to.
    pub episode_id: String,
    /// Position of this chunk in the episode, dense from 0.
    pub chunk_id: u32,
    /// Text content of this chunk.
    pub text: String,
    /// Start time in seconds.
    pub ts_start: f64,
    /// End time in seconds.
    pub ts_end: f64,
}

impl Chunk {
    /// Duration of this chunk in seconds.
    pub fn duration(&self) -> f64 {
        self.ts_end - self.ts_start
    }

    /// Format the start timestamp for display.
    pub fn format_timestamp(&self) -> String {
        format_timestamp(self.ts_start)
    }
}

/// Configuration for segmentation.
#[derive(Debug, Clone)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk before a flush.
    pub max_chars: usize,
    /// Trailing characters of a flushed chunk carried into the next one.
    pub overlap_chars: usize,
    /// See [`DEFAULT_OVERLAP_LOOKBACK_SECONDS`].
    pub overlap_lookback_seconds: f64,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: 1000,
            overlap_chars: 150,
            overlap_lookback_seconds: DEFAULT_OVERLAP_LOOKBACK_SECONDS,
        }
    }
}

impl ChunkingConfig {
    /// Create a config with the default look-back.
    pub fn new(max_chars: usize, overlap_chars: usize) -> Self {
        Self {
            max_chars,
            overlap_chars,
            ..Default::default()
        }
    }
}
