//! Transcript artifact produced by the (external) speech-to-text stage.

use crate::error::{CompanionError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// A complete episode transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcript {
    /// Episode this transcript belongs to.
    pub episode_id: String,
    /// Detected spoken language.
    #[serde(default)]
    pub language: String,
    /// Total duration in seconds.
    #[serde(default)]
    pub duration: f64,
    /// Time-stamped segments, ordered by start time.
    pub segments: Vec<Segment>,
}

/// A single time-stamped piece of transcribed speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Transcribed text content.
    pub text: String,
}

impl Segment {
    /// Create a new segment.
    pub fn new(start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            start,
            end,
            text: text.into(),
        }
    }
}

impl Transcript {
    /// Create a transcript from segments, deriving the duration from the last segment.
    pub fn new(episode_id: impl Into<String>, segments: Vec<Segment>) -> Self {
        let duration = segments.last().map(|s| s.end).unwrap_or(0.0);
        Self {
            episode_id: episode_id.into(),
            language: String::new(),
            duration,
            segments,
        }
    }

    /// Read a transcript JSON document from disk.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CompanionError::NotFound(format!(
                "transcript file {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let transcript: Transcript = serde_json::from_str(&content)?;
        debug!(
            "Loaded transcript {} ({} segments)",
            transcript.episode_id,
            transcript.segments.len()
        );
        Ok(transcript)
    }

    /// Check the structural invariants of the transcript.
    pub fn validate(&self) -> Result<()> {
        if self.episode_id.trim().is_empty() {
            return Err(CompanionError::InvalidInput(
                "transcript has an empty episode_id".to_string(),
            ));
        }

        let mut previous_start = f64::NEG_INFINITY;
        for (i, seg) in self.segments.iter().enumerate() {
            if !seg.start.is_finite() || !seg.end.is_finite() {
                return Err(CompanionError::InvalidInput(format!(
                    "segment {} has a non-finite timestamp",
                    i
                )));
            }
            if seg.end < seg.start {
                return Err(CompanionError::InvalidInput(format!(
                    "segment {} ends ({}) before it starts ({})",
                    i, seg.end, seg.start
                )));
            }
            if seg.start < previous_start {
                return Err(CompanionError::InvalidInput(format!(
                    "segment {} starts at {} before the previous segment ({})",
                    i, seg.start, previous_start
                )));
            }
            previous_start = seg.start;
        }

        Ok(())
    }

    /// All segment text joined with single spaces.
    pub fn full_text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
