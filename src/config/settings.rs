//! Configuration settings for podcompanion.

use crate::affect::LabelPolicy;
use crate::chunking::{ChunkingConfig, DEFAULT_OVERLAP_LOOKBACK_SECONDS};
use crate::recommend::RecommendOptions;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub segmentation: SegmentationSettings,
    pub embedding: EmbeddingSettings,
    pub affect: AffectSettings,
    pub vector_store: VectorStoreSettings,
    pub recommend: RecommendSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level used when no `-v` flag is given.
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.podcompanion".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Transcript segmentation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationSettings {
    /// Maximum characters per chunk before a flush.
    pub max_chars: usize,
    /// Trailing characters carried from a flushed chunk into the next one.
    pub overlap_chars: usize,
    /// Seconds subtracted from the flushed chunk's end to estimate where the overlap starts.
    pub overlap_lookback_seconds: f64,
}

impl Default for SegmentationSettings {
    fn default() -> Self {
        Self {
            max_chars: 1000,
            overlap_chars: 150,
            overlap_lookback_seconds: DEFAULT_OVERLAP_LOOKBACK_SECONDS,
        }
    }
}

impl SegmentationSettings {
    /// Build the chunker configuration.
    pub fn chunking_config(&self) -> ChunkingConfig {
        ChunkingConfig {
            max_chars: self.max_chars,
            overlap_chars: self.overlap_chars,
            overlap_lookback_seconds: self.overlap_lookback_seconds,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding provider (openai).
    pub provider: String,
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Affect classification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AffectSettings {
    /// LLM model used to score chunks.
    pub model: String,
    /// Ordered emotion label set every chunk is scored against.
    pub labels: Vec<String>,
    /// Maximum concurrent classification calls.
    pub max_concurrent: usize,
    /// How label sets are reconciled when comparing two profiles.
    pub label_policy: LabelPolicy,
}

impl Default for AffectSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            labels: ["anger", "disgust", "fear", "joy", "neutral", "sadness", "surprise"]
                .iter()
                .map(|l| l.to_string())
                .collect(),
            max_concurrent: 4,
            label_policy: LabelPolicy::Strict,
        }
    }
}

/// Vector store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreSettings {
    /// Vector store provider (sqlite, memory).
    pub provider: String,
    /// Path to SQLite database (for sqlite provider).
    pub sqlite_path: String,
}

impl Default for VectorStoreSettings {
    fn default() -> Self {
        Self {
            provider: "sqlite".to_string(),
            sqlite_path: "~/.podcompanion/index.db".to_string(),
        }
    }
}

/// Recommendation defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendSettings {
    /// Number of episodes returned.
    pub top_k: usize,
    /// Weight of semantic similarity; the rest goes to affect similarity.
    pub alpha: f32,
}

impl Default for RecommendSettings {
    fn default() -> Self {
        Self { top_k: 5, alpha: 0.8 }
    }
}

impl RecommendSettings {
    /// Options with optional per-call overrides.
    pub fn options(&self, top_k: Option<usize>, alpha: Option<f32>) -> RecommendOptions {
        RecommendOptions {
            top_k: top_k.unwrap_or(self.top_k),
            alpha: alpha.unwrap_or(self.alpha),
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::CompanionError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("podcompanion")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.vector_store.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
            [segmentation]
            max_chars = 400

            [affect]
            label_policy = "shared"
            "#,
        )
        .unwrap();

        assert_eq!(settings.segmentation.max_chars, 400);
        assert_eq!(settings.segmentation.overlap_chars, 150);
        assert_eq!(settings.segmentation.overlap_lookback_seconds, 5.0);
        assert_eq!(settings.affect.label_policy, LabelPolicy::Shared);
        assert_eq!(settings.affect.labels.len(), 7);
        assert_eq!(settings.recommend.top_k, 5);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.recommend.alpha = 0.5;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.recommend.alpha, 0.5);
        assert_eq!(loaded.vector_store.provider, "sqlite");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let settings = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(settings.segmentation.max_chars, 1000);
    }

    #[test]
    fn test_recommend_overrides() {
        let settings = RecommendSettings::default();
        let opts = settings.options(Some(3), None);
        assert_eq!(opts.top_k, 3);
        assert!((opts.alpha - 0.8).abs() < f32::EPSILON);
    }
}
