//! Configuration module for podcompanion.
//!
//! Handles loading and saving application settings.

mod settings;

pub use settings::{
    AffectSettings, EmbeddingSettings, GeneralSettings, RecommendSettings,
    SegmentationSettings, Settings, VectorStoreSettings,
};
