//! podcompanion - Podcast segmentation, search and recommendation
//!
//! Turns long-form spoken-audio transcripts into a searchable, cross-episode
//! recommendation corpus.
//!
//! # Overview
//!
//! podcompanion allows you to:
//! - Segment transcripts into overlapping, time-stamped text chunks
//! - Embed and index chunks in a vector store
//! - Summarize each episode's emotional tone as an affect profile
//! - Recommend related episodes by blending semantic and affect similarity
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `transcript` - Transcript artifact
//! - `chunking` - Transcript segmentation
//! - `embedding` - Embedding generation
//! - `vector_store` - Vector index abstraction
//! - `affect` - Affect classification and episode profiles
//! - `artifacts` - Durable per-episode pipeline artifacts
//! - `recommend` - Episode recommendation
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use podcompanion::config::Settings;
//! use podcompanion::orchestrator::{Orchestrator, ProcessOptions};
//! use podcompanion::recommend::RecommendOptions;
//! use podcompanion::transcript::Transcript;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let transcript = Transcript::from_json_file(Path::new("episode-42.json"))?;
//!     let result = orchestrator
//!         .process_transcript(&transcript, ProcessOptions::default())
//!         .await?;
//!     println!("Indexed {} chunks", result.chunks_indexed);
//!
//!     for rec in orchestrator
//!         .recommend("episode-42", RecommendOptions::default())
//!         .await?
//!     {
//!         println!("{} {:.3}", rec.candidate_episode_id, rec.blended_score);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod affect;
pub mod artifacts;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod recommend;
pub mod transcript;
pub mod vector_store;

pub use error::{CompanionError, Result};
