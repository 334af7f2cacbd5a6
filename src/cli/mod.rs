//! CLI module for podcompanion.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand, ValueEnum};

/// podcompanion - Podcast segmentation, search and recommendation
///
/// Turns episode transcripts into an indexed corpus and recommends related
/// episodes by blending semantic and emotional similarity.
#[derive(Parser, Debug)]
#[command(name = "podcompanion")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Segment, index and profile a transcript JSON file
    Process {
        /// Path to the transcript JSON file
        transcript: String,

        /// Force re-processing even if already indexed
        #[arg(short, long)]
        force: bool,

        /// Skip affect profiling
        #[arg(long)]
        skip_affect: bool,
    },

    /// Re-segment and re-index stored transcripts with the current settings
    Rechunk {
        /// Episode ID to rechunk (use 'all' to rechunk everything)
        episode_id: String,

        /// Skip affect profiling
        #[arg(long)]
        skip_affect: bool,
    },

    /// Build or rebuild the affect profile of an episode
    Profile {
        /// Episode ID
        episode_id: String,
    },

    /// Recommend related episodes
    Recommend {
        /// Episode ID to find related episodes for
        episode_id: String,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Weight of semantic similarity (0.0-1.0); the rest goes to affect
        #[arg(short, long)]
        alpha: Option<f32>,
    },

    /// Search for transcript chunks relevant to a query
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long, default_value = "5")]
        limit: usize,
    },

    /// List indexed episodes
    List,

    /// Export a stored episode artifact as JSON
    Export {
        /// Episode ID to export
        episode_id: String,

        /// Artifact to export
        #[arg(long, value_enum, default_value_t = Artifact::Transcript)]
        artifact: Artifact,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Start HTTP API server for integration with other systems
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Per-episode artifacts that can be exported.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Transcript,
    Chunks,
    Profile,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recommend() {
        let cli = Cli::try_parse_from(["podcompanion", "-vv", "recommend", "ep1", "-k", "3", "-a", "0.5"])
            .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Recommend {
                episode_id,
                top_k,
                alpha,
            } => {
                assert_eq!(episode_id, "ep1");
                assert_eq!(top_k, Some(3));
                assert_eq!(alpha, Some(0.5));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_export_artifact() {
        let cli = Cli::try_parse_from(["podcompanion", "export", "ep1", "--artifact", "chunks"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Export {
                artifact: Artifact::Chunks,
                output: None,
                ..
            }
        ));
    }
}
