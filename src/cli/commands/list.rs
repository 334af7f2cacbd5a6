//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;
use std::collections::HashSet;

/// Run the list command.
pub async fn run_list(settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let artifacts = orchestrator.artifacts();

    let episodes = match orchestrator.vector_store().list_episodes().await {
        Ok(episodes) => episodes,
        Err(e) => {
            Output::error(&format!("Failed to list episodes: {}", e));
            return Err(e.into());
        }
    };

    if episodes.is_empty() {
        Output::info(
            "No episodes indexed yet. Use 'podcompanion process <transcript.json>' to add content.",
        );
    } else {
        Output::header(&format!("Indexed Episodes ({})", episodes.len()));
        println!();

        for episode in &episodes {
            let profile = artifacts.load_profile(&episode.episode_id)?;
            let mood = profile
                .as_ref()
                .and_then(|p| p.dominant_label())
                .map(|(label, _)| label.to_string());
            Output::episode_info(
                &episode.episode_id,
                episode.chunk_count,
                episode.duration_seconds,
                mood.as_deref(),
            );
        }

        let total_chunks: u32 = episodes.iter().map(|e| e.chunk_count).sum();
        println!();
        Output::kv("Total episodes", &episodes.len().to_string());
        Output::kv("Total chunks", &total_chunks.to_string());
    }

    // Transcripts whose pipeline run stopped before indexing
    let indexed: HashSet<&str> = episodes.iter().map(|e| e.episode_id.as_str()).collect();
    let pending: Vec<String> = artifacts
        .list_transcripts()?
        .into_iter()
        .map(|t| t.episode_id)
        .filter(|id| !indexed.contains(id.as_str()))
        .collect();

    if !pending.is_empty() {
        println!();
        Output::warning(&format!("{} stored transcripts are not indexed:", pending.len()));
        for id in &pending {
            Output::list_item(id);
        }
    }

    Ok(())
}
