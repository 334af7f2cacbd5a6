//! Export command implementation.

use crate::cli::{Artifact, Output};
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the export command.
pub async fn run_export(
    episode_id: &str,
    artifact: Artifact,
    output: Option<String>,
    settings: Settings,
) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;
    let artifacts = orchestrator.artifacts();

    let (output_str, count) = match artifact {
        Artifact::Transcript => match artifacts.load_transcript(episode_id)? {
            Some(t) => (serde_json::to_string_pretty(&t)?, t.segments.len()),
            None => return not_found("transcript", episode_id),
        },
        Artifact::Chunks => match artifacts.load_chunks(episode_id)? {
            Some(chunks) => (serde_json::to_string_pretty(&chunks)?, chunks.len()),
            None => return not_found("chunk set", episode_id),
        },
        Artifact::Profile => match artifacts.load_profile(episode_id)? {
            Some(p) => (serde_json::to_string_pretty(&p)?, p.emotion_labels.len()),
            None => return not_found("affect profile", episode_id),
        },
    };

    // Write output
    match output {
        Some(path) if path != "-" => {
            std::fs::write(&path, &output_str)?;
            Output::success(&format!(
                "Exported {:?} of '{}' to {} ({} entries)",
                artifact, episode_id, path, count
            ));
        }
        _ => {
            // Output to stdout
            println!("{}", output_str);
        }
    }

    Ok(())
}

fn not_found(what: &str, episode_id: &str) -> Result<()> {
    Output::error(&format!("No stored {} for episode: {}", what, episode_id));
    Output::info("Use 'podcompanion list' to see indexed episodes.");
    Err(anyhow::anyhow!("{} not found for {}", what, episode_id))
}
