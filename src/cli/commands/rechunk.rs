//! Rechunk command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the rechunk command.
pub async fn run_rechunk(episode_id: &str, skip_affect: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Process, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;

    if episode_id == "all" {
        // Rechunk every episode with a stored transcript
        let stored = orchestrator.artifacts().list_transcripts()?;

        if stored.is_empty() {
            Output::warning("No stored transcripts found.");
            Output::info("Use 'podcompanion process <transcript.json>' to add episodes.");
            return Ok(());
        }

        Output::info(&format!("Found {} episodes to rechunk", stored.len()));

        let mut success_count = 0;
        let mut error_count = 0;
        let progress = Output::progress_bar(stored.len() as u64, "Rechunking");

        for item in &stored {
            progress.set_message(item.episode_id.clone());
            match orchestrator.rechunk_episode(&item.episode_id, skip_affect).await {
                Ok(_) => success_count += 1,
                Err(e) => {
                    progress.suspend(|| {
                        Output::error(&format!("  {}: {}", item.episode_id, e));
                    });
                    error_count += 1;
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        Output::info(&format!(
            "Rechunking complete: {} succeeded, {} failed",
            success_count, error_count
        ));
    } else {
        Output::info(&format!("Rechunking episode: {}", episode_id));

        let spinner = Output::spinner("Rechunking...");

        match orchestrator.rechunk_episode(episode_id, skip_affect).await {
            Ok(result) => {
                spinner.finish_and_clear();
                Output::success(&format!(
                    "Successfully rechunked '{}' ({} chunks)",
                    result.episode_id, result.chunks_indexed
                ));
            }
            Err(e) => {
                spinner.finish_and_clear();
                Output::error(&format!("Failed to rechunk: {}", e));
                return Err(e.into());
            }
        }
    }

    Ok(())
}
