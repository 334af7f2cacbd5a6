//! Process command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{Orchestrator, ProcessOptions};
use crate::transcript::Transcript;
use anyhow::Result;
use std::path::Path;

/// Run the process command.
pub async fn run_process(
    transcript_path: &str,
    force: bool,
    skip_affect: bool,
    settings: Settings,
) -> Result<()> {
    // Pre-flight checks
    if let Err(e) = preflight::check(Operation::Process, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let path = Settings::expand_path(transcript_path);
    let transcript = match Transcript::from_json_file(Path::new(&path)) {
        Ok(t) => t,
        Err(e) => {
            Output::error(&format!("Failed to read transcript: {}", e));
            return Err(e.into());
        }
    };

    Output::info(&format!(
        "Processing: {} ({} segments)",
        transcript.episode_id,
        transcript.segments.len()
    ));

    let orchestrator = Orchestrator::new(settings)?;
    let spinner = Output::spinner("Segmenting, embedding and profiling...");

    let result = orchestrator
        .process_transcript(&transcript, ProcessOptions { force, skip_affect })
        .await;
    spinner.finish_and_clear();

    match result {
        Ok(result) if result.skipped => {
            Output::warning(&format!(
                "'{}' is already indexed. Use --force to reprocess.",
                result.episode_id
            ));
        }
        Ok(result) => {
            Output::success(&format!(
                "Successfully indexed '{}' ({} chunks)",
                result.episode_id, result.chunks_indexed
            ));
            if result.profiled {
                Output::kv("Affect profile", "stored");
            } else if skip_affect {
                Output::kv("Affect profile", "skipped");
            } else {
                Output::kv("Affect profile", "none (no chunks)");
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to process: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
