//! Profile command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the profile command.
pub async fn run_profile(episode_id: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Profile, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let spinner = Output::spinner("Classifying chunks...");

    let result = orchestrator.profile_episode(episode_id).await;
    spinner.finish_and_clear();

    let profile = match result {
        Ok(profile) => profile,
        Err(e) => {
            Output::error(&format!("Failed to profile '{}': {}", episode_id, e));
            return Err(e.into());
        }
    };

    Output::header(&format!("Affect profile: {}", profile.episode_id));
    for label in &profile.emotion_labels {
        let score = profile.mean_profile.get(label).copied().unwrap_or(0.0);
        Output::kv(label, &format!("{:.3}", score));
    }
    if let Some((label, _)) = profile.dominant_label() {
        println!();
        Output::info(&format!("Dominant tone: {}", label));
    }

    Ok(())
}
