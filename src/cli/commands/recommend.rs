//! Recommend command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the recommend command.
pub async fn run_recommend(
    episode_id: &str,
    top_k: Option<usize>,
    alpha: Option<f32>,
    settings: Settings,
) -> Result<()> {
    let options = settings.recommend.options(top_k, alpha);
    let orchestrator = Orchestrator::new(settings)?;

    let results = match orchestrator.recommend(episode_id, options).await {
        Ok(results) => results,
        Err(e) => {
            Output::error(&format!("Recommendation failed: {}", e));
            return Err(e.into());
        }
    };

    if results.is_empty() {
        Output::warning(&format!("No recommendations for '{}'.", episode_id));
        if !orchestrator.vector_store().is_episode_indexed(episode_id).await? {
            Output::info("The episode is not indexed. Use 'podcompanion list' to see indexed episodes.");
        }
        return Ok(());
    }

    Output::header(&format!(
        "Episodes related to {} (alpha {:.2})",
        episode_id, options.alpha
    ));
    for (i, result) in results.iter().enumerate() {
        Output::recommendation(i + 1, result);
    }

    Ok(())
}
