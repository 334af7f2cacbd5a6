//! Search command implementation.

use crate::chunking::Chunk;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::transcript::format_timestamp;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(query: &str, limit: usize, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Search, &settings) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let spinner = Output::spinner("Searching...");

    let results = orchestrator.search(query, limit).await;
    spinner.finish_and_clear();

    let hits = match results {
        Ok(hits) => hits,
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    };

    if hits.is_empty() {
        Output::warning("No results found matching your query.");
        return Ok(());
    }

    Output::success(&format!("Found {} results", hits.len()));
    for hit in &hits {
        // Prefer the full chunk text when the chunk set is still stored
        let text = orchestrator
            .artifacts()
            .load_chunks(&hit.metadata.episode_id)
            .ok()
            .flatten()
            .and_then(|chunks: Vec<Chunk>| {
                chunks
                    .into_iter()
                    .find(|c| c.chunk_id == hit.metadata.chunk_id)
                    .map(|c| c.text)
            })
            .unwrap_or_else(|| hit.metadata.preview.clone());

        Output::search_result(
            &hit.metadata.episode_id,
            &format_timestamp(hit.metadata.ts_start),
            hit.similarity(),
            &text,
        );
    }

    Ok(())
}
