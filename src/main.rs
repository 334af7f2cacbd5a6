//! podcompanion CLI entry point.

use anyhow::Result;
use clap::Parser;
use podcompanion::cli::{commands, Cli, Commands};
use podcompanion::config::Settings;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config_path = cli.config.as_deref().map(Settings::expand_path);
    let settings = Settings::load_from(config_path.as_ref())?;

    // Initialize logging
    let log_level = match cli.verbose {
        0 => settings.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("podcompanion={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    // Ensure data directory exists
    std::fs::create_dir_all(settings.data_dir())?;

    // Execute command
    match &cli.command {
        Commands::Process {
            transcript,
            force,
            skip_affect,
        } => {
            commands::run_process(transcript, *force, *skip_affect, settings).await?;
        }

        Commands::Rechunk {
            episode_id,
            skip_affect,
        } => {
            commands::run_rechunk(episode_id, *skip_affect, settings).await?;
        }

        Commands::Profile { episode_id } => {
            commands::run_profile(episode_id, settings).await?;
        }

        Commands::Recommend {
            episode_id,
            top_k,
            alpha,
        } => {
            commands::run_recommend(episode_id, *top_k, *alpha, settings).await?;
        }

        Commands::Search { query, limit } => {
            commands::run_search(query, *limit, settings).await?;
        }

        Commands::List => {
            commands::run_list(settings).await?;
        }

        Commands::Export {
            episode_id,
            artifact,
            output,
        } => {
            commands::run_export(episode_id, *artifact, output.clone(), settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, config_path)?;
        }
    }

    Ok(())
}
