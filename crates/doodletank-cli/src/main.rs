//! Doodletank CLI
//!
//! Runs the sketch classifier outside the browser: classify drawings, replay
//! stroke snapshots, make gallery thumbnails, and submit to the tank.

use anyhow::Result;
use clap::Parser;
use tracing::info;

mod cli;
mod commands;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    match cli.command {
        Commands::Thumbnail {
            image,
            output,
            width,
            height,
        } => commands::thumbnail(&image, &output, width, height)?,

        Commands::Classify {
            images,
            json,
            strict,
        } => {
            let config = commands::resolve_config(&cli.global)?;
            info!(subject = %config.subject, model = %config.model, "classifying {} drawing(s)", images.len());
            commands::classify(&config, &images, json, strict).await?;
        }

        Commands::Replay { frames } => {
            let config = commands::resolve_config(&cli.global)?;
            commands::replay(&config, &frames).await?;
        }

        Commands::Submit {
            image,
            artist,
            user_id,
            backend,
            token,
        } => {
            let config = commands::resolve_config(&cli.global)?;
            commands::submit(&config, &image, &artist, user_id, backend, token).await?;
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("doodletank=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("doodletank=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
