//! # GeoBridge CLI
//!
//! Publishes a project's layers to GeoServer from the command line.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          geobridge publish                              │
//! │                                                                         │
//! │  config.toml ──► BridgeConfig ──┐                                       │
//! │                                 ├──► PublishSession ──► GeoServer       │
//! │  manifest.toml ──► Manifest ────┘         │                             │
//! │       │                                   ▼                             │
//! │       └── data_dir / styles_dir ──► local collaborators                 │
//! │                                                                         │
//! │  report printed as text or JSON; exit code 1 when anything failed       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod cli;
mod commands;
mod local;
mod manifest;

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    debug!(?cli, "Arguments parsed");

    let ctx = commands::Context::load(&cli)?;
    let ok = match cli.command {
        Commands::Publish(args) => commands::publish(&ctx, args).await?,
        Commands::Validate(args) => commands::validate(&ctx, args).await?,
        Commands::TestConnection => commands::test_connection(&ctx).await?,
        Commands::Layers(args) => commands::layers(&ctx, args).await?,
        Commands::Datastores => commands::datastores(&ctx).await?,
        Commands::AddDatastore(args) => commands::add_datastore(&ctx, args).await?,
        Commands::MetadataLink(args) => commands::metadata_link(&ctx, args).await?,
        Commands::Unpublish(args) => commands::unpublish(&ctx, args).await?,
        Commands::PreviewUrl(args) => commands::preview_url(&ctx, args)?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}
