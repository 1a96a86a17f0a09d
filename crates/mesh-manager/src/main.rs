//! WireGuard mesh manager
//!
//! Usage:
//!   mesh-manager [--config FILE] serve          # REST API + live sync
//!   mesh-manager render-server                   # Print the server config
//!   mesh-manager render-peer <ID>                # Print a peer config
//!
//! Settings come from the optional TOML file, overlaid with `WG_*` and
//! `API_*` environment variables.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mesh_manager::{
    start_server, AppState, ConfigRenderer, MeshConfig, MeshManager, NetworkStorage, PeerId,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "mesh-manager", version, about = "WireGuard mesh manager")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "MESH_CONFIG")]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Bring the interface up and serve the REST API
    Serve,
    /// Print the rendered server config from stored state
    RenderServer,
    /// Print the rendered config of one peer from stored state
    RenderPeer {
        /// Peer id
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match cli.config {
        Some(ref path) => MeshConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => MeshConfig::from_env()?,
    };

    match cli.command {
        Command::Serve => serve(config).await,
        Command::RenderServer => {
            let network = load_network(&config)?;
            print!("{}", ConfigRenderer::new(&config).render_server(&network)?);
            Ok(())
        }
        Command::RenderPeer { id } => {
            let network = load_network(&config)?;
            let peer_id = PeerId::new(id);
            print!(
                "{}",
                ConfigRenderer::new(&config).render_peer(&network, &peer_id)?
            );
            Ok(())
        }
    }
}

async fn serve(config: MeshConfig) -> Result<()> {
    let api = config.api.clone();
    let manager = Arc::new(MeshManager::new(config)?);
    manager.init().await.context("initializing mesh")?;

    let state = Arc::new(AppState::with_manager(manager.clone()));
    let server = start_server(state, api);

    tokio::select! {
        result = server => result.context("API server failed")?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
        }
    }

    manager.shutdown().await?;
    Ok(())
}

fn load_network(config: &MeshConfig) -> Result<mesh_manager::Network> {
    config.validate()?;
    let storage = NetworkStorage::new(&config.state_dir, &config.interface);
    storage.load()?.with_context(|| {
        format!(
            "no stored network at {}; run `serve` once to create it",
            storage.state_path().display()
        )
    })
}
