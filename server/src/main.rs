use clap::Parser;
use log::{error, info};
use server::catalog::MiniGameCatalog;
use server::game::{GameSession, SessionSettings};
use server::network::{NetworkSettings, Server};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value_t = shared::DEFAULT_TICK_RATE)]
    tick_rate: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// Minigame to host
    #[arg(short = 'g', long, default_value = "race")]
    minigame: String,

    /// JSON catalog replacing the built-in content
    #[arg(short, long)]
    catalog: Option<PathBuf>,

    /// Seconds of silence before a client is dropped
    #[arg(long, default_value = "5")]
    client_timeout_secs: u64,

    /// Ticks between full snapshot broadcasts (0 disables them)
    #[arg(long, default_value = "120")]
    snapshot_interval: u32,

    /// Players needed before the lobby countdown starts
    #[arg(long, default_value = "2")]
    min_players: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    if args.tick_rate == 0 {
        return Err("tick rate must be at least 1".into());
    }

    let catalog = match &args.catalog {
        Some(path) => MiniGameCatalog::load(path)?,
        None => MiniGameCatalog::builtin(),
    };
    info!("Available minigames: {:?}", catalog.minigame_ids());

    let session_settings = SessionSettings {
        min_players: args.min_players.max(1),
        ..SessionSettings::default()
    };
    let session = GameSession::new(Arc::new(catalog), &args.minigame, session_settings)?;

    let network_settings = NetworkSettings {
        tick_duration: Duration::from_secs_f64(1.0 / args.tick_rate as f64),
        max_clients: args.max_clients,
        client_timeout: Duration::from_secs(args.client_timeout_secs),
        snapshot_interval: args.snapshot_interval,
    };

    let address = format!("{}:{}", args.host, args.port);
    info!(
        "Starting server on {} at {}Hz hosting '{}'",
        address, args.tick_rate, args.minigame
    );
    let mut server = Server::new(&address, network_settings, session).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
