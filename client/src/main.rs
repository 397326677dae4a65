use clap::Parser;
use client::network::{Client, ClientSettings};
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Bot decisions per second
    #[arg(short = 'r', long, default_value = "30")]
    input_rate: u32,

    /// Disconnect after this many seconds (runs until kicked when omitted)
    #[arg(short = 'd', long)]
    duration_secs: Option<u64>,

    /// Seed for reproducible bot behaviour
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting bot client...");
    info!("Connecting to: {}", args.server);

    let settings = ClientSettings {
        input_rate: args.input_rate,
        duration: args.duration_secs.map(Duration::from_secs),
        seed: args.seed,
    };
    let mut client = Client::new(&args.server, settings).await?;

    let stats = client.run().await?;
    info!(
        "Session over: {} snapshots, {} deltas, {} phase events, {} inputs, {} casts",
        stats.snapshots, stats.deltas, stats.phase_events, stats.inputs_sent, stats.casts_sent
    );

    Ok(())
}
