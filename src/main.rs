mod catalog;
mod error;
mod models;
mod rcon;
mod rotation;
mod voter;
mod voting;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use log::{debug, error, info, LevelFilter};

use catalog::CatalogSource;
use rcon::{RconClient, SquadRcon};
use voter::MapVoter;
use voting::{DEFAULT_CLAN_TAG, DEFAULT_LAYERS_URL, DEFAULT_VOTING_COOLDOWN_S, DEFAULT_VOTING_DURATION_S};

/// The default port for Squad RCON.
const DEFAULT_PORT: u16 = 21114;

/// How long to sleep in between "has the map changed" checks.
const SLEEP_BETWEEN_MAP_CHECKS: Duration = Duration::from_secs(10);

/// How long to wait before reconnecting after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(10);

/// An RCON bot that runs map votes on a Squad server.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The address of the RCON server (IP or hostname).
    #[arg(long)]
    rcon_address: String,

    /// The port of the RCON server.
    #[arg(long, default_value_t = DEFAULT_PORT)]
    rcon_port: u16,

    /// The RCON password. Falls back to the RCON_PASSWORD env var.
    #[arg(long)]
    rcon_password: Option<String>,

    /// How long to wait in between map votes, in seconds.
    #[arg(long, default_value_t = DEFAULT_VOTING_COOLDOWN_S)]
    voting_cooldown: u64,

    /// How long to listen for votes, in seconds.
    #[arg(long, default_value_t = DEFAULT_VOTING_DURATION_S)]
    voting_duration: u64,

    /// The clan tag whose members may start a vote at any time.
    #[arg(long, default_value = DEFAULT_CLAN_TAG)]
    clan_tag: String,

    /// The filepath to the map rotation (one map per line). When given,
    /// vote candidates are the next maps in the rotation; otherwise they
    /// are drawn randomly from the map layers catalog.
    #[arg(long)]
    map_rotation_filepath: Option<PathBuf>,

    /// The URL of the map layers JSON document.
    #[arg(long, default_value = DEFAULT_LAYERS_URL)]
    map_layers_url: String,

    /// A local map layers JSON file, used instead of the URL when given.
    #[arg(long)]
    map_layers_filepath: Option<PathBuf>,

    /// Log at debug level.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn catalog_source(&self) -> CatalogSource {
        match &self.map_layers_filepath {
            Some(path) => CatalogSource::File(path.clone()),
            None => CatalogSource::Url(self.map_layers_url.clone()),
        }
    }

    fn password(&self) -> Option<String> {
        self.rcon_password
            .clone()
            .or_else(|| env::var("RCON_PASSWORD").ok())
    }
}

/// Connects to the server and drives the voter until the connection dies.
async fn connect_and_run(cli: &Cli, password: &str) -> error::Result<()> {
    let address = format!("{}:{}", cli.rcon_address, cli.rcon_port);
    info!("Connecting to RCON server at {}", address);
    let rcon = SquadRcon::connect(&address, password).await?;

    let mut voter = MapVoter::new(
        rcon,
        cli.voting_cooldown,
        cli.voting_duration,
        cli.clan_tag.clone(),
        cli.map_rotation_filepath.clone(),
        cli.catalog_source(),
    );

    info!(
        "Will start checking for a new map every {:?} and waiting to start a map vote...",
        SLEEP_BETWEEN_MAP_CHECKS
    );
    loop {
        let (current_map, next_map) = voter.rcon().get_current_and_next_map().await?;
        debug!("Current map: {}, next map: {}", current_map, next_map);

        // Most recent player messages since the last tick.
        let recent_player_chat = voter.rcon().get_player_chat().await;
        voter.rcon().clear_player_chat().await;

        voter
            .run_once(&current_map, &next_map, &recent_player_chat)
            .await?;

        tokio::time::sleep(SLEEP_BETWEEN_MAP_CHECKS).await;
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    env_logger::Builder::from_default_env()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .init();

    let Some(password) = cli.password() else {
        error!("No RCON password given (use --rcon-password or set RCON_PASSWORD).");
        std::process::exit(2);
    };

    // Keep reconnecting on errors; only the user stops the bot.
    loop {
        if let Err(e) = connect_and_run(&cli, &password).await {
            error!("Encountered error: {}. Retrying...", e);
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}
