//! Self-play demo: a host and a guest meet through an in-process
//! rendezvous and play random legal moves until the match ends.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use versus_board::client::{ClientError, GameClient};
use versus_board::config::{Config, SessionConfig};
use versus_board::rules::GameType;
use versus_board::state::Phase;
use versus_board::transport::{MemoryRendezvous, Rendezvous};

/// Versus Board - two peers, one board
#[derive(Parser, Debug)]
#[command(name = "versus-board")]
#[command(about = "Play a local self-match between two peers", long_about = None)]
#[command(version)]
struct Cli {
    /// Game to play (checkers, come-come, cat-and-mouse)
    #[arg(short, long, default_value = "checkers")]
    game: GameType,

    /// Room name both peers meet under
    #[arg(long, default_value = "Practice")]
    room: String,

    /// Seed for colors and moves
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many moves
    #[arg(long, default_value = "200")]
    max_turns: usize,

    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

/// Play random legal moves while it is this client's turn.
fn play_random(client: &mut GameClient, rng: &mut StdRng) -> Result<(), ClientError> {
    while client.session().is_local_turn() {
        let moves = client.available_moves();
        let Some(mv) = moves.choose(rng).cloned() else {
            break;
        };
        let outcome = client.submit_move(mv)?;
        debug!(player = client.session().local_name(), ?outcome, "Played");
    }
    Ok(())
}

fn move_count(client: &GameClient) -> usize {
    client
        .session()
        .game()
        .map(|game| game.move_count())
        .unwrap_or(0)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_path(path)?,
        None => Config::default(),
    };
    if cli.seed.is_some() {
        config.session.seed = cli.seed;
    }
    let guest_config = Config {
        session: SessionConfig {
            seed: config.session.seed.map(|seed| seed.wrapping_add(1)),
        },
        ..config.clone()
    };
    let mut rng = match config.session.seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(2)),
        None => StdRng::from_entropy(),
    };

    info!(game = %cli.game, room = %cli.room, "Starting self-play");

    let rendezvous: Arc<dyn Rendezvous> = Arc::new(MemoryRendezvous::new());
    let mut host = GameClient::host("Host", &cli.room, rendezvous.clone(), &config).await?;
    let mut guest = GameClient::join("Guest", &cli.room, rendezvous, &guest_config).await?;
    host.select_game(cli.game)?;

    let mut started = false;
    loop {
        let event = tokio::select! {
            event = host.next_event() => event,
            event = guest.next_event() => event,
        };
        if event.is_none() {
            warn!("Transport stopped");
            break;
        }

        for notice in host.drain_notices().into_iter().chain(guest.drain_notices()) {
            info!(notice = notice.message(), "Notice");
        }

        if !started && host.session().phase() == Phase::RoomReady {
            host.choose_color_and_start(None)?;
            started = true;
        }

        play_random(&mut host, &mut rng)?;
        play_random(&mut guest, &mut rng)?;

        if host.session().phase() == Phase::Finished && guest.session().phase() == Phase::Finished {
            match host.session().winner() {
                Some(winner) => info!(
                    winner = %winner.name,
                    color = %winner.color,
                    moves = move_count(&host),
                    "Match over"
                ),
                None => info!("Match over without a winner"),
            }
            break;
        }

        if move_count(&host) >= cli.max_turns {
            info!(moves = move_count(&host), "Move limit reached");
            break;
        }
    }

    println!("{}", serde_json::to_string_pretty(&host.session().to_json())?);

    guest.reset_to_lobby();
    host.reset_to_lobby();
    Ok(())
}
