//! Blobberman Agent - headless bot client.
//!
//! Connects to a relay, announces a persistent id and a display name, then
//! runs the engine locally in lockstep and answers every tick with an
//! input. Useful for load testing and for filling a session with players.

use anyhow::{bail, Context, Result};
use blobber_core::{ClientUpdate, EngineConfig, LockstepClient};
use blobber_env::protocol::{ClientIdMessage, InputMessage, SetDisplayNameMessage};
use blobber_env::{ClientMessage, PlayerId};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

mod bot;

use bot::Bot;

/// Ticks between score reports.
const REPORT_EVERY: u64 = 200;

#[derive(Parser, Debug)]
#[command(name = "blobber-agent")]
#[command(about = "Headless Blobberman bot for a lockstep relay")]
struct Args {
    /// Relay WebSocket endpoint
    #[arg(short, long, default_value = "ws://127.0.0.1:8080/ws")]
    url: String,

    /// Display name shown to other players
    #[arg(short, long)]
    name: Option<String>,

    /// Persistent player id (defaults to a random bot-<uuid>)
    #[arg(long)]
    client_id: Option<String>,

    /// Seed for the bot's decisions (0 = random)
    #[arg(short, long, default_value = "0")]
    seed: u64,

    /// Chance of dropping a bomb on a tick when one is available
    #[arg(long, default_value = "0.05")]
    bomb_rate: f64,

    /// Disconnect after this many applied ticks
    #[arg(long)]
    ticks: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let player = PlayerId::new(
        args.client_id
            .clone()
            .unwrap_or_else(|| format!("bot-{}", uuid::Uuid::new_v4())),
    );
    let rng = if args.seed == 0 {
        StdRng::from_entropy()
    } else {
        StdRng::seed_from_u64(args.seed)
    };

    tokio::select! {
        result = play(&args, player, rng) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, leaving");
            Ok(())
        }
    }
}

async fn play(args: &Args, player: PlayerId, rng: StdRng) -> Result<()> {
    let (mut ws, _) = connect_async(args.url.as_str())
        .await
        .with_context(|| format!("failed to connect to {}", args.url))?;
    info!("Connected to {} as {}", args.url, player);

    let hello = ClientMessage::ClientId(ClientIdMessage {
        player_id: player.clone(),
    });
    ws.send(Message::Text(hello.encode()?)).await?;
    if let Some(name) = &args.name {
        let message = ClientMessage::DisplayName(SetDisplayNameMessage {
            player_id: player.clone(),
            display_name: name.clone(),
        });
        ws.send(Message::Text(message.encode()?)).await?;
    }

    let mut client = LockstepClient::new(EngineConfig::default());
    let mut bot = Bot::new(player.clone(), rng, args.bomb_rate);
    let mut applied: u64 = 0;

    while let Some(frame) = ws.next().await {
        let text = match frame.context("relay connection failed")? {
            Message::Text(text) => text,
            Message::Close(_) => {
                info!("Relay closed the connection");
                return Ok(());
            }
            _ => continue,
        };

        let update = match client.handle_text(&text) {
            Ok(update) => update,
            Err(e) => {
                warn!("Ignoring relay message: {}", e);
                continue;
            }
        };
        match update {
            ClientUpdate::Connected { player_id } => {
                if player_id != player {
                    debug!("Relay still knows us as {}", player_id);
                }
                bot.set_player(player_id);
                continue;
            }
            ClientUpdate::Ticked { .. } => applied += 1,
            ClientUpdate::CaughtUp {
                from_tick,
                to_tick,
                applied: replayed,
                ..
            } => {
                info!("Caught up on ticks {}..={}", from_tick, to_tick);
                applied += replayed as u64;
            }
            ClientUpdate::Countdown { remaining } => {
                if remaining == 0 {
                    info!("New session starting");
                } else {
                    debug!("Next session in {}s", remaining);
                }
                continue;
            }
            ClientUpdate::Stale { .. } | ClientUpdate::DisplayNames => continue,
        }

        let world = client.world();
        if applied % REPORT_EVERY == 0 {
            report(&client, &player);
        }
        if let Some(input) = bot.decide(world) {
            let message = ClientMessage::Input(InputMessage { input });
            ws.send(Message::Text(message.encode()?)).await?;
        }
        if args.ticks.map_or(false, |limit| applied >= limit) {
            info!("Played {} ticks, leaving", applied);
            report(&client, &player);
            ws.close(None).await?;
            return Ok(());
        }
    }
    bail!("relay connection ended unexpectedly")
}

fn report(client: &LockstepClient, player: &PlayerId) {
    let world = client.world();
    let name = client.display_name(player).unwrap_or(player.as_str());
    let leader = world
        .painted_counts
        .iter()
        .max_by_key(|(_, count)| **count)
        .map(|(id, count)| format!("{} ({})", client.display_name(id).unwrap_or(id.as_str()), count));
    info!(
        "tick {:?}: {} owns {} tiles, leader {}",
        world.current_tick,
        name,
        world.painted(player),
        leader.as_deref().unwrap_or("none")
    );
}
