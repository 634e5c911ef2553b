//! Blobberman lockstep relay server.

use anyhow::Context;
use blobber_env::TokioContext;
use blobber_relay::config::{DEFAULT_MAX_TICKS, DEFAULT_RESET_TIMEOUT_SECS, DEFAULT_TICK_INTERVAL_MS};
use blobber_relay::{serve, ConnectionSettings, Hub, HubConfig};
use clap::Parser;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "blobber-relay")]
#[command(about = "Lockstep input relay for Blobberman", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    addr: String,

    /// Milliseconds between ticks
    #[arg(long, default_value_t = DEFAULT_TICK_INTERVAL_MS)]
    tick_interval: u64,

    /// Ticks per session before the reset countdown
    #[arg(long, default_value_t = DEFAULT_MAX_TICKS)]
    max_ticks: u64,

    /// Tick records kept for late joiners (default: the whole session)
    #[arg(long)]
    history_cap: Option<usize>,

    /// Seconds between session end and the next session
    #[arg(long, default_value_t = DEFAULT_RESET_TIMEOUT_SECS)]
    reset_timeout: u64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    let mut config = HubConfig::new(
        Duration::from_millis(args.tick_interval.max(1)),
        args.max_ticks,
        args.reset_timeout,
    );
    if let Some(cap) = args.history_cap {
        config = config.with_history_cap(cap);
    }
    info!(
        "Blobberman relay: {}ms ticks, {} ticks per session, {}s reset countdown",
        args.tick_interval, config.max_ticks, config.reset_timeout_secs
    );

    let (hub, handle) = Hub::new(config, TokioContext::shared());
    tokio::spawn(hub.run());

    let listener = TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("failed to bind {}", args.addr))?;
    serve(listener, handle, ConnectionSettings::default()).await?;
    Ok(())
}
