//! Peer Tracker Bot
//!
//! Tracks user-registered peers against an external status API and
//! notifies owners about reward/score increases and online/offline flips.
//!
//! ## Architecture
//!
//! - **Peer store** - durable owner→peers JSON book, single source of truth
//! - **Watcher loop** - 60s sweep: fetch, detect changes, notify, persist
//! - **Digest scheduler** - daily 24h summary at a fixed wall-clock instant
//! - **Command loop** - Telegram long-poll routing register/list/remove
//!
//! The watcher and the digest scheduler run as independent tasks that
//! cooperate only through the shared store.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt};

use peer_watch::commands::run_command_loop;
use peer_watch::config::{Config, DIGEST_HOUR_UTC, DIGEST_MINUTE_UTC, WATCH_INTERVAL_SECS};
use peer_watch::digest::run_digest;
use peer_watch::fetcher::StatusFetcher;
use peer_watch::store::PeerStore;
use peer_watch::telegram::{TelegramTransport, Transport};
use peer_watch::users::UserStore;
use peer_watch::watcher::run_watcher;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with both stdout and file output
    let file_appender = tracing_appender::rolling::never(".", "peer-watch.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("peer_watch=info".parse().unwrap());

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    dotenvy::dotenv().ok();
    let cfg = Config::from_env()?;

    info!("🚀 Peer Tracker Bot");
    info!("   Status API: {}", cfg.api_base);
    info!("   Watch interval: {}s", WATCH_INTERVAL_SECS);
    info!(
        "   Daily digest: {:02}:{:02} UTC",
        DIGEST_HOUR_UTC, DIGEST_MINUTE_UTC
    );
    if cfg.owner_id.is_empty() {
        info!("   Owner commands: disabled (OWNER_ID not set)");
    }

    let store = Arc::new(PeerStore::open(&cfg.peers_path).await);
    // Rewrite the store once at boot so records cleaned or backfilled
    // during load land on disk in normalized form.
    store.save().await;

    let users = Arc::new(UserStore::open(&cfg.users_path).await);
    let fetcher = Arc::new(StatusFetcher::new(&cfg.api_base));
    let transport = Arc::new(TelegramTransport::new(&cfg.telegram_api_base, &cfg.bot_token));

    tokio::spawn(run_watcher(
        store.clone(),
        fetcher.clone(),
        transport.clone() as Arc<dyn Transport>,
    ));
    tokio::spawn(run_digest(
        store.clone(),
        transport.clone() as Arc<dyn Transport>,
    ));

    run_command_loop(transport, store, users, fetcher, cfg.owner_id).await;
    Ok(())
}
