//! Runtime configuration: tunable constants plus environment overrides.

use anyhow::Context;

/// Default peer status API endpoint
pub const STATUS_API_BASE: &str = "https://dashboard-math.gensyn.ai/api/v1/peer";

/// Telegram Bot API host
pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Default path of the persisted owner→peers store
pub const PEERS_FILE: &str = "peers.json";

/// Default path of the persisted owner metadata store
pub const USERS_FILE: &str = "users.json";

/// Seconds between the end of one watcher sweep and the start of the next
pub const WATCH_INTERVAL_SECS: u64 = 60;

/// Minimum spacing between consecutive watcher notifications (ms)
pub const SEND_SPACING_MS: u64 = 300;

/// Spacing between digest/broadcast sends, which fan out to many
/// recipients in one burst (ms)
pub const BULK_SEND_SPACING_MS: u64 = 500;

/// Status API request timeout (seconds) - bounds per-peer stall so the
/// watcher always makes forward progress
pub const FETCH_TIMEOUT_SECS: u64 = 10;

/// Daily digest trigger: 12:00 IST = 06:30 UTC
pub const DIGEST_HOUR_UTC: u32 = 6;
pub const DIGEST_MINUTE_UTC: u32 = 30;

/// Max characters per outbound message; longer texts are chunked at a
/// safe boundary (Telegram hard limit is 4096)
pub const MESSAGE_CHAR_LIMIT: usize = 4000;

/// Runtime configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token (`BOT_TOKEN`)
    pub bot_token: String,
    /// Chat ID allowed to run owner commands (`OWNER_ID`, optional)
    pub owner_id: String,
    /// Peer status API base URL (`STATUS_API_URL`)
    pub api_base: String,
    /// Telegram API host override (`TELEGRAM_API_URL`)
    pub telegram_api_base: String,
    /// Peers store path (`PEERS_FILE`)
    pub peers_path: String,
    /// Users store path (`USERS_FILE`)
    pub users_path: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            bot_token: std::env::var("BOT_TOKEN").context("BOT_TOKEN not set")?,
            owner_id: std::env::var("OWNER_ID").unwrap_or_default(),
            api_base: std::env::var("STATUS_API_URL")
                .unwrap_or_else(|_| STATUS_API_BASE.to_string()),
            telegram_api_base: std::env::var("TELEGRAM_API_URL")
                .unwrap_or_else(|_| TELEGRAM_API_BASE.to_string()),
            peers_path: std::env::var("PEERS_FILE").unwrap_or_else(|_| PEERS_FILE.to_string()),
            users_path: std::env::var("USERS_FILE").unwrap_or_else(|_| USERS_FILE.to_string()),
        })
    }
}
