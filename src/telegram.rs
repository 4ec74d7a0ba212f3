//! Telegram Bot API transport: outbound messages and update long-polling.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::MESSAGE_CHAR_LIMIT;
use crate::format::chunk_message;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("transport rejected send: {0}")]
    Rejected(String),
}

/// Delivers one message to one recipient. Sends may fail (blocked
/// recipient, rate limit); callers log and continue, they never abort a
/// sweep or digest run on a failed delivery.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), TransportError>;
}

/// An inbound update from the long-poll cursor.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    #[serde(default)]
    pub text: Option<String>,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<Sender>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Sender {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    result: Option<serde_json::Value>,
}

/// Long-poll wait passed to getUpdates (seconds).
const POLL_TIMEOUT_SECS: u64 = 30;

pub struct TelegramTransport {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramTransport {
    pub fn new(api_base: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                // must outlast the getUpdates long-poll window
                .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 20))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: format!("{}/bot{}", api_base.trim_end_matches('/'), token),
        }
    }

    /// Fetch pending updates past `offset`, blocking server-side for up to
    /// the long-poll window.
    pub async fn poll_updates(&self, offset: i64) -> Result<Vec<Update>, TransportError> {
        let result = self
            .call(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message"],
                }),
            )
            .await?;
        serde_json::from_value(result).map_err(|e| TransportError::Rejected(e.to_string()))
    }

    async fn call(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, TransportError> {
        let url = format!("{}/{}", self.base_url, method);
        let resp = self.http.post(&url).json(&payload).send().await?;
        let body: ApiResponse = resp.json().await?;
        if !body.ok {
            return Err(TransportError::Rejected(
                body.description
                    .unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        Ok(body.result.unwrap_or(serde_json::Value::Null))
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    /// Send one HTML-formatted message, chunked below the single-message
    /// size limit at safe boundaries.
    async fn send_message(&self, recipient: &str, text: &str) -> Result<(), TransportError> {
        for chunk in chunk_message(text, MESSAGE_CHAR_LIMIT) {
            self.call(
                "sendMessage",
                json!({
                    "chat_id": recipient,
                    "text": chunk,
                    "parse_mode": "HTML",
                    "disable_web_page_preview": true,
                }),
            )
            .await?;
        }
        Ok(())
    }
}
