//! Status API adapter: resolves one peer identifier to a live snapshot.

use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::config::FETCH_TIMEOUT_SECS;
use crate::types::IdentifierKind;

/// Normalized view of one peer as reported by the status API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSnapshot {
    pub peer_id: String,
    pub peer_name: String,
    pub reward: i64,
    pub score: i64,
    pub online: bool,
}

/// Raw status API payload. Optional fields default to 0/false; a missing
/// `peerId` means the identifier is unresolved upstream.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(rename = "peerId", default)]
    peer_id: Option<String>,
    #[serde(rename = "peerName", default)]
    peer_name: Option<String>,
    #[serde(default)]
    reward: i64,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    online: bool,
}

impl StatusResponse {
    fn normalize(self) -> Option<PeerSnapshot> {
        Some(PeerSnapshot {
            peer_id: self.peer_id?,
            peer_name: self.peer_name.unwrap_or_else(|| "Unknown".to_string()),
            reward: self.reward,
            score: self.score,
            online: self.online,
        })
    }
}

/// Stateless client for the peer status API.
pub struct StatusFetcher {
    http: reqwest::Client,
    base_url: String,
}

impl StatusFetcher {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the current snapshot for one identifier.
    ///
    /// Returns `None` when the peer is unresolved upstream or the request
    /// fails for any reason (timeout, non-200, bad payload). Callers treat
    /// that as "unavailable" and skip the peer this cycle; this function
    /// never errors out to the caller.
    pub async fn fetch(&self, identifier: &str, kind: IdentifierKind) -> Option<PeerSnapshot> {
        let param = match kind {
            IdentifierKind::Name => "name",
            IdentifierKind::Id => "id",
        };
        let url = format!("{}?{}={}", self.base_url, param, identifier);

        let resp = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("[FETCH] request for {} failed: {}", identifier, e);
                return None;
            }
        };
        if !resp.status().is_success() {
            warn!("[FETCH] status {} for {}", resp.status(), identifier);
            return None;
        }
        let body: StatusResponse = match resp.json().await {
            Ok(b) => b,
            Err(e) => {
                warn!("[FETCH] bad payload for {}: {}", identifier, e);
                return None;
            }
        };
        body.normalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Option<PeerSnapshot> {
        serde_json::from_str::<StatusResponse>(raw)
            .ok()
            .and_then(StatusResponse::normalize)
    }

    #[test]
    fn missing_optionals_default_to_zero_and_offline() {
        let snap = parse(r#"{"peerId":"Qm123"}"#).expect("resolved");
        assert_eq!(snap.reward, 0);
        assert_eq!(snap.score, 0);
        assert!(!snap.online);
        assert_eq!(snap.peer_name, "Unknown");
    }

    #[test]
    fn missing_peer_id_means_unresolved() {
        assert!(parse(r#"{"reward":10,"score":2,"online":true}"#).is_none());
    }

    #[test]
    fn full_payload_normalizes() {
        let snap = parse(
            r#"{"peerId":"Qm123","peerName":"alice","reward":150,"score":5,"online":true}"#,
        )
        .expect("resolved");
        assert_eq!(snap.peer_name, "alice");
        assert_eq!(snap.reward, 150);
        assert_eq!(snap.score, 5);
        assert!(snap.online);
    }
}
