//! Core data types: tracked peer records and the owner→peers book.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::fetcher::PeerSnapshot;

/// How a tracked peer is addressed when querying the status API.
///
/// Persisted as a bool under the `id` key (`true` = query by peer ID,
/// `false` = query by name) to stay compatible with existing store files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "bool", into = "bool")]
pub enum IdentifierKind {
    Name,
    Id,
}

impl From<bool> for IdentifierKind {
    fn from(is_id: bool) -> Self {
        if is_id {
            IdentifierKind::Id
        } else {
            IdentifierKind::Name
        }
    }
}

impl From<IdentifierKind> for bool {
    fn from(kind: IdentifierKind) -> bool {
        matches!(kind, IdentifierKind::Id)
    }
}

/// One tracked peer belonging to an owner.
///
/// `reward`/`score`/`online` always hold the latest successfully fetched
/// values; `snapshot_*` hold the baseline at the start of the current 24h
/// accounting window and are reset by the digest scheduler. Serialized
/// field names match the legacy persisted form so existing store files
/// load unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerRecord {
    #[serde(rename = "value")]
    pub identifier: String,
    #[serde(rename = "id")]
    pub kind: IdentifierKind,
    #[serde(rename = "last_reward", default)]
    pub reward: i64,
    #[serde(rename = "win_count", default)]
    pub score: i64,
    #[serde(default)]
    pub online: bool,
    #[serde(rename = "last_snapshot_reward", default)]
    pub snapshot_reward: i64,
    #[serde(rename = "last_snapshot_win", default)]
    pub snapshot_score: i64,
    /// Window deltas computed at the last digest run, kept for the owner
    /// `/status` view.
    #[serde(rename = "last_24h_reward", default)]
    pub window_reward: i64,
    #[serde(rename = "last_24h_wins", default)]
    pub window_score: i64,
    /// Display name reported by the API, cached for message formatting.
    #[serde(rename = "peer_name", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl PeerRecord {
    /// Build a fresh record from a validated registration fetch. The 24h
    /// window starts at the current values, so the first digest reports
    /// only activity after registration.
    pub fn registered(identifier: &str, kind: IdentifierKind, snapshot: &PeerSnapshot) -> Self {
        Self {
            identifier: identifier.to_string(),
            kind,
            reward: snapshot.reward,
            score: snapshot.score,
            online: snapshot.online,
            snapshot_reward: snapshot.reward,
            snapshot_score: snapshot.score,
            window_reward: 0,
            window_score: 0,
            display_name: Some(snapshot.peer_name.clone()),
        }
    }

    /// Validate one raw persisted record, backfilling optional fields.
    ///
    /// Returns `None` when a required field (`value`, `id`) is missing or
    /// mistyped; the store drops such records individually instead of
    /// failing the whole load. Missing snapshot fields default to the
    /// current values rather than zero so a legacy record does not report
    /// its entire lifetime as one 24h window.
    pub fn from_value(raw: &serde_json::Value) -> Option<Self> {
        let identifier = raw.get("value")?.as_str()?.to_string();
        let kind = IdentifierKind::from(raw.get("id")?.as_bool()?);
        let reward = raw.get("last_reward").and_then(|v| v.as_i64()).unwrap_or(0);
        let score = raw.get("win_count").and_then(|v| v.as_i64()).unwrap_or(0);
        Some(Self {
            identifier,
            kind,
            reward,
            score,
            online: raw.get("online").and_then(|v| v.as_bool()).unwrap_or(false),
            snapshot_reward: raw
                .get("last_snapshot_reward")
                .and_then(|v| v.as_i64())
                .unwrap_or(reward),
            snapshot_score: raw
                .get("last_snapshot_win")
                .and_then(|v| v.as_i64())
                .unwrap_or(score),
            window_reward: raw
                .get("last_24h_reward")
                .and_then(|v| v.as_i64())
                .unwrap_or(0),
            window_score: raw
                .get("last_24h_wins")
                .and_then(|v| v.as_i64())
                .unwrap_or(0),
            display_name: raw
                .get("peer_name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }
}

/// Owner chat ID → tracked peers, in registration order.
pub type PeerBook = HashMap<String, Vec<PeerRecord>>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_backfills_missing_fields() {
        let raw = json!({ "value": "alice", "id": false, "last_reward": 120 });
        let rec = PeerRecord::from_value(&raw).expect("valid record");
        assert_eq!(rec.identifier, "alice");
        assert_eq!(rec.kind, IdentifierKind::Name);
        assert_eq!(rec.reward, 120);
        // snapshot defaults to the current value, not zero
        assert_eq!(rec.snapshot_reward, 120);
        assert_eq!(rec.snapshot_score, 0);
        assert!(!rec.online);
    }

    #[test]
    fn from_value_rejects_missing_required_fields() {
        assert!(PeerRecord::from_value(&json!({ "id": true })).is_none());
        assert!(PeerRecord::from_value(&json!({ "value": "x" })).is_none());
        // mistyped `id` is a structural failure, not a default
        assert!(PeerRecord::from_value(&json!({ "value": "x", "id": "yes" })).is_none());
    }

    #[test]
    fn kind_round_trips_as_bool() {
        let rec = PeerRecord::from_value(&json!({ "value": "p", "id": true })).unwrap();
        let out = serde_json::to_value(&rec).unwrap();
        assert_eq!(out["id"], json!(true));
        assert_eq!(out["value"], json!("p"));
    }
}
