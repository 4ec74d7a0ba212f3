//! Pure change detection between a stored record and a fresh snapshot.

use crate::fetcher::PeerSnapshot;
use crate::types::PeerRecord;

/// A notification-worthy transition observed during one sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// Reward and/or score increased since the last stored values. A delta
    /// is present only when strictly positive; a flat or decreased metric
    /// is omitted from the message even if the other one increased.
    Progress {
        reward: i64,
        score: i64,
        reward_delta: Option<i64>,
        score_delta: Option<i64>,
    },
    /// Online state flipped.
    StatusChange { online: bool },
}

/// Compare a stored record against a freshly fetched snapshot.
///
/// Always returns the record updated to the snapshot values, whether or
/// not an event fired: stored state reflects the latest fetch. Callers
/// must not invoke this for an unavailable fetch; skipping the peer keeps
/// a transient lookup failure from being misreported as a reward loss or
/// an offline transition.
pub fn detect(old: &PeerRecord, snapshot: &PeerSnapshot) -> (PeerRecord, Vec<PeerEvent>) {
    let reward_delta = snapshot.reward - old.reward;
    let score_delta = snapshot.score - old.score;

    let mut events = Vec::new();
    if reward_delta > 0 || score_delta > 0 {
        events.push(PeerEvent::Progress {
            reward: snapshot.reward,
            score: snapshot.score,
            reward_delta: (reward_delta > 0).then_some(reward_delta),
            score_delta: (score_delta > 0).then_some(score_delta),
        });
    }
    if snapshot.online != old.online {
        events.push(PeerEvent::StatusChange {
            online: snapshot.online,
        });
    }

    let mut updated = old.clone();
    updated.reward = snapshot.reward;
    updated.score = snapshot.score;
    updated.online = snapshot.online;
    updated.display_name = Some(snapshot.peer_name.clone());
    (updated, events)
}
