//! Daily digest scheduler: fixed wall-clock trigger, 24h delta windows.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as TimeDelta, NaiveTime, Utc};
use tracing::{info, warn};

use crate::config::{BULK_SEND_SPACING_MS, DIGEST_HOUR_UTC, DIGEST_MINUTE_UTC};
use crate::format::{peer_label, render_digest, DigestLine};
use crate::store::PeerStore;
use crate::telegram::Transport;
use crate::types::PeerBook;

/// Compute the next trigger instant strictly after `now`: today's
/// configured time-of-day, or the same instant tomorrow if already past.
pub fn next_trigger(now: DateTime<Utc>) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(DIGEST_HOUR_UTC, DIGEST_MINUTE_UTC, 0)
        .expect("valid digest time of day");
    let today = now.date_naive().and_time(time).and_utc();
    if now < today {
        today
    } else {
        today + TimeDelta::days(1)
    }
}

/// Run the digest scheduler forever: sleep until the next trigger, roll
/// every owner's 24h window, persist once, then deliver the summaries.
///
/// The window reset is unconditional and happens before delivery: a failed
/// send never holds a window open, trading guaranteed delivery for
/// consistent rolling windows.
pub async fn run_digest(store: Arc<PeerStore>, transport: Arc<dyn Transport>) {
    info!(
        "[DIGEST] daily summary scheduler started (trigger {:02}:{:02} UTC)",
        DIGEST_HOUR_UTC, DIGEST_MINUTE_UTC
    );
    loop {
        let now = Utc::now();
        let trigger = next_trigger(now);
        let wait = (trigger - now).to_std().unwrap_or_default();
        info!("[DIGEST] next digest at {} (in {}s)", trigger, wait.as_secs());
        tokio::time::sleep(wait).await;

        let outbound = store.update(roll_windows).await;
        store.save().await;

        for (owner, message) in outbound {
            if let Err(e) = transport.send_message(&owner, &message).await {
                warn!("[DIGEST] delivery to {} failed: {}", owner, e);
            }
            tokio::time::sleep(Duration::from_millis(BULK_SEND_SPACING_MS)).await;
        }
    }
}

/// Roll every peer's 24h window: compute the deltas since the last
/// snapshot, reset the snapshots to the current values, and record the
/// window on the peer. Returns one rendered digest per owner that had at
/// least one peer with activity; owners without activity get no message.
///
/// A peer is included in the breakdown iff at least one window delta is
/// strictly positive; both deltas of an included peer are summed into the
/// totals, so a decreased metric (upstream anomaly) can pull a total down.
pub fn roll_windows(book: &mut PeerBook) -> Vec<(String, String)> {
    let mut owners: Vec<String> = book.keys().cloned().collect();
    owners.sort();

    let mut outbound = Vec::new();
    for owner in owners {
        let Some(list) = book.get_mut(&owner) else {
            continue;
        };
        let mut lines = Vec::new();
        let mut total_reward = 0i64;
        let mut total_score = 0i64;

        for record in list.iter_mut() {
            let window_reward = record.reward - record.snapshot_reward;
            let window_score = record.score - record.snapshot_score;

            // The window always resets on schedule, reported or not.
            record.snapshot_reward = record.reward;
            record.snapshot_score = record.score;
            record.window_reward = window_reward;
            record.window_score = window_score;

            if window_reward > 0 || window_score > 0 {
                total_reward += window_reward;
                total_score += window_score;
                lines.push(DigestLine {
                    label: peer_label(record),
                    reward: window_reward,
                    score: window_score,
                });
            }
        }

        if !lines.is_empty() {
            outbound.push((owner.clone(), render_digest(&lines, total_reward, total_score)));
        }
    }
    outbound
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn trigger_later_today_when_before_cutoff() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 4, 0, 0).unwrap();
        let trigger = next_trigger(now);
        assert_eq!(trigger, Utc.with_ymd_and_hms(2025, 6, 10, 6, 30, 0).unwrap());
    }

    #[test]
    fn trigger_tomorrow_when_past_cutoff() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 7, 0, 0).unwrap();
        let trigger = next_trigger(now);
        assert_eq!(trigger, Utc.with_ymd_and_hms(2025, 6, 11, 6, 30, 0).unwrap());
    }

    #[test]
    fn trigger_exactly_at_cutoff_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 6, 30, 0).unwrap();
        let trigger = next_trigger(now);
        assert_eq!(trigger, Utc.with_ymd_and_hms(2025, 6, 11, 6, 30, 0).unwrap());
    }
}
