//! HTML message rendering and chunking for outbound notifications.

use crate::detector::PeerEvent;
use crate::types::{IdentifierKind, PeerRecord};

/// Shorten long identifiers to `abcdef...uvwxyz` for display.
pub fn short_ident(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= 12 {
        return s.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 6..].iter().collect();
    format!("{head}...{tail}")
}

/// Display label for a tracked peer: cached API name if known, otherwise
/// the registered identifier, shortened either way.
pub fn peer_label(record: &PeerRecord) -> String {
    match &record.display_name {
        Some(name) => short_ident(name),
        None => short_ident(&record.identifier),
    }
}

pub fn online_label(online: bool) -> &'static str {
    if online {
        "🟢 Online"
    } else {
        "🔴 Offline"
    }
}

/// Render one watcher event as a notification message.
pub fn render_event(record: &PeerRecord, event: &PeerEvent) -> String {
    match event {
        PeerEvent::Progress {
            reward,
            score,
            reward_delta,
            score_delta,
        } => {
            let mut msg = format!("✨ <b>Update for {}</b>\n", peer_label(record));
            if let Some(delta) = reward_delta {
                msg.push_str(&format!("💰 Rewards: {} (+{})\n", reward, delta));
            }
            if let Some(delta) = score_delta {
                msg.push_str(&format!("🏆 Wins: {} (+{})\n", score, delta));
            }
            msg
        }
        PeerEvent::StatusChange { online } => {
            format!(
                "🔔 <b>{}</b> is now {}",
                peer_label(record),
                online_label(*online)
            )
        }
    }
}

/// One per-peer breakdown line of a daily digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestLine {
    pub label: String,
    pub reward: i64,
    pub score: i64,
}

/// Render one owner's daily digest: totals first, then the per-peer
/// breakdown. Only strictly positive metrics get a line.
pub fn render_digest(lines: &[DigestLine], total_reward: i64, total_score: i64) -> String {
    let mut msg = String::from("⏰ <b>24-Hour Summary</b>\n\n");
    msg.push_str("📈 <b>Total Earnings</b>\n");
    msg.push_str(&format!("💰 Rewards: +{}\n", total_reward));
    msg.push_str(&format!("🏆 Wins: +{}\n", total_score));
    for line in lines {
        msg.push_str(&format!("\n• <b>{}</b>\n", line.label));
        if line.reward > 0 {
            msg.push_str(&format!("   💰 Rewards: +{}\n", line.reward));
        }
        if line.score > 0 {
            msg.push_str(&format!("   🏆 Wins: +{}\n", line.score));
        }
    }
    msg
}

/// Label used in lists and the owner status view: shortened ID for
/// ID-registered peers, name otherwise.
pub fn ident_label(record: &PeerRecord) -> String {
    match record.kind {
        IdentifierKind::Id => format!("ID: {}", short_ident(&record.identifier)),
        IdentifierKind::Name => format!("Name: {}", peer_label(record)),
    }
}

/// Split a message into chunks of at most `limit` characters, breaking at
/// newlines where possible and at spaces otherwise. A single word longer
/// than the limit is hard-split as a last resort.
pub fn chunk_message(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split('\n') {
        for unit in split_line(line, limit) {
            let unit_len = unit.chars().count();
            let sep = usize::from(!current.is_empty());
            if !current.is_empty() && current_len + sep + unit_len > limit {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push('\n');
                current_len += 1;
            }
            current.push_str(&unit);
            current_len += unit_len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Break an oversized line into space-joined pieces no longer than `limit`.
fn split_line(line: &str, limit: usize) -> Vec<String> {
    if line.chars().count() <= limit {
        return vec![line.to_string()];
    }
    let mut parts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in line.split(' ') {
        for fragment in hard_split(word, limit) {
            let fragment_len = fragment.chars().count();
            let sep = usize::from(!current.is_empty());
            if !current.is_empty() && current_len + sep + fragment_len > limit {
                parts.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push(' ');
                current_len += 1;
            }
            current.push_str(&fragment);
            current_len += fragment_len;
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

fn hard_split(word: &str, limit: usize) -> Vec<String> {
    if word.chars().count() <= limit {
        return vec![word.to_string()];
    }
    word.chars()
        .collect::<Vec<_>>()
        .chunks(limit)
        .map(|c| c.iter().collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_ident_keeps_short_names() {
        assert_eq!(short_ident("alice"), "alice");
        assert_eq!(short_ident("twelve-chars"), "twelve-chars");
    }

    #[test]
    fn short_ident_truncates_long_names() {
        assert_eq!(
            short_ident("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdW"),
            "QmYwAP...gPpHdW"
        );
        assert_eq!(short_ident("abcdefghijklm"), "abcdef...hijklm");
    }

    #[test]
    fn chunk_short_message_is_identity() {
        assert_eq!(chunk_message("hello\nworld", 100), vec!["hello\nworld"]);
    }

    #[test]
    fn chunk_breaks_at_line_boundaries() {
        let text = "aaaa\nbbbb\ncccc";
        let chunks = chunk_message(text, 9);
        assert_eq!(chunks, vec!["aaaa\nbbbb", "cccc"]);
    }

    #[test]
    fn chunk_breaks_oversized_line_at_spaces_not_mid_word() {
        let text = "one two three four";
        let chunks = chunk_message(text, 9);
        assert_eq!(chunks, vec!["one two", "three", "four"]);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 9);
        }
    }

    #[test]
    fn chunk_hard_splits_word_longer_than_limit() {
        let chunks = chunk_message("abcdefghij", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn progress_message_omits_flat_metric() {
        let record = crate::types::PeerRecord {
            identifier: "alice".into(),
            kind: IdentifierKind::Name,
            reward: 150,
            score: 5,
            online: true,
            snapshot_reward: 100,
            snapshot_score: 5,
            window_reward: 0,
            window_score: 0,
            display_name: None,
        };
        let msg = render_event(
            &record,
            &PeerEvent::Progress {
                reward: 150,
                score: 5,
                reward_delta: Some(50),
                score_delta: None,
            },
        );
        assert!(msg.contains("Rewards: 150 (+50)"));
        assert!(!msg.contains("Wins"));
    }

    #[test]
    fn digest_renders_totals_and_positive_lines_only() {
        let lines = vec![
            DigestLine {
                label: "alice".into(),
                reward: 50,
                score: 0,
            },
            DigestLine {
                label: "bob".into(),
                reward: 0,
                score: 3,
            },
        ];
        let msg = render_digest(&lines, 50, 3);
        assert!(msg.contains("Rewards: +50"));
        assert!(msg.contains("Wins: +3"));
        assert!(msg.contains("<b>alice</b>"));
        assert!(!msg.contains("alice</b>\n   🏆"));
    }
}
