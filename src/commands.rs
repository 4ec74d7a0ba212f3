//! Command surface: each command maps to a Peer Store operation plus, for
//! registration, one fetch to validate the identifier before storing.
//!
//! The dispatch loop at the bottom is thin sequential glue around the
//! Telegram long-poll cursor; every invariant lives in the store and the
//! background tasks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::config::BULK_SEND_SPACING_MS;
use crate::fetcher::StatusFetcher;
use crate::format::{ident_label, online_label, peer_label, short_ident};
use crate::store::{PeerStore, StoreError};
use crate::telegram::{TelegramTransport, Transport};
use crate::types::{IdentifierKind, PeerRecord};
use crate::users::{compute_stats, UserRecord, UserStore};

pub fn help_text() -> String {
    "👾 <b>Welcome to Peer Tracker Bot</b>!\n\n\
     Track your peers with these commands:\n\n\
     ➕ <b>/add_peer_name</b> <i>name1,name2,...</i>\n\
     🆔 <b>/add_peer_id</b> <i>id1,id2,...</i>\n\
     📜 <b>/list</b> - View tracked peers\n\
     🗑️ <b>/remove</b> <i>index</i> - Remove a peer\n\n\
     🔔 Automatic updates for:\n\
     - Reward/wins increases\n\
     - Online/offline status changes\n\n\
     ⏰ Daily summary at 12 PM IST"
        .to_string()
}

/// Register a comma-separated list of identifiers for `owner`. Each value
/// is validated with one fetch before it is stored; duplicates and
/// unresolved identifiers are reported per value, the rest proceed.
pub async fn register_peers(
    store: &PeerStore,
    fetcher: &StatusFetcher,
    owner: &str,
    raw: &str,
    kind: IdentifierKind,
) -> String {
    let values: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        return match kind {
            IdentifierKind::Name => "❗ Usage: /add_peer_name peer1,peer2,...".to_string(),
            IdentifierKind::Id => "❗ Usage: /add_peer_id id1,id2,...".to_string(),
        };
    }

    let mut added = 0;
    let mut duplicates = 0;
    let mut sections = Vec::new();

    for value in values {
        // Cheap duplicate check before spending a fetch; `add` re-checks
        // under the lock either way.
        if store.contains(owner, value, kind).await {
            duplicates += 1;
            sections.push(format!("⚠️ {} already tracked", value));
            continue;
        }
        let Some(data) = fetcher.fetch(value, kind).await else {
            sections.push(format!("❌ {} not found", value));
            continue;
        };
        match store.add(owner, PeerRecord::registered(value, kind, &data)).await {
            Ok(()) => {
                added += 1;
                let mut section = match kind {
                    IdentifierKind::Name => format!("✅ <b>{}</b>\n", short_ident(&data.peer_name)),
                    IdentifierKind::Id => format!(
                        "✅ <b>{}</b> (ID: {})\n",
                        short_ident(&data.peer_name),
                        short_ident(value)
                    ),
                };
                section.push_str(&format!("💰 Reward: {}\n", data.reward));
                section.push_str(&format!("🏆 Wins: {}\n", data.score));
                section.push_str(&format!("🔵 Status: {}", online_label(data.online)));
                sections.push(section);
            }
            Err(_) => {
                duplicates += 1;
                sections.push(format!("⚠️ {} already tracked", value));
            }
        }
    }

    let mut header = format!("Added {} peer(s)", added);
    if duplicates > 0 {
        header.push_str(&format!(", {} duplicate(s)", duplicates));
    }
    format!("<b>{}</b>\n\n{}", header, sections.join("\n\n"))
}

/// List one owner's peers with a live refresh: every peer is re-fetched,
/// stored values updated, and the summary rendered from the fresh state.
/// Unavailable peers keep their last stored values.
pub async fn list_peers(store: &PeerStore, fetcher: &StatusFetcher, owner: &str) -> String {
    let records = store.owner_peers(owner).await;
    if records.is_empty() {
        return "😕 No peers added".to_string();
    }

    let mut snapshots = Vec::with_capacity(records.len());
    for record in &records {
        snapshots.push(fetcher.fetch(&record.identifier, record.kind).await);
    }

    let refreshed = store
        .update(|book| {
            let Some(list) = book.get_mut(owner) else {
                return Vec::new();
            };
            for record in list.iter_mut() {
                let fetched = records
                    .iter()
                    .position(|r| r.identifier == record.identifier && r.kind == record.kind)
                    .and_then(|i| snapshots[i].as_ref());
                if let Some(snap) = fetched {
                    record.reward = snap.reward;
                    record.score = snap.score;
                    record.online = snap.online;
                    record.display_name = Some(snap.peer_name.clone());
                }
            }
            list.clone()
        })
        .await;
    store.save().await;

    let total_reward: i64 = refreshed.iter().map(|r| r.reward).sum();
    let total_score: i64 = refreshed.iter().map(|r| r.score).sum();
    let online_count = refreshed.iter().filter(|r| r.online).count();

    let mut entries = Vec::new();
    for (i, record) in refreshed.iter().enumerate() {
        let dot = if record.online { "🟢" } else { "🔴" };
        entries.push(format!(
            "{}. {} <b>{}</b>\n   💰 Reward: {}\n   🏆 Wins: {}",
            i + 1,
            dot,
            ident_label(record),
            record.reward,
            record.score
        ));
    }

    format!(
        "📋 <b>Your Peers ({})</b>\n🟢 Online: {} | 🔴 Offline: {}\n💰 Total Rewards: {}\n🏆 Total Wins: {}\n\n{}",
        refreshed.len(),
        online_count,
        refreshed.len() - online_count,
        total_reward,
        total_score,
        entries.join("\n\n")
    )
}

/// Remove one peer by 1-based display index.
pub async fn remove_peer(store: &PeerStore, owner: &str, args: &str) -> String {
    let Ok(index) = args.trim().parse::<usize>() else {
        return "❗ Usage: /remove <number>".to_string();
    };
    match store.remove(owner, index).await {
        Ok(removed) => format!("🗑️ Removed: <b>{}</b>", peer_label(&removed)),
        Err(StoreError::OutOfRange) => "❗ Invalid index".to_string(),
        Err(e) => format!("❗ {}", e),
    }
}

/// Owner view: every tracked peer across all owners, with grand totals.
pub async fn all_status(store: &PeerStore) -> String {
    let book = store.book().await;
    let mut owners: Vec<&String> = book.keys().collect();
    owners.sort();

    let mut total_reward = 0i64;
    let mut total_score = 0i64;
    let mut body = Vec::new();

    for owner in owners {
        for record in &book[owner] {
            let dot = if record.online { "🟢" } else { "🔴" };
            body.push(format!(
                "\n👤 {}\n{} <b>{}</b>\n💰 Reward: {}\n🏆 Wins: {}",
                owner,
                dot,
                ident_label(record),
                record.reward,
                record.score
            ));
            total_reward += record.reward;
            total_score += record.score;
        }
    }

    format!(
        "👑 <b>All Tracked Peers</b>\n💰 Total Rewards: {}\n🏆 Total Wins: {}\n{}",
        total_reward,
        total_score,
        body.join("\n")
    )
}

/// Owner view: per-user interaction report.
pub fn users_report(users: &HashMap<String, UserRecord>) -> String {
    let now = Utc::now();
    let mut chat_ids: Vec<&String> = users.keys().collect();
    chat_ids.sort();

    let mut body = vec![
        "👑 <b>User Statistics</b>".to_string(),
        format!("👥 Total Users: {}", users.len()),
        String::new(),
        "<b>User List:</b>".to_string(),
    ];
    for chat_id in chat_ids {
        let user = &users[chat_id];
        let name = [user.first_name.as_deref(), user.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let username = user
            .username
            .as_deref()
            .map(|u| format!("@{}", u))
            .unwrap_or_default();
        let mut display = format!("{} {}", name, username).trim().to_string();
        if display.is_empty() {
            display = format!("User {}", chat_id);
        }
        let days_ago = (now - user.last_interaction).num_days();
        body.push(format!(
            "\n👤 <b>{}</b>\n🆔: {}\n📅 First seen: {}\n⏱️ Last seen: {} day(s) ago\n🔢 Commands used: {}\n📝 Last command: {}",
            display,
            chat_id,
            user.first_interaction.format("%Y-%m-%d"),
            days_ago,
            user.command_count,
            user.commands.last().map(String::as_str).unwrap_or("-")
        ));
    }
    body.join("\n")
}

/// Owner view: aggregate activity metrics.
pub fn user_stats(users: &HashMap<String, UserRecord>) -> String {
    let stats = compute_stats(users, Utc::now());
    let commands = stats
        .top_commands
        .iter()
        .map(|(cmd, n)| format!("• {}: {}", cmd, n))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "📊 <b>User Statistics</b>\n👥 Total Users: {}\n🟢 Active Today: {}\n🟡 Active This Week: {}\n🔴 Inactive (>7 days): {}\n\n📈 <b>Top Commands:</b>\n{}",
        stats.total,
        stats.active_today,
        stats.active_week,
        stats.total - stats.active_week,
        commands
    )
}

/// Broadcast a message to every known user, throttled. A bounced delivery
/// marks the user inactive and is counted, never fatal.
pub async fn broadcast(users: &UserStore, transport: &dyn Transport, text: &str) -> String {
    if text.trim().is_empty() {
        return "❗ Usage: /post <message>".to_string();
    }
    let all = users.all().await;
    let mut successful = 0;
    let mut failed = 0;

    for chat_id in all.keys() {
        let message = format!("📢 <b>Announcement from Bot Owner</b>\n\n{}", text);
        match transport.send_message(chat_id, &message).await {
            Ok(()) => successful += 1,
            Err(e) => {
                warn!("[BROADCAST] delivery to {} failed: {}", chat_id, e);
                users.mark_inactive(chat_id).await;
                failed += 1;
            }
        }
        tokio::time::sleep(Duration::from_millis(BULK_SEND_SPACING_MS)).await;
    }

    format!(
        "📊 <b>Broadcast Report</b>\n✅ Successful: {}\n❌ Failed: {}\n👤 Total Attempted: {}\n\nNote: Failed deliveries may indicate users who blocked the bot.",
        successful,
        failed,
        all.len()
    )
}

/// Split `/command args` and strip a trailing `@botname` mention.
fn split_command(text: &str) -> (&str, &str) {
    let mut parts = text.splitn(2, char::is_whitespace);
    let command = parts.next().unwrap_or("");
    let args = parts.next().unwrap_or("").trim();
    let command = command.split('@').next().unwrap_or(command);
    (command, args)
}

/// Long-poll Telegram for commands and route them. Runs forever; a failed
/// poll backs off and retries, a failed reply is logged and dropped.
pub async fn run_command_loop(
    transport: Arc<TelegramTransport>,
    store: Arc<PeerStore>,
    users: Arc<UserStore>,
    fetcher: Arc<StatusFetcher>,
    owner_id: String,
) {
    info!("[CMD] command loop started");
    let mut offset = 0i64;
    loop {
        let updates = match transport.poll_updates(offset).await {
            Ok(u) => u,
            Err(e) => {
                warn!("[CMD] getUpdates failed: {}", e);
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(msg) = update.message else { continue };
            let Some(text) = msg.text.as_deref() else { continue };
            if !text.starts_with('/') {
                continue;
            }
            let (command, args) = split_command(text);
            let chat_id = msg.chat.id.to_string();
            let from_owner = !owner_id.is_empty()
                && msg.from.as_ref().map(|u| u.id.to_string()).as_deref()
                    == Some(owner_id.as_str());

            // User commands count toward interaction stats; owner-only
            // commands do not.
            if matches!(
                command,
                "/start" | "/help" | "/add_peer_name" | "/add_peer_id" | "/list" | "/remove"
            ) {
                users
                    .record_interaction(
                        &chat_id,
                        msg.chat.username.as_deref(),
                        msg.chat.first_name.as_deref(),
                        msg.chat.last_name.as_deref(),
                        command,
                    )
                    .await;
            }

            let reply = match command {
                "/start" | "/help" => help_text(),
                "/add_peer_name" => {
                    register_peers(&store, &fetcher, &chat_id, args, IdentifierKind::Name).await
                }
                "/add_peer_id" => {
                    register_peers(&store, &fetcher, &chat_id, args, IdentifierKind::Id).await
                }
                "/list" => list_peers(&store, &fetcher, &chat_id).await,
                "/remove" => remove_peer(&store, &chat_id, args).await,
                "/users" if from_owner => users_report(&users.all().await),
                "/userstats" if from_owner => user_stats(&users.all().await),
                "/status" if from_owner => all_status(&store).await,
                "/post" if from_owner => broadcast(&users, transport.as_ref(), args).await,
                _ => continue,
            };

            if let Err(e) = transport.send_message(&chat_id, &reply).await {
                warn!("[CMD] reply to {} failed: {}", chat_id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_command_strips_bot_mention_and_trims_args() {
        assert_eq!(split_command("/list"), ("/list", ""));
        assert_eq!(split_command("/remove 3"), ("/remove", "3"));
        assert_eq!(
            split_command("/add_peer_name@peerbot a, b"),
            ("/add_peer_name", "a, b")
        );
    }
}
