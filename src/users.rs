//! Owner-interaction metadata store: first/last seen, command counters.
//!
//! Follows the same durable-JSON discipline as the peer store; a corrupt
//! or missing file never fails the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub first_interaction: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub command_count: u64,
    #[serde(default)]
    pub commands: Vec<String>,
    /// Cleared when a delivery bounces (user blocked the bot).
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

pub struct UserStore {
    path: PathBuf,
    users: Mutex<HashMap<String, UserRecord>>,
}

impl UserStore {
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let users = load_users(&path).await;
        info!(
            "[USERS] loaded {} user(s) from {}",
            users.len(),
            path.display()
        );
        Self {
            path,
            users: Mutex::new(users),
        }
    }

    /// Record one command interaction, creating the user on first contact.
    pub async fn record_interaction(
        &self,
        chat_id: &str,
        username: Option<&str>,
        first_name: Option<&str>,
        last_name: Option<&str>,
        command: &str,
    ) {
        let now = Utc::now();
        let mut users = self.users.lock().await;
        let entry = users
            .entry(chat_id.to_string())
            .or_insert_with(|| UserRecord {
                first_interaction: now,
                last_interaction: now,
                username: None,
                first_name: None,
                last_name: None,
                command_count: 0,
                commands: Vec::new(),
                active: true,
            });
        entry.last_interaction = now;
        entry.username = username.map(str::to_string).or(entry.username.take());
        entry.first_name = first_name.map(str::to_string).or(entry.first_name.take());
        entry.last_name = last_name.map(str::to_string).or(entry.last_name.take());
        entry.command_count += 1;
        entry.commands.push(command.to_string());
        entry.active = true;
        self.persist(&users).await;
    }

    /// Mark a user inactive after a bounced delivery.
    pub async fn mark_inactive(&self, chat_id: &str) {
        let mut users = self.users.lock().await;
        if let Some(user) = users.get_mut(chat_id) {
            user.active = false;
            self.persist(&users).await;
        }
    }

    pub async fn all(&self) -> HashMap<String, UserRecord> {
        self.users.lock().await.clone()
    }

    async fn persist(&self, users: &HashMap<String, UserRecord>) {
        let data = match serde_json::to_string_pretty(users) {
            Ok(d) => d,
            Err(e) => {
                error!("[USERS] serialize failed: {}", e);
                return;
            }
        };
        let tmp = self.path.with_extension("tmp");
        let result = async {
            tokio::fs::write(&tmp, data).await?;
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;
        if let Err(e) = result {
            error!(
                "[USERS] persist to {} failed: {} (keeping in-memory state)",
                self.path.display(),
                e
            );
        }
    }
}

async fn load_users(path: &Path) -> HashMap<String, UserRecord> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(s) => s,
        Err(_) => return HashMap::new(),
    };
    match serde_json::from_str(&raw) {
        Ok(users) => users,
        Err(e) => {
            warn!("[USERS] corrupt user file {}: {}", path.display(), e);
            HashMap::new()
        }
    }
}

/// Aggregate activity metrics for the owner `/userstats` view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserStats {
    pub total: usize,
    pub active_today: usize,
    pub active_week: usize,
    /// Top commands by usage, most popular first (max 5).
    pub top_commands: Vec<(String, u64)>,
}

pub fn compute_stats(users: &HashMap<String, UserRecord>, now: DateTime<Utc>) -> UserStats {
    let mut active_today = 0;
    let mut active_week = 0;
    let mut counts: HashMap<&str, u64> = HashMap::new();

    for user in users.values() {
        let days_ago = (now - user.last_interaction).num_days();
        if days_ago == 0 {
            active_today += 1;
        }
        if days_ago <= 7 {
            active_week += 1;
        }
        for cmd in &user.commands {
            *counts.entry(cmd.as_str()).or_default() += 1;
        }
    }

    let mut top: Vec<(String, u64)> = counts
        .into_iter()
        .map(|(cmd, n)| (cmd.to_string(), n))
        .collect();
    top.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    top.truncate(5);

    UserStats {
        total: users.len(),
        active_today,
        active_week,
        top_commands: top,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn user(last_days_ago: i64, commands: &[&str], now: DateTime<Utc>) -> UserRecord {
        UserRecord {
            first_interaction: now - Duration::days(30),
            last_interaction: now - Duration::days(last_days_ago),
            username: None,
            first_name: None,
            last_name: None,
            command_count: commands.len() as u64,
            commands: commands.iter().map(|c| c.to_string()).collect(),
            active: true,
        }
    }

    #[test]
    fn stats_bucket_users_by_recency() {
        let now = Utc::now();
        let mut users = HashMap::new();
        users.insert("1".into(), user(0, &["/list", "/list"], now));
        users.insert("2".into(), user(3, &["/help"], now));
        users.insert("3".into(), user(20, &["/list"], now));

        let stats = compute_stats(&users, now);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.active_today, 1);
        assert_eq!(stats.active_week, 2);
        assert_eq!(stats.top_commands[0], ("/list".to_string(), 3));
    }
}
