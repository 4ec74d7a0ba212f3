//! Peer change-detection and notification engine.
//!
//! Polls an external status API for user-tracked peers, detects
//! reward/score increases and online/offline flips, and delivers targeted
//! Telegram notifications. A daily digest scheduler aggregates 24-hour
//! deltas per peer and sends one summary per owner.

pub mod commands;
pub mod config;
pub mod detector;
pub mod digest;
pub mod fetcher;
pub mod format;
pub mod store;
pub mod telegram;
pub mod types;
pub mod users;
pub mod watcher;
