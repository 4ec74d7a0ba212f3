//! Durable owner→peers store with a load-mutate-save discipline.
//!
//! Single source of truth for the watcher, the digest scheduler, and the
//! command handlers. All mutation happens under one internal lock so a
//! digest reset can never race a watcher update and silently drop a delta.
//! Persistence failures are logged, never raised: the process keeps
//! operating on in-memory state in degraded-durability mode.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::types::{IdentifierKind, PeerBook, PeerRecord};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("peer is already tracked")]
    Duplicate,
    #[error("index out of range")]
    OutOfRange,
}

pub struct PeerStore {
    path: PathBuf,
    book: Mutex<PeerBook>,
}

impl PeerStore {
    /// Load the store from disk. A missing or corrupt file yields an empty
    /// book; individually malformed records are dropped while valid
    /// siblings are kept.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let book = load_book(&path).await;
        info!(
            "[STORE] loaded {} owner(s) from {}",
            book.len(),
            path.display()
        );
        Self {
            path,
            book: Mutex::new(book),
        }
    }

    /// Register a peer for an owner. Rejects a second `(identifier, kind)`
    /// registration for the same owner; persists on success.
    pub async fn add(&self, owner: &str, record: PeerRecord) -> Result<(), StoreError> {
        let mut book = self.book.lock().await;
        let list = book.entry(owner.to_string()).or_default();
        if list
            .iter()
            .any(|p| p.identifier == record.identifier && p.kind == record.kind)
        {
            return Err(StoreError::Duplicate);
        }
        list.push(record);
        self.persist(&book).await;
        Ok(())
    }

    /// Remove the peer at 1-based `index`, returning the removed record.
    pub async fn remove(&self, owner: &str, index: usize) -> Result<PeerRecord, StoreError> {
        let mut book = self.book.lock().await;
        let list = book.get_mut(owner).ok_or(StoreError::OutOfRange)?;
        if index == 0 || index > list.len() {
            return Err(StoreError::OutOfRange);
        }
        let removed = list.remove(index - 1);
        if list.is_empty() {
            book.remove(owner);
        }
        self.persist(&book).await;
        Ok(removed)
    }

    /// Whether `(identifier, kind)` is already tracked by `owner`.
    pub async fn contains(&self, owner: &str, identifier: &str, kind: IdentifierKind) -> bool {
        let book = self.book.lock().await;
        book.get(owner)
            .map(|list| {
                list.iter()
                    .any(|p| p.identifier == identifier && p.kind == kind)
            })
            .unwrap_or(false)
    }

    /// Clone of one owner's peer list (empty if none).
    pub async fn owner_peers(&self, owner: &str) -> Vec<PeerRecord> {
        let book = self.book.lock().await;
        book.get(owner).cloned().unwrap_or_default()
    }

    /// Clone of the full book, for read-only sweeps.
    pub async fn book(&self) -> PeerBook {
        self.book.lock().await.clone()
    }

    /// Run a mutation against the live book under the store lock.
    ///
    /// Does NOT persist: background tasks complete their full cycle
    /// (mutate, notify) and then call [`save`](Self::save) once, bounding
    /// I/O to one write per sweep or digest run. The closure must not
    /// block; network calls stay outside the lock.
    pub async fn update<T>(&self, f: impl FnOnce(&mut PeerBook) -> T) -> T {
        let mut book = self.book.lock().await;
        f(&mut book)
    }

    /// Persist the current book. Failure is logged, not raised.
    pub async fn save(&self) {
        let book = self.book.lock().await;
        self.persist(&book).await;
    }

    async fn persist(&self, book: &PeerBook) {
        if let Err(e) = write_atomic(&self.path, book).await {
            error!(
                "[STORE] persist to {} failed: {} (keeping in-memory state)",
                self.path.display(),
                e
            );
        }
    }
}

async fn load_book(path: &Path) -> PeerBook {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(s) => s,
        Err(_) => return PeerBook::new(),
    };
    let parsed: HashMap<String, serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            warn!("[STORE] corrupt store file {}: {}", path.display(), e);
            return PeerBook::new();
        }
    };

    let mut book = PeerBook::new();
    for (owner, value) in parsed {
        let Some(items) = value.as_array() else {
            warn!("[STORE] owner {} has a non-list entry, dropping", owner);
            continue;
        };
        let peers: Vec<PeerRecord> = items.iter().filter_map(PeerRecord::from_value).collect();
        if peers.len() < items.len() {
            warn!(
                "[STORE] dropped {} malformed record(s) for owner {}",
                items.len() - peers.len(),
                owner
            );
        }
        if !peers.is_empty() {
            book.insert(owner, peers);
        }
    }
    book
}

/// Write-to-temp-then-rename so a crash mid-write never corrupts the
/// previously stored data.
async fn write_atomic(path: &Path, book: &PeerBook) -> anyhow::Result<()> {
    let data = serde_json::to_string_pretty(book)?;
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
