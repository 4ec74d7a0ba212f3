//! Periodic sweep over all tracked peers: fetch, detect, notify, persist.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{SEND_SPACING_MS, WATCH_INTERVAL_SECS};
use crate::detector::detect;
use crate::fetcher::{PeerSnapshot, StatusFetcher};
use crate::format::render_event;
use crate::store::PeerStore;
use crate::telegram::Transport;
use crate::types::{IdentifierKind, PeerBook};

/// One fetched result waiting to be applied to the book.
pub struct FetchedPeer {
    pub owner: String,
    pub identifier: String,
    pub kind: IdentifierKind,
    pub snapshot: PeerSnapshot,
}

/// Run the watcher forever. The interval is measured from the end of one
/// full sweep to the start of the next, so a slow sweep simply runs
/// back-to-back with the following one.
pub async fn run_watcher(
    store: Arc<PeerStore>,
    fetcher: Arc<StatusFetcher>,
    transport: Arc<dyn Transport>,
) {
    info!("[WATCH] peer watcher started (interval {}s)", WATCH_INTERVAL_SECS);
    loop {
        let outbound = sweep(&store, &fetcher).await;

        for (recipient, message) in outbound {
            if let Err(e) = transport.send_message(&recipient, &message).await {
                warn!("[WATCH] notify {} failed: {}", recipient, e);
            }
            tokio::time::sleep(Duration::from_millis(SEND_SPACING_MS)).await;
        }

        // One persist per sweep, after notifications, bounding store I/O.
        store.save().await;
        tokio::time::sleep(Duration::from_secs(WATCH_INTERVAL_SECS)).await;
    }
}

/// One full pass over every owner and peer. Returns rendered notifications
/// in stable order (sorted owners, then per-owner list order).
async fn sweep(store: &PeerStore, fetcher: &StatusFetcher) -> Vec<(String, String)> {
    let book = store.book().await;
    let mut owners: Vec<&String> = book.keys().collect();
    owners.sort();

    // All network calls happen outside the store lock. An unavailable
    // peer is simply absent from the batch; the next sweep is the retry.
    let mut fetched: Vec<FetchedPeer> = Vec::new();
    for owner in owners {
        for record in &book[owner] {
            match fetcher.fetch(&record.identifier, record.kind).await {
                Some(snapshot) => fetched.push(FetchedPeer {
                    owner: owner.clone(),
                    identifier: record.identifier.clone(),
                    kind: record.kind,
                    snapshot,
                }),
                None => debug!(
                    "[WATCH] {} unavailable this sweep, skipping",
                    record.identifier
                ),
            }
        }
    }

    store.update(|book| apply_snapshots(book, &fetched)).await
}

/// Apply a batch of fetched snapshots to the book, returning the rendered
/// notifications per owner. Peers removed while the batch was being
/// fetched are skipped.
pub fn apply_snapshots(book: &mut PeerBook, fetched: &[FetchedPeer]) -> Vec<(String, String)> {
    let mut outbound = Vec::new();
    for item in fetched {
        let Some(list) = book.get_mut(&item.owner) else {
            continue;
        };
        let Some(record) = list
            .iter_mut()
            .find(|r| r.identifier == item.identifier && r.kind == item.kind)
        else {
            continue;
        };
        let (updated, events) = detect(record, &item.snapshot);
        for event in &events {
            outbound.push((item.owner.clone(), render_event(&updated, event)));
        }
        *record = updated;
    }
    outbound
}
