//! Reaper Task
//!
//! Background task that periodically removes expired documents from the
//! in-memory backend. Between sweeps, expired documents stay physically
//! present; logical reads must not rely on them being gone.

use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::memory::{purge_expired, DocumentMap};

/// Spawns a background task that periodically deletes expired documents.
///
/// The task runs in an infinite loop, sleeping for `interval` between
/// sweeps. Each sweep holds the write lock only for the purge itself.
///
/// # Returns
/// A JoinHandle for the spawned task, which the backend aborts on shutdown.
pub fn spawn_reaper_task(documents: DocumentMap, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            "Starting reaper task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = purge_expired(&documents, Utc::now()).await;

            if removed > 0 {
                info!("Reaper: removed {} expired documents", removed);
            } else {
                debug!("Reaper: no expired documents found");
            }
        }
    })
}
