//! Artifact storage: produced PDFs, addressed by a generated identifier.
//!
//! A conversion's workspace is gone by the time the client downloads the
//! result, so successful output is copied into an [`ArtifactStore`] first.
//! Identifiers are fresh v4 UUIDs and artifacts are write-once; two requests
//! never contend for the same key.
//!
//! Retention is time-based. [`spawn_retention_sweeper`] periodically calls
//! [`ArtifactStore::sweep_expired`] so the store does not grow without bound.

mod filesystem;
mod memory;

pub use filesystem::FilesystemStore;
pub use memory::MemoryStore;

use crate::error::Md2PdfError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What the store knows about one stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    pub id: Uuid,
    /// Declared file name, as produced by the conversion.
    pub filename: String,
    /// Size in bytes.
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Persistent home for conversion output.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under a fresh identifier.
    async fn store(&self, bytes: &[u8], filename: &str) -> Result<ArtifactRecord, Md2PdfError>;

    /// Fetch an artifact. Unknown or malformed ids are [`Md2PdfError::NotFound`].
    async fn retrieve(&self, id: &str) -> Result<Vec<u8>, Md2PdfError>;

    /// Remove every artifact older than `ttl` at `now`; returns how many went.
    async fn sweep_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Result<usize, Md2PdfError>;
}

/// Parse a client-supplied id. Anything that is not a UUID cannot name an
/// artifact, so it is reported as not found.
pub(crate) fn parse_id(id: &str) -> Result<Uuid, Md2PdfError> {
    Uuid::parse_str(id.trim()).map_err(|_| Md2PdfError::NotFound { id: id.to_string() })
}

/// True when an artifact created at `created` has outlived `ttl` at `now`.
pub(crate) fn is_expired(created: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    match chrono::Duration::from_std(ttl) {
        Ok(ttl) => now.signed_duration_since(created) > ttl,
        Err(_) => false,
    }
}

/// Run [`ArtifactStore::sweep_expired`] every `interval` until the task is aborted.
pub fn spawn_retention_sweeper(
    store: Arc<dyn ArtifactStore>,
    ttl: Duration,
    interval: Duration,
) -> JoinHandle<()> {
    info!(
        "Artifact retention: {}s, sweeping every {}s",
        ttl.as_secs(),
        interval.as_secs()
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.sweep_expired(Utc::now(), ttl).await {
                Ok(0) => debug!("Retention sweep: nothing expired"),
                Ok(n) => info!("Retention sweep removed {} artifact(s)", n),
                Err(e) => warn!("Retention sweep failed: {}", e),
            }
        }
    })
}
