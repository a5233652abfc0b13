use super::{is_expired, parse_id, ArtifactRecord, ArtifactStore};
use crate::error::Md2PdfError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Keeps artifacts in process memory. Contents vanish on restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: RwLock<HashMap<Uuid, (ArtifactRecord, Arc<[u8]>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.artifacts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.artifacts.read().await.is_empty()
    }

    /// Metadata of a stored artifact, if present.
    pub async fn record(&self, id: Uuid) -> Option<ArtifactRecord> {
        self.artifacts.read().await.get(&id).map(|(r, _)| r.clone())
    }
}

#[async_trait]
impl ArtifactStore for MemoryStore {
    async fn store(&self, bytes: &[u8], filename: &str) -> Result<ArtifactRecord, Md2PdfError> {
        let record = ArtifactRecord {
            id: Uuid::new_v4(),
            filename: filename.to_string(),
            size: bytes.len() as u64,
            created_at: Utc::now(),
        };
        self.artifacts
            .write()
            .await
            .insert(record.id, (record.clone(), Arc::from(bytes)));
        Ok(record)
    }

    async fn retrieve(&self, id: &str) -> Result<Vec<u8>, Md2PdfError> {
        let uuid = parse_id(id)?;
        self.artifacts
            .read()
            .await
            .get(&uuid)
            .map(|(_, bytes)| bytes.to_vec())
            .ok_or_else(|| Md2PdfError::NotFound { id: id.to_string() })
    }

    async fn sweep_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Result<usize, Md2PdfError> {
        let mut map = self.artifacts.write().await;
        let before = map.len();
        map.retain(|_, (record, _)| !is_expired(record.created_at, now, ttl));
        Ok(before - map.len())
    }
}
