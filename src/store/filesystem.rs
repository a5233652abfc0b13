//! Artifacts as files: `<dir>/<uuid>.pdf`.

use super::{is_expired, parse_id, ArtifactRecord, ArtifactStore};
use crate::error::Md2PdfError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

const EXTENSION: &str = "pdf";
const TEMP_SUFFIX: &str = "tmp";

/// Files in the store directory that the store owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    /// `<uuid>.pdf`
    Artifact,
    /// `.<uuid>.pdf.tmp`, left behind when a write never reached its rename.
    Partial,
}

impl Entry {
    fn classify(name: &str) -> Option<Self> {
        let is_id = |stem: &str| Uuid::parse_str(stem).is_ok();
        let artifact_stem = |n: &str| {
            n.strip_suffix(EXTENSION)
                .and_then(|n| n.strip_suffix('.'))
                .is_some_and(is_id)
        };
        if let Some(partial) = name
            .strip_prefix('.')
            .and_then(|n| n.strip_suffix(TEMP_SUFFIX))
            .and_then(|n| n.strip_suffix('.'))
        {
            return artifact_stem(partial).then_some(Entry::Partial);
        }
        artifact_stem(name).then_some(Entry::Artifact)
    }
}

/// Stores each artifact as a file in one directory.
///
/// Writes go to a dot-prefixed temp file first and are renamed into place, so
/// a reader never observes a partial artifact. Age is taken from the file's
/// modification time, which keeps the store stateless across restarts.
/// Temp files orphaned by a crash age out under the same TTL.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    dir: PathBuf,
}

impl FilesystemStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, Md2PdfError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Md2PdfError::io("Failed to create artifact directory", &dir, e))?;
        debug!("Artifact store at {}", dir.display());
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn artifact_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{id}.{EXTENSION}"))
    }
}

#[async_trait]
impl ArtifactStore for FilesystemStore {
    async fn store(&self, bytes: &[u8], filename: &str) -> Result<ArtifactRecord, Md2PdfError> {
        let id = Uuid::new_v4();
        let path = self.artifact_path(id);
        let tmp_path = self.dir.join(format!(".{id}.{EXTENSION}.{TEMP_SUFFIX}"));

        tokio::fs::write(&tmp_path, bytes)
            .await
            .map_err(|e| Md2PdfError::io("Failed to write artifact", &tmp_path, e))?;
        if let Err(e) = tokio::fs::rename(&tmp_path, &path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(Md2PdfError::io("Failed to store artifact", &path, e));
        }

        info!("Stored artifact {} ({} bytes)", id, bytes.len());
        Ok(ArtifactRecord {
            id,
            filename: filename.to_string(),
            size: bytes.len() as u64,
            created_at: Utc::now(),
        })
    }

    async fn retrieve(&self, id: &str) -> Result<Vec<u8>, Md2PdfError> {
        let uuid = parse_id(id)?;
        let path = self.artifact_path(uuid);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Md2PdfError::NotFound {
                id: id.to_string(),
            }),
            Err(e) => Err(Md2PdfError::io("Failed to read artifact", &path, e)),
        }
    }

    async fn sweep_expired(&self, now: DateTime<Utc>, ttl: Duration) -> Result<usize, Md2PdfError> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .map_err(|e| Md2PdfError::io("Failed to list artifact directory", &self.dir, e))?;

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Md2PdfError::io("Failed to list artifact directory", &self.dir, e))?
        {
            let path = entry.path();
            let Some(kind) = entry.file_name().to_str().and_then(Entry::classify) else {
                continue;
            };

            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(t) => DateTime::<Utc>::from(t),
                Err(e) => {
                    warn!("Cannot read age of {}: {}", path.display(), e);
                    continue;
                }
            };
            if !is_expired(modified, now, ttl) {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) if kind == Entry::Partial => {
                    debug!("Removed stale partial write {}", path.display());
                }
                Ok(()) => {
                    debug!("Evicted {}", path.display());
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to evict {}: {}", path.display(), e),
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_then_retrieve_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::open(dir.path()).await.unwrap();
        let body: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

        let record = store.store(&body, "report.pdf").await.unwrap();
        assert_eq!(record.filename, "report.pdf");
        assert_eq!(record.size, 10_000);
        assert!(dir.path().join(format!("{}.pdf", record.id)).is_file());

        let back = store.retrieve(&record.id.to_string()).await.unwrap();
        assert_eq!(back, body);
    }

    #[tokio::test]
    async fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::open(dir.path()).await.unwrap();
        store.store(b"%PDF-1.5", "a.pdf").await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".pdf") && !names[0].starts_with('.'));
    }

    #[tokio::test]
    async fn unknown_and_malformed_ids_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::open(dir.path()).await.unwrap();

        let unknown = Uuid::new_v4().to_string();
        assert!(matches!(
            store.retrieve(&unknown).await,
            Err(Md2PdfError::NotFound { .. })
        ));
        assert!(matches!(
            store.retrieve("../secret").await,
            Err(Md2PdfError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn open_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let store = FilesystemStore::open(&nested).await.unwrap();
        assert!(nested.is_dir());
        assert_eq!(store.dir(), nested);
    }

    #[tokio::test]
    async fn sweep_removes_only_expired_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::open(dir.path()).await.unwrap();
        let record = store.store(b"%PDF", "a.pdf").await.unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();

        let ttl = Duration::from_secs(3600);
        assert_eq!(store.sweep_expired(Utc::now(), ttl).await.unwrap(), 0);
        assert!(store.retrieve(&record.id.to_string()).await.is_ok());

        let later = Utc::now() + chrono::Duration::hours(2);
        assert_eq!(store.sweep_expired(later, ttl).await.unwrap(), 1);
        assert!(matches!(
            store.retrieve(&record.id.to_string()).await,
            Err(Md2PdfError::NotFound { .. })
        ));
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn entry_names_are_classified() {
        let id = Uuid::new_v4();
        assert_eq!(Entry::classify(&format!("{id}.pdf")), Some(Entry::Artifact));
        assert_eq!(Entry::classify(&format!(".{id}.pdf.tmp")), Some(Entry::Partial));
        assert_eq!(Entry::classify(&format!("{id}.pdf.tmp")), None);
        assert_eq!(Entry::classify(&format!(".{id}.pdf")), None);
        assert_eq!(Entry::classify(".notes.pdf.tmp"), None);
        assert_eq!(Entry::classify("notes.txt"), None);
    }

    #[tokio::test]
    async fn sweep_removes_stale_partial_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::open(dir.path()).await.unwrap();
        let partial = dir.path().join(format!(".{}.pdf.tmp", Uuid::new_v4()));
        std::fs::write(&partial, b"%PDF-1.5 trunc").unwrap();
        let foreign = dir.path().join(".editor.swp.tmp");
        std::fs::write(&foreign, b"x").unwrap();

        let ttl = Duration::from_secs(3600);
        assert_eq!(store.sweep_expired(Utc::now(), ttl).await.unwrap(), 0);
        assert!(partial.exists(), "fresh partial write must survive");

        let later = Utc::now() + chrono::Duration::hours(2);
        assert_eq!(store.sweep_expired(later, ttl).await.unwrap(), 0);
        assert!(!partial.exists(), "stale partial write not removed");
        assert!(foreign.exists());
    }
}
