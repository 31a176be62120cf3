//! Artifact Store: rendered PDFs on local disk, addressed by a UUIDv4 handle.
//!
//! Each artifact lives at `{dir}/{uuid}.pdf`. Writes go through a temp file in
//! the same directory and are renamed into place, so a reader never observes a
//! partial document and a cancelled request leaves nothing behind. Artifacts
//! older than the retention window are treated as absent and removed.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppError;

const EXTENSION: &str = "pdf";
const MISSING: &str = "PDF not found or expired";

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    /// `None` disables expiry.
    ttl: Option<Duration>,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>, ttl: Option<Duration>) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("{id}.{EXTENSION}"))
    }

    /// Stores `bytes` under a fresh handle.
    pub async fn put(&self, bytes: Vec<u8>) -> Result<Uuid, AppError> {
        let store = self.clone();
        let id = tokio::task::spawn_blocking(move || store.put_blocking(&bytes))
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Artifact write task failed: {e}")))??;

        let store = self.clone();
        tokio::task::spawn_blocking(move || store.purge_expired());
        Ok(id)
    }

    fn put_blocking(&self, bytes: &[u8]) -> Result<Uuid, AppError> {
        std::fs::create_dir_all(&self.dir)?;
        let id = Uuid::new_v4();
        let mut tmp = tempfile::Builder::new()
            .prefix(".artifact-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        tmp.write_all(bytes)?;
        tmp.flush()?;
        tmp.persist(self.path_for(&id)).map_err(|e| AppError::from(e.error))?;
        info!("Stored artifact {id} ({} bytes)", bytes.len());
        Ok(id)
    }

    /// Loads the artifact stored under `handle`.
    pub async fn get(&self, handle: &str) -> Result<Vec<u8>, AppError> {
        let id = Uuid::parse_str(handle.trim()).map_err(|_| AppError::not_found(MISSING))?;
        let path = self.path_for(&id);

        let modified = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.modified()?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::not_found(MISSING))
            }
            Err(e) => return Err(e.into()),
        };

        if self.is_expired(modified, SystemTime::now()) {
            debug!("Artifact {id} expired; removing");
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove expired artifact {id}: {e}");
            }
            return Err(AppError::not_found(MISSING));
        }

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            // removed by a concurrent purge between stat and read
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::not_found(MISSING)),
            Err(e) => Err(e.into()),
        }
    }

    fn is_expired(&self, modified: SystemTime, now: SystemTime) -> bool {
        match self.ttl {
            Some(ttl) => now
                .duration_since(modified)
                .map(|age| age > ttl)
                .unwrap_or(false),
            None => false,
        }
    }

    /// Removes expired artifacts. Best effort: unreadable entries are skipped.
    /// Returns the number of files removed.
    pub fn purge_expired(&self) -> usize {
        if self.ttl.is_none() {
            return 0;
        }
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Cannot scan artifact dir {}: {e}", self.dir.display());
                return 0;
            }
        };

        let now = SystemTime::now();
        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !is_artifact_path(&path) {
                continue;
            }
            let Ok(modified) = entry.metadata().and_then(|m| m.modified()) else {
                continue;
            };
            if self.is_expired(modified, now) && std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }
        if removed > 0 {
            info!("Purged {removed} expired artifacts");
        }
        removed
    }
}

/// Only `{uuid}.pdf` files are artifacts; anything else in the directory is left alone.
fn is_artifact_path(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(EXTENSION)
        && path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(|stem| Uuid::parse_str(stem).is_ok())
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn backdate(path: &Path, age: Duration) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - age).unwrap();
    }

    #[tokio::test]
    async fn test_put_then_get_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), Some(Duration::from_secs(60)));

        let id = store.put(b"%PDF-1.5 test".to_vec()).await.unwrap();
        assert_eq!(id.get_version_num(), 4);

        let first = store.get(&id.to_string()).await.unwrap();
        let second = store.get(&id.to_string()).await.unwrap();
        assert_eq!(first, b"%PDF-1.5 test".to_vec());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_distinct_puts_get_distinct_handles() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), None);
        let a = store.put(b"a".to_vec()).await.unwrap();
        let b = store.put(b"a".to_vec()).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_handles_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), None);

        for handle in [Uuid::new_v4().to_string(), "../../etc/passwd".to_string()] {
            let err = store.get(&handle).await.unwrap_err();
            assert_eq!(err.code(), "NOT_FOUND");
        }
    }

    #[tokio::test]
    async fn test_expired_artifact_is_removed_on_access() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), Some(Duration::from_secs(60)));
        let id = store.put(b"old".to_vec()).await.unwrap();
        let path = dir.path().join(format!("{id}.pdf"));
        backdate(&path, Duration::from_secs(3600));

        let err = store.get(&id.to_string()).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_no_ttl_never_expires() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), None);
        let id = store.put(b"kept".to_vec()).await.unwrap();
        backdate(&dir.path().join(format!("{id}.pdf")), Duration::from_secs(10 * 86_400));

        assert_eq!(store.get(&id.to_string()).await.unwrap(), b"kept".to_vec());
        assert_eq!(store.purge_expired(), 0);
    }

    #[test]
    fn test_purge_only_touches_expired_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), Some(Duration::from_secs(60)));

        let old = dir.path().join(format!("{}.pdf", Uuid::new_v4()));
        let fresh = dir.path().join(format!("{}.pdf", Uuid::new_v4()));
        let foreign = dir.path().join("report.pdf");
        for path in [&old, &fresh, &foreign] {
            std::fs::write(path, b"x").unwrap();
        }
        backdate(&old, Duration::from_secs(3600));
        backdate(&foreign, Duration::from_secs(3600));

        assert_eq!(store.purge_expired(), 1);
        assert!(!old.exists());
        assert!(fresh.exists());
        assert!(foreign.exists());
    }

    #[tokio::test]
    async fn test_no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::new(dir.path(), None);
        store.put(b"data".to_vec()).await.unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".pdf"));
    }
}
