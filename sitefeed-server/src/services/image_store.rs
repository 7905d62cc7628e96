//! Stored-image persistence
//!
//! Review attachments are written once per distinct payload, named by the
//! SHA-256 of the transcoded bytes, and referenced as `/uploads/<hex>.jpg`.
//! The standalone processing endpoint returns inline data URLs instead.
//!
//! Identical payloads share one file, so deleting a file must not race a
//! submission that reuses it. Submissions hold a [`PendingWrites`] lease from
//! their first `put` until their review is committed; cleanup takes the
//! exclusive side of the same gate around "is it still referenced?" and the
//! unlink.

use base64::Engine;
use sha2::{Digest, Sha256};
use sitefeed_common::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};
use tracing::debug;

/// URL prefix under which stored images are served
pub const URL_PREFIX: &str = "/uploads";

/// Outcome of [`ImageStore::put`]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredImage {
    /// Reference saved on the review, e.g. `/uploads/ab12….jpg`
    pub reference: String,
    /// False when an identical payload was already stored
    pub newly_created: bool,
    pub size: usize,
}

/// Shared lease held while stored references are not yet committed
pub type PendingWrites = OwnedRwLockReadGuard<()>;

/// Exclusive lease held while deciding whether to unlink files
pub type CleanupLease = OwnedRwLockWriteGuard<()>;

/// Content-addressed image directory
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
    gate: Arc<RwLock<()>>,
}

impl ImageStore {
    /// Open the store, creating its directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            gate: Arc::new(RwLock::new(())),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lease for a submission about to `put` images; drop it once the
    /// referencing review is committed (or before compensating cleanup)
    pub async fn begin_writes(&self) -> PendingWrites {
        self.gate.clone().read_owned().await
    }

    /// Waits until no submission holds [`PendingWrites`]
    pub async fn begin_cleanup(&self) -> CleanupLease {
        self.gate.clone().write_owned().await
    }

    /// Persist a transcoded payload
    ///
    /// Written to a temporary name and renamed so readers never observe a
    /// partial file.
    pub async fn put(&self, bytes: &[u8]) -> Result<StoredImage> {
        let file_name = format!("{:x}.jpg", Sha256::digest(bytes));
        let path = self.root.join(&file_name);
        let reference = format!("{}/{}", URL_PREFIX, file_name);

        if tokio::fs::try_exists(&path).await? {
            debug!(%reference, "Image already stored");
            return Ok(StoredImage {
                reference,
                newly_created: false,
                size: bytes.len(),
            });
        }

        let temp_path = self
            .root
            .join(format!(".{}.{}.tmp", file_name, uuid::Uuid::new_v4()));
        tokio::fs::write(&temp_path, bytes).await?;
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        debug!(%reference, size = bytes.len(), "Stored image");
        Ok(StoredImage {
            reference,
            newly_created: true,
            size: bytes.len(),
        })
    }

    /// Delete a stored image; returns whether a file was removed
    pub async fn remove(&self, reference: &str) -> Result<bool> {
        let path = self.path_for(reference).ok_or_else(|| {
            Error::Internal(format!("Not a stored image reference: {}", reference))
        })?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Map a reference back to its file, rejecting anything that is not a
    /// bare `<sha256 hex>.jpg` name under [`URL_PREFIX`]
    pub fn path_for(&self, reference: &str) -> Option<PathBuf> {
        let name = reference.strip_prefix(URL_PREFIX)?.strip_prefix('/')?;
        let stem = name.strip_suffix(".jpg")?;
        if stem.len() != 64 || !stem.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(self.root.join(name))
    }
}

/// Self-describing inline form: `data:image/jpeg;base64,…`
pub fn to_data_url(jpeg: &[u8]) -> String {
    format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(jpeg)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_is_content_addressed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::open(dir.path().join("uploads")).unwrap();

        let first = store.put(b"jpeg bytes").await.unwrap();
        assert!(first.newly_created);
        assert!(first.reference.starts_with("/uploads/"));
        assert!(first.reference.ends_with(".jpg"));

        let again = store.put(b"jpeg bytes").await.unwrap();
        assert_eq!(again.reference, first.reference);
        assert!(!again.newly_created);

        let other = store.put(b"other bytes").await.unwrap();
        assert_ne!(other.reference, first.reference);
    }

    #[tokio::test]
    async fn test_stored_bytes_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::open(dir.path()).unwrap();

        let stored = store.put(b"payload").await.unwrap();
        let path = store.path_for(&stored.reference).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"payload");
    }

    #[tokio::test]
    async fn test_remove_reports_whether_file_existed() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::open(dir.path()).unwrap();

        let stored = store.put(b"to delete").await.unwrap();
        assert!(store.remove(&stored.reference).await.unwrap());
        assert!(!store.remove(&stored.reference).await.unwrap());
    }

    #[test]
    fn test_path_for_rejects_traversal() {
        let store = ImageStore {
            root: PathBuf::from("/srv/uploads"),
            gate: Arc::new(RwLock::new(())),
        };
        assert!(store.path_for("/uploads/../sitefeed.db").is_none());
        assert!(store.path_for("/elsewhere/abc.jpg").is_none());
        assert!(store.path_for(&format!("/uploads/{}.jpg", "g".repeat(64))).is_none());
        assert!(store.path_for(&format!("/uploads/{}.jpg", "a".repeat(64))).is_some());
    }

    #[tokio::test]
    async fn test_cleanup_waits_for_pending_writes() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::open(dir.path()).unwrap();

        let first = store.begin_writes().await;
        let second = store.begin_writes().await;
        let blocked =
            tokio::time::timeout(std::time::Duration::from_millis(50), store.begin_cleanup()).await;
        assert!(blocked.is_err(), "cleanup must wait for in-flight submissions");

        drop(first);
        drop(second);
        let _cleanup = store.begin_cleanup().await;
    }

    #[test]
    fn test_data_url_prefix() {
        assert_eq!(to_data_url(b"abc"), "data:image/jpeg;base64,YWJj");
    }
}
