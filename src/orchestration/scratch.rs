// Transaction-scoped scratch storage for decoded photos
//
// Each transaction writes its photo to `<dir>/<transaction-id>.img`, opened
// with create-new so no two transactions can ever share a file. The guard
// removes the file when dropped, on success and failure paths alike.

use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace};
use uuid::Uuid;

/// Owned scratch file, deleted on drop
#[derive(Debug)]
pub struct ScratchImage {
    path: PathBuf,
}

impl ScratchImage {
    /// Write `bytes` to a fresh file named after `transaction_id`
    pub async fn create(dir: &Path, transaction_id: Uuid, bytes: &[u8]) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;

        let path = dir.join(format!("{}.img", transaction_id));
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;

        // From here on the file exists; the guard owns its removal
        let scratch = Self { path };
        file.write_all(bytes).await?;
        file.flush().await?;

        trace!("Scratch image written: {} ({} bytes)", scratch.path.display(), bytes.len());
        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the file now (same as dropping, but explicit at call sites)
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ScratchImage {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => trace!("Scratch image removed: {}", self.path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => debug!("Ignoring scratch cleanup error for {}: {}", self.path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_dir() -> PathBuf {
        std::env::temp_dir().join(format!("scratch-test-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_written_then_removed_on_drop() {
        let dir = test_dir();
        let scratch = ScratchImage::create(&dir, Uuid::new_v4(), b"photo").await.unwrap();
        let path = scratch.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"photo");

        drop(scratch);
        assert!(!path.exists());
        let _ = std::fs::remove_dir(&dir);
    }

    #[tokio::test]
    async fn test_distinct_transactions_never_alias() {
        let dir = test_dir();
        let first = ScratchImage::create(&dir, Uuid::new_v4(), b"one").await.unwrap();
        let second = ScratchImage::create(&dir, Uuid::new_v4(), b"two").await.unwrap();

        assert_ne!(first.path(), second.path());
        assert_eq!(std::fs::read(first.path()).unwrap(), b"one");
        assert_eq!(std::fs::read(second.path()).unwrap(), b"two");

        first.release();
        second.release();
        assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
        let _ = std::fs::remove_dir(&dir);
    }

    #[tokio::test]
    async fn test_reused_id_is_rejected() {
        let dir = test_dir();
        let id = Uuid::new_v4();
        let first = ScratchImage::create(&dir, id, b"one").await.unwrap();
        let err = ScratchImage::create(&dir, id, b"two").await.unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        // The first file is untouched
        assert_eq!(std::fs::read(first.path()).unwrap(), b"one");
        drop(first);
        let _ = std::fs::remove_dir(&dir);
    }

    #[tokio::test]
    async fn test_cleanup_after_external_removal_is_silent() {
        let dir = test_dir();
        let scratch = ScratchImage::create(&dir, Uuid::new_v4(), b"x").await.unwrap();
        std::fs::remove_file(scratch.path()).unwrap();
        drop(scratch);
        let _ = std::fs::remove_dir(&dir);
    }
}
