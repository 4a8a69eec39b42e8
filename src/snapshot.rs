//! One-shot frame persistence for the snapshot endpoint

use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Stores snapshots as sequentially numbered JPEG files in one directory.
///
/// The next index is derived from the number of entries already present,
/// mirroring how the capture button counts existing recordings.
pub struct DirStore {
    dir: PathBuf,
}

impl DirStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn persist(&self, jpeg: &[u8]) -> io::Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;

        let index = self.count_snapshots().await?;
        let path = self.dir.join(format!("{index}.jpg"));
        fs::write(&path, jpeg).await?;

        info!(path = %path.display(), bytes = jpeg.len(), "Snapshot saved");
        Ok(path)
    }

    async fn count_snapshots(&self) -> io::Result<usize> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == "jpg") {
                count += 1;
            }
        }
        Ok(count)
    }
}
