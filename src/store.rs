//! Writes downloaded images into the add-on's private directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::BotError;

const FILE_PREFIX: &str = "seedream";
const FILE_EXTENSION: &str = "jpg";
const MAX_NAME_ATTEMPTS: usize = 8;

/// Directory of generated images.
#[derive(Debug, Clone)]
pub struct ImageStore {
    dir: PathBuf,
}

impl ImageStore {
    /// Create a store rooted at `dir`. Nothing is touched until the first save.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory images are written to.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `data` to a new, uniquely named file and return its path.
    ///
    /// # Errors
    ///
    /// Returns [`BotError::Download`] if the directory or file cannot be written.
    pub async fn save(&self, data: &[u8]) -> Result<PathBuf, BotError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            BotError::Download(format!("cannot create {}: {e}", self.dir.display()))
        })?;

        for _ in 0..MAX_NAME_ATTEMPTS {
            let path = self.dir.join(image_file_name());
            let mut file = match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(BotError::Download(format!("cannot create {}: {e}", path.display())));
                }
            };
            let written = async {
                file.write_all(data).await?;
                file.flush().await
            }
            .await;
            if let Err(e) = written {
                discard_partial(&path).await;
                return Err(BotError::Download(format!("cannot write {}: {e}", path.display())));
            }
            info!(path = %path.display(), bytes = data.len(), "image saved");
            return Ok(path);
        }

        Err(BotError::Download("could not find a free file name".into()))
    }

    /// Delete every file in the directory, then the directory if it is empty.
    ///
    /// Failures are logged and skipped. Returns the number of files removed.
    pub async fn purge_all(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return 0,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "cannot list image directory");
                return 0;
            }
        };

        let mut removed = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "cannot read directory entry");
                    break;
                }
            };
            let path = entry.path();
            let is_file = entry.file_type().await.is_ok_and(|t| t.is_file());
            if !is_file {
                continue;
            }
            match remove_image(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!("{e}"),
            }
        }

        // Only succeeds when nothing is left behind.
        if tokio::fs::remove_dir(&self.dir).await.is_ok() {
            info!(dir = %self.dir.display(), "image directory removed");
        }
        info!(removed, "image directory purged");
        removed
    }
}

/// Remove one image file.
///
/// # Errors
///
/// Returns [`BotError::Cleanup`] if the file cannot be removed.
pub async fn remove_image(path: &Path) -> Result<(), BotError> {
    tokio::fs::remove_file(path)
        .await
        .map_err(|source| BotError::Cleanup { path: path.to_path_buf(), source })
}

async fn discard_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "partial image removed"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "cannot remove partial image"),
    }
}

/// `seedream_<unix-seconds>_<8 hex>.jpg`
#[must_use]
pub fn image_file_name() -> String {
    let timestamp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
    let suffix: u32 = rand::random();
    format!("{FILE_PREFIX}_{timestamp}_{suffix:08x}.{FILE_EXTENSION}")
}
