//! Periodic removal of generated images past their retention window.
//!
//! Sweeps are activity driven: the command handler asks for one after every
//! successful download, and the sweeper decides whether to actually run.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::time::{Duration, Instant, SystemTime};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::store::remove_image;

/// Minimum spacing between two sweeps that do real work.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Why a sweep did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The previous sweep ran less than one interval ago.
    Throttled,
    /// Another sweep is running right now.
    Busy,
}

/// Result of one [`RetentionSweeper::sweep`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The directory was scanned.
    Completed {
        /// Files deleted.
        removed: usize,
        /// Expired files that could not be deleted.
        failed: usize,
    },
    /// Nothing was done.
    Skipped(SkipReason),
}

/// Deletes files older than the retention window, at most once per interval.
#[derive(Debug)]
pub struct RetentionSweeper {
    dir: PathBuf,
    retention: Duration,
    interval: Duration,
    last_run: Mutex<Option<Instant>>,
}

impl RetentionSweeper {
    /// Create a sweeper for `dir` using the standard [`SWEEP_INTERVAL`].
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, retention: Duration) -> Self {
        Self::with_interval(dir, retention, SWEEP_INTERVAL)
    }

    /// Create a sweeper with a custom throttle interval.
    #[must_use]
    pub fn with_interval(dir: impl Into<PathBuf>, retention: Duration, interval: Duration) -> Self {
        Self { dir: dir.into(), retention, interval, last_run: Mutex::new(None) }
    }

    /// Run one sweep if none is running and the interval has elapsed.
    ///
    /// Safe to call as often as you like.
    pub async fn sweep(&self) -> SweepOutcome {
        let Ok(mut last_run) = self.last_run.try_lock() else {
            debug!("sweep already running");
            return SweepOutcome::Skipped(SkipReason::Busy);
        };

        let now = Instant::now();
        if let Some(previous) = *last_run {
            if now.saturating_duration_since(previous) < self.interval {
                return SweepOutcome::Skipped(SkipReason::Throttled);
            }
        }
        *last_run = Some(now);

        // The lock stays held for the whole scan so overlapping calls see Busy.
        let (removed, failed) = self.remove_expired().await;
        if removed > 0 || failed > 0 {
            info!(removed, failed, dir = %self.dir.display(), "retention sweep finished");
        } else {
            debug!(dir = %self.dir.display(), "retention sweep found nothing to delete");
        }
        SweepOutcome::Completed { removed, failed }
    }

    async fn remove_expired(&self) -> (usize, usize) {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return (0, 0),
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "cannot list image directory");
                return (0, 0);
            }
        };

        let cutoff = SystemTime::now().checked_sub(self.retention);
        let mut removed = 0;
        let mut failed = 0;

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "cannot read directory entry");
                    break;
                }
            };
            let Ok(metadata) = entry.metadata().await else { continue };
            if !metadata.is_file() {
                continue;
            }
            let expired = match (metadata.modified(), cutoff) {
                (Ok(modified), Some(cutoff)) => modified < cutoff,
                _ => false,
            };
            if !expired {
                continue;
            }
            match remove_image(&entry.path()).await {
                Ok(()) => {
                    debug!(path = %entry.path().display(), "expired image deleted");
                    removed += 1;
                }
                Err(e) => {
                    warn!("{e}");
                    failed += 1;
                }
            }
        }
        (removed, failed)
    }
}
