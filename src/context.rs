//! Service context that bundles the port trait objects the plugin runs on.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::adapters::live::ark::ArkGenerator;
use crate::adapters::live::download::HttpFetcher;
use crate::adapters::recording::{RecordingImageFetcher, RecordingImageGenerator};
use crate::adapters::replaying::{ReplayingImageFetcher, ReplayingImageGenerator};
use crate::cassette::{load_cassette, CassetteRecorder};
use crate::config::Settings;
use crate::error::BotError;
use crate::http::HttpSession;
use crate::ports::{ImageFetcher, ImageGenerator};

/// Bundles the ports and, in live mode, the HTTP session they share.
pub struct ServiceContext {
    /// Image generator port.
    pub generator: Arc<dyn ImageGenerator>,
    /// Image download port.
    pub fetcher: Arc<dyn ImageFetcher>,
    /// Connection pool to close at shutdown, if any.
    pub session: Option<Arc<HttpSession>>,
}

/// Handle to a recording session that must be finished after use.
pub struct RecordingSession {
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingSession {
    /// Write the cassette to disk.
    ///
    /// Call after the plugin that used the recording context has been dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if adapters still hold the recorder or the file cannot be written.
    pub fn finish(self) -> Result<PathBuf, String> {
        let recorder = Arc::try_unwrap(self.recorder)
            .map_err(|_| "recording adapters are still alive".to_string())?
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        if recorder.is_empty() {
            warn!("no interactions were recorded");
        } else {
            debug!(interactions = recorder.len(), "writing cassette");
        }
        recorder.finish().map_err(|e| format!("Failed to write cassette: {e}"))
    }
}

impl ServiceContext {
    /// Live adapters over one shared HTTP session.
    #[must_use]
    pub fn live(settings: &Settings) -> Self {
        let session = Arc::new(HttpSession::new(settings.insecure_skip_verify));
        let generator =
            ArkGenerator::new(Arc::clone(&session), settings.api_key.clone(), &settings.endpoint);
        let fetcher = HttpFetcher::new(Arc::clone(&session));
        Self { generator: Arc::new(generator), fetcher: Arc::new(fetcher), session: Some(session) }
    }

    /// Live adapters wrapped with recorders writing under `output_dir`.
    #[must_use]
    pub fn recording(settings: &Settings, output_dir: &Path) -> (Self, RecordingSession) {
        let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H-%M-%S").to_string();
        let path = output_dir.join(&timestamp).join("session.cassette.yaml");
        let recorder =
            Arc::new(Mutex::new(CassetteRecorder::new(path, format!("{timestamp}-session"))));

        let session = Arc::new(HttpSession::new(settings.insecure_skip_verify));
        let generator = RecordingImageGenerator::new(
            Box::new(ArkGenerator::new(
                Arc::clone(&session),
                settings.api_key.clone(),
                &settings.endpoint,
            )),
            Arc::clone(&recorder),
        );
        let fetcher = RecordingImageFetcher::new(
            Box::new(HttpFetcher::new(Arc::clone(&session))),
            Arc::clone(&recorder),
        );

        let ctx = Self {
            generator: Arc::new(generator),
            fetcher: Arc::new(fetcher),
            session: Some(session),
        };
        (ctx, RecordingSession { recorder })
    }

    /// Adapters that answer from a cassette file; no network access.
    ///
    /// # Errors
    ///
    /// Returns an error if the cassette file cannot be loaded.
    pub fn replaying(path: &Path) -> Result<Self, BotError> {
        let replayer = load_cassette(path)
            .map_err(|e| BotError::Config(format!("Failed to load cassette: {e}")))?;
        let replayer = Arc::new(Mutex::new(replayer));
        Ok(Self {
            generator: Arc::new(ReplayingImageGenerator::new(Arc::clone(&replayer))),
            fetcher: Arc::new(ReplayingImageFetcher::new(replayer)),
            session: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn live_context_shares_one_session() {
        let (settings, _) = Settings::from_config(&Config::default());
        let ctx = ServiceContext::live(&settings);
        let session = ctx.session.expect("live mode owns a session");
        assert_eq!(Arc::strong_count(&session), 3);
        assert!(!session.is_closed());
    }

    #[test]
    fn replaying_missing_cassette_is_config_error() {
        let result = ServiceContext::replaying(Path::new("/nonexistent/c.yaml"));
        assert!(matches!(result, Err(BotError::Config(_))));
    }

    #[test]
    fn recording_session_finishes_after_adapters_drop() {
        let dir = tempfile::tempdir().unwrap();
        let (settings, _) = Settings::from_config(&Config::default());
        let (ctx, session) = ServiceContext::recording(&settings, dir.path());
        drop(ctx);
        let path = session.finish().unwrap();
        assert!(path.exists());
        assert!(path.starts_with(dir.path()));
    }
}
