//! Replaying adapters that serve recorded interactions from cassettes.

use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;

use super::{FETCHER_PORT, GENERATOR_PORT};
use crate::cassette::{CassetteReplayer, RecordedError};
use crate::error::BotError;
use crate::ports::image_fetcher::{FetchFuture, FetchedImage, ImageFetcher};
use crate::ports::image_generator::{
    GenerateFuture, GeneratedImage, GenerationRequest, ImageGenerator,
};

/// Serves recorded generation results.
pub struct ReplayingImageGenerator {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingImageGenerator {
    /// Create a generator backed by the given replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

impl ImageGenerator for ReplayingImageGenerator {
    fn generate(&self, _request: &GenerationRequest) -> GenerateFuture<'_> {
        let result = replay::<GeneratedImage>(&self.replayer, GENERATOR_PORT, "generate");
        Box::pin(async move { result })
    }
}

/// Serves recorded downloads.
pub struct ReplayingImageFetcher {
    replayer: Arc<Mutex<CassetteReplayer>>,
}

impl ReplayingImageFetcher {
    /// Create a fetcher backed by the given replayer.
    #[must_use]
    pub fn new(replayer: Arc<Mutex<CassetteReplayer>>) -> Self {
        Self { replayer }
    }
}

impl ImageFetcher for ReplayingImageFetcher {
    fn fetch(&self, _url: &str) -> FetchFuture<'_> {
        let result = replay::<FetchedImage>(&self.replayer, FETCHER_PORT, "fetch");
        Box::pin(async move { result })
    }
}

/// Pop the next output for `port`/`method` and decode it as `Result<T, BotError>`.
fn replay<T: DeserializeOwned>(
    replayer: &Mutex<CassetteReplayer>,
    port: &str,
    method: &str,
) -> Result<T, BotError> {
    let output = replayer
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .next_output(port, method)
        .map_err(BotError::Replay)?;

    if let Some(err) = output.get("Err") {
        let recorded = match err {
            serde_json::Value::String(message) => RecordedError::Other { message: message.clone() },
            other => serde_json::from_value(other.clone())
                .map_err(|e| BotError::Replay(format!("bad recorded error: {e}")))?,
        };
        return Err(recorded.into());
    }

    let value = output.get("Ok").cloned().unwrap_or(output);
    serde_json::from_value(value).map_err(|e| BotError::Replay(format!("bad recorded value: {e}")))
}
