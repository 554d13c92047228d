//! Recording adapters that capture interactions to cassettes.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::warn;

use super::{FETCHER_PORT, GENERATOR_PORT};
use crate::cassette::{CassetteRecorder, RecordedError};
use crate::error::BotError;
use crate::ports::image_fetcher::{FetchFuture, ImageFetcher};
use crate::ports::image_generator::{GenerateFuture, GenerationRequest, ImageGenerator};

/// Records generation calls while delegating to an inner generator.
pub struct RecordingImageGenerator {
    inner: Box<dyn ImageGenerator>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingImageGenerator {
    /// Wrap `inner`, writing interactions into `recorder`.
    pub fn new(inner: Box<dyn ImageGenerator>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

impl ImageGenerator for RecordingImageGenerator {
    fn generate(&self, request: &GenerationRequest) -> GenerateFuture<'_> {
        let request = request.clone();
        Box::pin(recorded(&self.recorder, GENERATOR_PORT, "generate", request.clone(), async move {
            self.inner.generate(&request).await
        }))
    }
}

/// Records downloads while delegating to an inner fetcher.
pub struct RecordingImageFetcher {
    inner: Box<dyn ImageFetcher>,
    recorder: Arc<Mutex<CassetteRecorder>>,
}

impl RecordingImageFetcher {
    /// Wrap `inner`, writing interactions into `recorder`.
    pub fn new(inner: Box<dyn ImageFetcher>, recorder: Arc<Mutex<CassetteRecorder>>) -> Self {
        Self { inner, recorder }
    }
}

impl ImageFetcher for RecordingImageFetcher {
    fn fetch(&self, url: &str) -> FetchFuture<'_> {
        let url = url.to_string();
        let input = serde_json::json!({ "url": url });
        Box::pin(recorded(&self.recorder, FETCHER_PORT, "fetch", input, async move {
            self.inner.fetch(&url).await
        }))
    }
}

/// Await `call` and append its input and result to the cassette.
async fn recorded<T, I, F>(
    recorder: &Arc<Mutex<CassetteRecorder>>,
    port: &'static str,
    method: &'static str,
    input: I,
    call: F,
) -> Result<T, BotError>
where
    T: Serialize,
    I: Serialize,
    F: Future<Output = Result<T, BotError>>,
{
    let result = call.await;

    let output = match &result {
        Ok(value) => serde_json::json!({ "Ok": value }),
        Err(e) => serde_json::json!({ "Err": RecordedError::from(e) }),
    };
    let input = serde_json::to_value(&input).unwrap_or_else(|e| {
        warn!(port, method, error = %e, "could not serialize recorded input");
        serde_json::Value::Null
    });

    recorder.lock().unwrap_or_else(PoisonError::into_inner).record(port, method, input, output);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderErrorKind;
    use crate::ports::image_generator::GeneratedImage;

    struct Fixed;

    impl ImageGenerator for Fixed {
        fn generate(&self, _request: &GenerationRequest) -> GenerateFuture<'_> {
            Box::pin(async { Ok(GeneratedImage { url: "http://x/1.jpg".into() }) })
        }
    }

    impl ImageFetcher for Fixed {
        fn fetch(&self, _url: &str) -> FetchFuture<'_> {
            Box::pin(async {
                Err(BotError::Provider {
                    status: 429,
                    kind: ProviderErrorKind::RateLimited,
                    message: "slow down".into(),
                })
            })
        }
    }

    #[tokio::test]
    async fn captures_success_and_typed_errors() {
        let dir = tempfile::tempdir().unwrap();
        let recorder =
            Arc::new(Mutex::new(CassetteRecorder::new(dir.path().join("c.yaml"), "test")));

        let generator = RecordingImageGenerator::new(Box::new(Fixed), Arc::clone(&recorder));
        let fetcher = RecordingImageFetcher::new(Box::new(Fixed), Arc::clone(&recorder));

        let request = GenerationRequest::new("m", "blue sky", "1920x1920", Vec::new());
        assert_eq!(generator.generate(&request).await.unwrap().url, "http://x/1.jpg");
        assert!(fetcher.fetch("http://x/1.jpg").await.is_err());

        drop(generator);
        drop(fetcher);
        let recorder = Arc::try_unwrap(recorder).unwrap().into_inner().unwrap();
        let path = recorder.finish().unwrap();
        let yaml = std::fs::read_to_string(path).unwrap();
        assert!(yaml.contains("http://x/1.jpg"));
        assert!(yaml.contains("rate_limited"));
        assert!(yaml.contains("blue sky"));
    }
}
