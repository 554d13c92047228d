//! Live adapter for the Volcengine Ark image generation API.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{BotError, ProviderErrorKind};
use crate::http::HttpSession;
use crate::ports::image_generator::{
    GenerateFuture, GeneratedImage, GenerationRequest, ImageGenerator,
};

/// Generation can take a while for large sizes.
pub const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

/// Live generator that posts to `{endpoint}/images/generations`.
pub struct ArkGenerator {
    session: Arc<HttpSession>,
    api_key: Option<String>,
    url: String,
}

impl ArkGenerator {
    /// Create a generator for the given endpoint base URL.
    #[must_use]
    pub fn new(session: Arc<HttpSession>, api_key: Option<String>, endpoint: &str) -> Self {
        Self {
            session,
            api_key,
            url: format!("{}/images/generations", endpoint.trim_end_matches('/')),
        }
    }
}

impl ImageGenerator for ArkGenerator {
    fn generate(&self, request: &GenerationRequest) -> GenerateFuture<'_> {
        let request = request.clone();
        Box::pin(async move {
            let api_key = self
                .api_key
                .as_deref()
                .ok_or_else(|| BotError::Config("no API key configured".into()))?;
            let client = self.session.client()?;

            let body = ArkRequest {
                model: &request.model,
                prompt: &request.prompt,
                size: &request.size,
                watermark: false,
                image: &request.reference_images,
            };
            debug!(url = %self.url, model = %request.model, size = %request.size, "posting generation request");

            let response = client
                .post(&self.url)
                .bearer_auth(api_key)
                .timeout(GENERATION_TIMEOUT)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            let response_text = response.text().await?;

            if !status.is_success() {
                return Err(provider_error(status.as_u16(), &response_text));
            }

            let parsed: ArkResponse = serde_json::from_str(&response_text)
                .map_err(|e| malformed(format!("failed to parse response: {e}")))?;

            if parsed.error.is_some() {
                return Err(provider_error(status.as_u16(), &response_text));
            }

            let first = parsed
                .data
                .unwrap_or_default()
                .into_iter()
                .next()
                .ok_or_else(|| malformed(format!("no data in response: {}", truncate(&response_text))))?;
            let url = first
                .url
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| malformed("first result has no url".into()))?;

            Ok(GeneratedImage { url })
        })
    }
}

/// Turn a provider error body into a typed error.
fn provider_error(status: u16, body: &str) -> BotError {
    let envelope = serde_json::from_str::<ArkResponse>(body).ok().and_then(|r| r.error);
    let (code, message) = match envelope {
        Some(ArkError { code, message }) => {
            let message = message.unwrap_or_else(|| truncate(body));
            (code, message)
        }
        None => (None, truncate(body)),
    };
    let kind = ProviderErrorKind::classify(status, code.as_deref());
    warn!(status, code = code.as_deref().unwrap_or("-"), ?kind, "provider rejected request");
    BotError::Provider { status, kind, message }
}

fn malformed(message: String) -> BotError {
    BotError::Provider { status: 200, kind: ProviderErrorKind::MalformedResponse, message }
}

fn truncate(text: &str) -> String {
    const LIMIT: usize = 500;
    if text.len() <= LIMIT {
        return text.to_string();
    }
    let mut end = LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

// --- Ark API wire types ---

#[derive(Serialize)]
struct ArkRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    watermark: bool,
    #[serde(skip_serializing_if = "is_empty")]
    image: &'a [String],
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_empty(images: &&[String]) -> bool {
    images.is_empty()
}

#[derive(Deserialize)]
struct ArkResponse {
    data: Option<Vec<ArkImageData>>,
    error: Option<ArkError>,
}

#[derive(Deserialize)]
struct ArkImageData {
    url: Option<String>,
}

#[derive(Deserialize)]
struct ArkError {
    code: Option<String>,
    message: Option<String>,
}
