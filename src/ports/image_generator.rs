//! Image generator port for the remote text/image-to-image API.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

use crate::error::BotError;

/// Prompt sent when the user attached images but wrote nothing.
pub const DEFAULT_PROMPT: &str = "Create a high quality image based on the reference picture";

/// A request to generate one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Provider model identifier.
    pub model: String,
    /// Text prompt; never empty.
    pub prompt: String,
    /// Target size in `WxH` form.
    pub size: String,
    /// Reference images for image-conditioned generation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_images: Vec<String>,
}

impl GenerationRequest {
    /// Build a request, substituting [`DEFAULT_PROMPT`] for a blank prompt.
    #[must_use]
    pub fn new(
        model: impl Into<String>,
        prompt: &str,
        size: impl Into<String>,
        reference_images: Vec<String>,
    ) -> Self {
        let prompt = prompt.trim();
        let prompt = if prompt.is_empty() { DEFAULT_PROMPT } else { prompt };
        Self { model: model.into(), prompt: prompt.to_string(), size: size.into(), reference_images }
    }
}

/// Where the provider put the result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// URL of the generated image.
    pub url: String,
}

/// Boxed future type returned by [`ImageGenerator::generate`].
pub type GenerateFuture<'a> =
    Pin<Box<dyn Future<Output = Result<GeneratedImage, BotError>> + Send + 'a>>;

/// Generates images via an external API.
pub trait ImageGenerator: Send + Sync {
    /// Generate one image for the given request.
    fn generate(&self, request: &GenerationRequest) -> GenerateFuture<'_>;
}
