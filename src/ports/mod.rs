//! Port traits defining external boundaries.
//!
//! Each trait separates the command handler from a remote system. Live,
//! recording and replaying implementations live in `src/adapters/`.

pub mod image_fetcher;
pub mod image_generator;

pub use image_fetcher::{FetchedImage, ImageFetcher};
pub use image_generator::{GeneratedImage, GenerationRequest, ImageGenerator};
