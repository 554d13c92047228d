//! Adapter implementations for port traits.
//!
//! - `live/`: real HTTP implementations
//! - `recording/`: wrap a live adapter and capture interactions to a cassette
//! - `replaying/`: serve interactions back from a cassette

pub mod live;
pub mod recording;
pub mod replaying;

/// Cassette port name for [`ImageGenerator`](crate::ports::ImageGenerator).
pub const GENERATOR_PORT: &str = "image_generator";
/// Cassette port name for [`ImageFetcher`](crate::ports::ImageFetcher).
pub const FETCHER_PORT: &str = "image_fetcher";
