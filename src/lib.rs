//! Seedream image generation add-on for chat bots.
//!
//! A chat command carrying a prompt (and optionally reference image URLs)
//! is admitted per user, sent to the remote generation API, and the result
//! is downloaded into a private directory and handed back as a reply.
//! Old files are swept in the background and everything is released on
//! shutdown.
//!
//! ```no_run
//! # async fn demo() {
//! use seedream::config::{Config, Settings};
//! use seedream::context::ServiceContext;
//! use seedream::{ChatCommand, SeedreamPlugin};
//!
//! let (settings, _warnings) = Settings::from_config(&Config::default());
//! let ctx = ServiceContext::live(&settings);
//! let plugin = SeedreamPlugin::new(settings, ctx);
//! let reply = plugin.handle(&ChatCommand::new("alice", "1", "blue sky", Vec::new())).await;
//! println!("{}", reply.text());
//! plugin.shutdown().await;
//! # }
//! ```

pub mod adapters;
pub mod cassette;
pub mod cli;
pub mod command;
pub mod config;
pub mod context;
pub mod error;
pub mod guard;
pub mod http;
pub mod plugin;
pub mod ports;
pub mod size;
pub mod store;
pub mod sweeper;

pub use command::{ChatCommand, Delivery, Reply};
pub use error::BotError;
pub use plugin::SeedreamPlugin;
