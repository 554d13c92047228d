//! Record/replay infrastructure for deterministic runs without network access.
//!
//! A cassette is a YAML list of port interactions. Outputs use the
//! `{"Ok": value}` / `{"Err": RecordedError}` convention.

pub mod recorder;
pub mod replayer;

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{BotError, ProviderErrorKind};

pub use recorder::CassetteRecorder;
pub use replayer::CassetteReplayer;

/// A recorded session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cassette {
    /// Human-readable name.
    pub name: String,
    /// When the session was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Interactions in call order.
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

/// One call through a port.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    /// Position in the session.
    pub seq: u64,
    /// Port name, e.g. `image_generator`.
    pub port: String,
    /// Method name, e.g. `generate`.
    pub method: String,
    /// Serialized arguments.
    #[serde(default)]
    pub input: serde_json::Value,
    /// Serialized result.
    pub output: serde_json::Value,
}

/// Serializable form of the errors a port can return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordedError {
    /// [`BotError::Provider`].
    Provider {
        /// HTTP status.
        status: u16,
        /// Mapped category.
        code: ProviderErrorKind,
        /// Provider message.
        message: String,
    },
    /// [`BotError::Network`].
    Network {
        /// Transport error text.
        message: String,
    },
    /// [`BotError::Download`].
    Download {
        /// Failure text.
        message: String,
    },
    /// [`BotError::Config`].
    Config {
        /// Failure text.
        message: String,
    },
    /// Anything else, replayed as [`BotError::Replay`].
    Other {
        /// Display form of the original error.
        message: String,
    },
}

impl From<&BotError> for RecordedError {
    fn from(e: &BotError) -> Self {
        match e {
            BotError::Provider { status, kind, message } => {
                Self::Provider { status: *status, code: *kind, message: message.clone() }
            }
            BotError::Network(message) => Self::Network { message: message.clone() },
            BotError::Download(message) => Self::Download { message: message.clone() },
            BotError::Config(message) => Self::Config { message: message.clone() },
            other => Self::Other { message: other.to_string() },
        }
    }
}

impl From<RecordedError> for BotError {
    fn from(e: RecordedError) -> Self {
        match e {
            RecordedError::Provider { status, code, message } => {
                Self::Provider { status, kind: code, message }
            }
            RecordedError::Network { message } => Self::Network(message),
            RecordedError::Download { message } => Self::Download(message),
            RecordedError::Config { message } => Self::Config(message),
            RecordedError::Other { message } => Self::Replay(message),
        }
    }
}

/// Load a cassette file and create a replayer.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_cassette(path: &Path) -> Result<CassetteReplayer, String> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read cassette file {}: {e}", path.display()))?;
    let cassette: Cassette = serde_yaml::from_str(&content)
        .map_err(|e| format!("Failed to parse cassette file {}: {e}", path.display()))?;
    Ok(CassetteReplayer::new(&cassette))
}
