//! Unified error type for the seedream add-on.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a command was turned away before any generation work started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Blank prompt and no attached images.
    EmptyInput,
    /// The user sent an accepted command too recently.
    Cooldown {
        /// Time left until the user may issue another command.
        remaining: Duration,
    },
    /// The user already has a job in flight.
    AlreadyProcessing,
}

impl Rejection {
    /// Chat text shown to the user for this rejection.
    #[must_use]
    pub fn message(&self, trigger: &str) -> String {
        match self {
            Self::EmptyInput => {
                format!("Please describe the picture you want. Usage: {trigger} <prompt>")
            }
            Self::Cooldown { remaining } => {
                let secs = remaining.as_secs_f64().ceil().max(1.0);
                format!("You're going too fast, try again in {secs:.0}s.")
            }
            Self::AlreadyProcessing => {
                "You already have an image being generated, please wait for it to finish."
                    .to_string()
            }
        }
    }
}

/// Provider-reported failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    /// The request body or a parameter was rejected.
    InvalidParameter,
    /// The API key is missing, invalid or expired.
    Unauthorized,
    /// The key is valid but lacks access to the model.
    Forbidden,
    /// The account is being throttled.
    RateLimited,
    /// A success status with a body that has no usable image URL.
    MalformedResponse,
    /// Anything else; the provider message is passed through.
    Other,
}

impl ProviderErrorKind {
    /// Classify a provider error by its error code, falling back to the HTTP status.
    #[must_use]
    pub fn classify(status: u16, code: Option<&str>) -> Self {
        if let Some(code) = code {
            let lower = code.to_ascii_lowercase();
            if lower.starts_with("invalidparameter") || lower == "badrequest" {
                return Self::InvalidParameter;
            }
            if lower.starts_with("authenticationerror")
                || lower == "unauthorized"
                || lower == "invalidapikey"
            {
                return Self::Unauthorized;
            }
            if lower.starts_with("accessdenied") || lower == "forbidden" {
                return Self::Forbidden;
            }
            if lower == "toomanyrequests"
                || lower.starts_with("ratelimit")
                || lower.starts_with("quotaexceeded")
            {
                return Self::RateLimited;
            }
        }
        match status {
            400 => Self::InvalidParameter,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            429 => Self::RateLimited,
            _ => Self::Other,
        }
    }
}

/// Errors that can occur while serving an image command.
#[derive(Debug, Error)]
pub enum BotError {
    /// Missing or unusable configuration.
    #[error("Config error: {0}")]
    Config(String),

    /// The command was rejected at admission.
    #[error("Rejected: {0:?}")]
    Rejected(Rejection),

    /// The provider refused the generation request.
    #[error("Provider error ({status}, {kind:?}): {message}")]
    Provider {
        /// HTTP status code.
        status: u16,
        /// Mapped error category.
        kind: ProviderErrorKind,
        /// Message from the provider.
        message: String,
    },

    /// Transport failure talking to the provider.
    #[error("Network error: {0}")]
    Network(String),

    /// Fetching or saving the generated image failed.
    #[error("Download error: {0}")]
    Download(String),

    /// Deleting an image file failed.
    #[error("Failed to delete {}: {source}", path.display())]
    Cleanup {
        /// The file that could not be removed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The shared HTTP session was already closed.
    #[error("HTTP session is closed")]
    SessionClosed,

    /// A cassette could not serve the requested interaction.
    #[error("Replay error: {0}")]
    Replay(String),
}

impl From<reqwest::Error> for BotError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network(format!("request timed out: {e}"))
        } else if e.is_connect() {
            Self::Network(format!("connection failed: {e}"))
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl BotError {
    /// Text suitable for a chat reply. Never includes secrets.
    #[must_use]
    pub fn user_message(&self, trigger: &str) -> String {
        match self {
            Self::Rejected(rejection) => rejection.message(trigger),
            Self::Config(msg) => format!("the add-on is not configured correctly ({msg})"),
            Self::Provider { kind, message, .. } => match kind {
                ProviderErrorKind::RateLimited => {
                    "the image service is rate limiting requests, please try again later".into()
                }
                ProviderErrorKind::Unauthorized => "the API key is invalid or has expired".into(),
                ProviderErrorKind::Forbidden => {
                    "the API key has no access to this model, check that it is enabled".into()
                }
                ProviderErrorKind::InvalidParameter => format!("invalid request: {message}"),
                ProviderErrorKind::MalformedResponse => {
                    format!("the image service returned no image ({message})")
                }
                ProviderErrorKind::Other => message.clone(),
            },
            Self::Network(_) => "could not reach the image service, please try again later".into(),
            Self::Download(msg) => format!("could not download the generated image ({msg})"),
            Self::Cleanup { .. } | Self::SessionClosed => "the add-on is shutting down".into(),
            Self::Replay(msg) => format!("replay failed: {msg}"),
        }
    }

    /// Whether this error is the provider throttling us.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Provider { kind: ProviderErrorKind::RateLimited, .. })
    }
}
