//! Configuration file loading with environment variable overrides.
//!
//! ```toml
//! [provider]
//! api_key = "..."            # or VOLC_API_KEY
//! endpoint = "https://ark.cn-beijing.volces.com/api/v3"
//! model = "doubao-seedream-4-0-250828"
//! image_size = "2048x2048"
//! insecure_skip_verify = false
//!
//! [storage]
//! data_dir = "/var/lib/seedream"   # or SEEDREAM_DATA_DIR
//! retention_secs = 3600
//! purge_on_shutdown = true
//!
//! [chat]
//! trigger = "seedream"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::size::{resolve_size, ImageSize};

const DEFAULT_ENDPOINT: &str = "https://ark.cn-beijing.volces.com/api/v3";
const DEFAULT_MODEL: &str = "doubao-seedream-4-0-250828";
const DEFAULT_IMAGE_SIZE: &str = "1920x1920";
const DEFAULT_RETENTION_SECS: u64 = 3600;
/// Smallest accepted retention; a fresh image must outlive the sweep that follows its save.
const MIN_RETENTION_SECS: u64 = 60;
const DEFAULT_TRIGGER: &str = "seedream";

/// Top-level configuration as read from disk.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Remote provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Where generated images live and for how long.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Chat-facing settings.
    #[serde(default)]
    pub chat: ChatConfig,
}

/// Remote provider settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Bearer token for the provider API.
    pub api_key: Option<String>,
    /// API base URL; `/images/generations` is appended.
    pub endpoint: String,
    /// Model identifier.
    pub model: String,
    /// Target size in `WxH` form.
    pub image_size: String,
    /// Disable TLS certificate verification.
    pub insecure_skip_verify: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            image_size: DEFAULT_IMAGE_SIZE.to_string(),
            insecure_skip_verify: false,
        }
    }
}

/// Storage settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Private data directory; images go to `<data_dir>/images`.
    pub data_dir: Option<PathBuf>,
    /// Age in seconds after which a generated image is deleted.
    pub retention_secs: u64,
    /// Delete every generated image on shutdown.
    pub purge_on_shutdown: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: None, retention_secs: DEFAULT_RETENTION_SECS, purge_on_shutdown: true }
    }
}

/// Chat settings.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Phrase that starts an image command.
    pub trigger: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self { trigger: DEFAULT_TRIGGER.to_string() }
    }
}

impl Config {
    /// Load configuration from the given path, or return defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config {}: {e}", path.display()))?;
        toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config {}: {e}", path.display()))
    }

    /// The API key, preferring the `VOLC_API_KEY` environment variable.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        std::env::var("VOLC_API_KEY")
            .ok()
            .or_else(|| self.provider.api_key.clone())
            .filter(|k| !k.trim().is_empty())
    }

    /// The data directory, preferring `SEEDREAM_DATA_DIR`.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var("SEEDREAM_DATA_DIR") {
            return PathBuf::from(dir);
        }
        self.storage.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

/// Validated, immutable settings the add-on runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Bearer token; `None` means generation will fail with a config error.
    pub api_key: Option<String>,
    /// API base URL.
    pub endpoint: String,
    /// Model identifier.
    pub model: String,
    /// Clamped target size.
    pub size: ImageSize,
    /// How long generated files are kept.
    pub retention: Duration,
    /// Disable TLS certificate verification.
    pub insecure_skip_verify: bool,
    /// Private data directory.
    pub data_dir: PathBuf,
    /// Delete every generated image on shutdown.
    pub purge_on_shutdown: bool,
    /// Phrase that starts an image command.
    pub trigger: String,
}

impl Settings {
    /// Resolve settings from a loaded config, collecting warnings for anything replaced.
    #[must_use]
    pub fn from_config(config: &Config) -> (Self, Vec<String>) {
        let mut warnings = Vec::new();

        let api_key = config.api_key();
        if api_key.is_none() {
            warnings.push("no API key configured (set VOLC_API_KEY), generation will fail".into());
        }

        let resolution = resolve_size(&config.provider.image_size);
        warnings.extend(resolution.warning);

        let endpoint = config.provider.endpoint.trim().trim_end_matches('/').to_string();
        let endpoint = if endpoint.is_empty() {
            warnings.push(format!("empty endpoint, using {DEFAULT_ENDPOINT}"));
            DEFAULT_ENDPOINT.to_string()
        } else {
            endpoint
        };

        let retention_secs = config.storage.retention_secs;
        let retention_secs = if retention_secs < MIN_RETENTION_SECS {
            warnings.push(format!(
                "retention of {retention_secs}s is below {MIN_RETENTION_SECS}s, using {DEFAULT_RETENTION_SECS}s"
            ));
            DEFAULT_RETENTION_SECS
        } else {
            retention_secs
        };

        let trigger = config.chat.trigger.trim();
        let trigger = if trigger.is_empty() { DEFAULT_TRIGGER } else { trigger };

        let settings = Self {
            api_key,
            endpoint,
            model: config.provider.model.clone(),
            size: resolution.size,
            retention: Duration::from_secs(retention_secs),
            insecure_skip_verify: config.provider.insecure_skip_verify,
            data_dir: config.data_dir(),
            purge_on_shutdown: config.storage.purge_on_shutdown,
            trigger: trigger.to_string(),
        };
        (settings, warnings)
    }

    /// Directory holding generated images.
    #[must_use]
    pub fn image_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }
}

/// Discover the config file path using the resolution order:
/// 1. Explicit path (from `--config` flag)
/// 2. `SEEDREAM_CONFIG` environment variable
/// 3. `~/.config/seedream/config.toml`
#[must_use]
pub fn discover_config_path(explicit: Option<&str>) -> PathBuf {
    if let Some(p) = explicit {
        return PathBuf::from(p);
    }

    if let Ok(p) = std::env::var("SEEDREAM_CONFIG") {
        return PathBuf::from(p);
    }

    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".config/seedream/config.toml"),
        Err(_) => PathBuf::from("seedream.toml"),
    }
}

fn default_data_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("seedream");
    }
    match std::env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".local/share/seedream"),
        Err(_) => PathBuf::from("seedream-data"),
    }
}
