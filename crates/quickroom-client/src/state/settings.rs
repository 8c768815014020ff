//! Client configuration
//!
//! Layered: built-in defaults, then `<config dir>/quickroom/config.toml` if it
//! exists, then `QUICKROOM__*` environment variables
//! (e.g. `QUICKROOM__SCREEN_SHARE__BRIDGE=extension`).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080/";
pub const DEFAULT_SIGNAL_URL: &str = "ws://localhost:8080/signal";
pub const DEFAULT_EXTENSION_ID: &str = "dfpnbmkkagkknpnmaajhggpedcnfpomg";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid telemetry DSN: {0}")]
    InvalidDsn(String),
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the token endpoint (`createRoom` is appended)
    pub server_url: String,
    /// Signalling WebSocket URL
    pub signal_url: String,
    pub log_format: LogFormat,
    /// Use generated tracks instead of real capture devices
    pub synthetic_devices: bool,
    pub telemetry: TelemetryConfig,
    pub screen_share: ScreenShareConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            signal_url: DEFAULT_SIGNAL_URL.to_string(),
            log_format: LogFormat::default(),
            synthetic_devices: true,
            telemetry: TelemetryConfig::default(),
            screen_share: ScreenShareConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Sentry-style DSN; reporting is disabled when unset
    pub dsn: Option<String>,
    pub sample_rate: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            dsn: None,
            sample_rate: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScreenShareBridge {
    #[default]
    Desktop,
    Extension,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScreenShareConfig {
    pub bridge: ScreenShareBridge,
    pub extension_id: String,
    /// Native-messaging host executable used to reach the extension
    pub host_command: Option<PathBuf>,
    pub max_width: u32,
    pub max_height: u32,
    pub max_frame_rate: u32,
    pub min_aspect_ratio: f64,
}

impl Default for ScreenShareConfig {
    fn default() -> Self {
        Self {
            bridge: ScreenShareBridge::default(),
            extension_id: DEFAULT_EXTENSION_ID.to_string(),
            host_command: None,
            max_width: 1920,
            max_height: 1080,
            max_frame_rate: 10,
            min_aspect_ratio: 1.77,
        }
    }
}

impl ClientConfig {
    /// `<config dir>/quickroom/config.toml`, or `None` when the platform has no config dir
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("quickroom").join("config.toml"))
    }

    /// Load from an optional config file and the environment. A missing file
    /// is not an error. Runs before logging is set up, so nothing is logged here.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        Self::from_builder(builder)
    }

    /// Load from an explicit TOML string layered under the environment
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Toml));
        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, ConfigError> {
        let settings = builder
            .add_source(
                config::Environment::with_prefix("QUICKROOM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// `<server_url>/createRoom`, tolerating a missing trailing slash
    pub fn create_room_url(&self) -> String {
        format!("{}/createRoom", self.server_url.trim_end_matches('/'))
    }
}
