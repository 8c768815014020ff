pub mod settings;

pub use settings::{ClientConfig, ConfigError, LogFormat, ScreenShareBridge, ScreenShareConfig, TelemetryConfig};
