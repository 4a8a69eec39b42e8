//! Configuration management

use crate::camera::PixelFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Complete server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub storage: StorageConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_ip")]
    pub bind_ip: String,

    /// Control-plane port; the stream listener takes the next port up
    #[serde(default = "default_web_port")]
    pub web_port: u16,
}

impl ServerConfig {
    pub fn web_addr(&self) -> String {
        format!("{}:{}", self.bind_ip, self.web_port)
    }

    pub fn stream_port(&self) -> u16 {
        self.web_port + 1
    }

    pub fn stream_addr(&self) -> String {
        format!("{}:{}", self.bind_ip, self.stream_port())
    }
}

/// Frame source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Pixel encoding the source hands out
    #[serde(default = "default_format")]
    pub format: PixelFormat,

    #[serde(default = "default_width")]
    pub width: u32,

    #[serde(default = "default_height")]
    pub height: u32,

    #[serde(default = "default_fps")]
    pub fps: u32,

    /// JPEG quality (1-100) for encoding and re-encoding
    #[serde(default = "default_quality")]
    pub quality: u8,
}

/// Streaming telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Rolling-filter window; 0 disables smoothing (pass-through)
    #[serde(default = "default_filter_samples")]
    pub filter_samples: usize,
}

/// Snapshot persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_ip: default_bind_ip(),
            web_port: default_web_port(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            quality: default_quality(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            filter_samples: default_filter_samples(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            camera: CameraConfig::default(),
            stream: StreamConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

// Default value functions
fn default_bind_ip() -> String {
    "0.0.0.0".to_string()
}
fn default_web_port() -> u16 {
    8080
}
fn default_format() -> PixelFormat {
    PixelFormat::Jpeg
}
fn default_width() -> u32 {
    640
}
fn default_height() -> u32 {
    480
}
fn default_fps() -> u32 {
    30
}
fn default_quality() -> u8 {
    80
}
fn default_filter_samples() -> usize {
    20
}
fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("snapshots")
}

impl Config {
    /// Loads configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Loads configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.web_port == 0 || self.server.web_port == u16::MAX {
            return Err(ConfigError::Invalid(format!(
                "web_port must be between 1 and 65534 (the stream listener uses the next port), got {}",
                self.server.web_port
            )));
        }

        let cam = &self.camera;
        if cam.width == 0 || cam.height == 0 {
            return Err(ConfigError::Invalid(
                "camera width and height must be > 0".to_string(),
            ));
        }

        if cam.fps == 0 || cam.fps > 120 {
            return Err(ConfigError::Invalid(format!(
                "camera fps must be between 1 and 120, got {}",
                cam.fps
            )));
        }

        if cam.quality == 0 || cam.quality > 100 {
            return Err(ConfigError::Invalid(format!(
                "camera quality must be between 1 and 100, got {}",
                cam.quality
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.web_port, 8080);
        assert_eq!(config.server.stream_port(), 8081);
        assert_eq!(config.camera.format, PixelFormat::Jpeg);
        assert_eq!(config.stream.filter_samples, 20);
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
[server]
bind_ip = "127.0.0.1"
web_port = 9000

[camera]
format = "rgb888"
width = 320
height = 240
fps = 15
quality = 70

[stream]
filter_samples = 8

[storage]
snapshot_dir = "/tmp/snaps"
        "#;

        let config = Config::from_toml(toml).unwrap();

        assert_eq!(config.server.bind_ip, "127.0.0.1");
        assert_eq!(config.server.web_port, 9000);
        assert_eq!(config.server.stream_port(), 9001);
        assert_eq!(config.camera.format, PixelFormat::Rgb888);
        assert_eq!(config.camera.width, 320);
        assert_eq!(config.camera.height, 240);
        assert_eq!(config.camera.fps, 15);
        assert_eq!(config.camera.quality, 70);
        assert_eq!(config.stream.filter_samples, 8);
        assert_eq!(config.storage.snapshot_dir, PathBuf::from("/tmp/snaps"));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.camera.quality, 80);
    }

    #[test]
    fn test_zero_filter_samples_is_allowed() {
        let config = Config::from_toml("[stream]\nfilter_samples = 0\n").unwrap();
        assert_eq!(config.stream.filter_samples, 0);
    }

    #[test]
    fn test_invalid_quality() {
        let result = Config::from_toml("[camera]\nquality = 101\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_dimensions() {
        let result = Config::from_toml("[camera]\nwidth = 0\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_web_port_with_no_room_for_stream_port() {
        let result = Config::from_toml("[server]\nweb_port = 65535\n");
        assert!(result.is_err());
    }
}
