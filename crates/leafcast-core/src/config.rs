//! Configuration management
//!
//! Settings are read from a TOML file. Every field has a default so a partial
//! file (or none at all) yields a usable configuration.

use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// REST API port of the fixture
pub const DEFAULT_FIXTURE_PORT: u16 = 16021;
/// UDP port the ambient colour source sends to
pub const DEFAULT_LISTEN_PORT: u16 = 20450;
/// Number of screen zones per datagram
pub const DEFAULT_ZONE_COUNT: usize = 7;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for this schema
    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: toml::de::Error,
    },

    /// A value is out of range
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Connection settings for the light fixture
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct FixtureConfig {
    /// Host name or IP address of the fixture
    pub address: String,
    /// REST API port
    pub port: u16,
    /// Auth token issued by the fixture during pairing
    pub auth_token: String,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            port: DEFAULT_FIXTURE_PORT,
            auth_token: String::new(),
        }
    }
}

impl std::fmt::Debug for FixtureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureConfig")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("auth_token", &"***REDACTED***")
            .finish()
    }
}

impl FixtureConfig {
    /// Create a fixture config for the given address and token
    pub fn new(address: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            auth_token: auth_token.into(),
            ..Default::default()
        }
    }

    /// Set the REST API port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Whether both address and token are present
    pub fn is_complete(&self) -> bool {
        !self.address.is_empty() && !self.auth_token.is_empty()
    }
}

/// Cinema mode streaming parameters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CinemaConfig {
    /// Local address to bind the UDP listener to, or "auto" to pick the
    /// address of the adapter that routes to the fixture
    pub listen_address: String,
    /// Local UDP port
    pub listen_port: u16,
    /// Number of zones (RGB triples) per datagram
    pub zone_count: usize,
    /// Brightness (0-100) applied when a session starts
    pub brightness: u8,
    /// Pause between powering on and opening the stream
    pub settle_delay_ms: u64,
    /// Receive timeout used to keep the loop responsive
    pub receive_timeout_ms: u64,
    /// Upper bound on how long `stop` waits for the loop to finish
    pub stop_timeout_ms: u64,
    /// Panel transition time in tenths of a second
    pub transition_time: u16,
}

impl Default for CinemaConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            listen_port: DEFAULT_LISTEN_PORT,
            zone_count: DEFAULT_ZONE_COUNT,
            brightness: 50,
            settle_delay_ms: 1000,
            receive_timeout_ms: 5000,
            stop_timeout_ms: 10_000,
            transition_time: 1,
        }
    }
}

impl CinemaConfig {
    /// Set the listen address and port
    pub fn with_listen(mut self, address: impl Into<String>, port: u16) -> Self {
        self.listen_address = address.into();
        self.listen_port = port;
        self
    }

    /// Set the zone count
    pub fn with_zone_count(mut self, zone_count: usize) -> Self {
        self.zone_count = zone_count;
        self
    }

    /// Set the settle delay
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the receive timeout
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the stop timeout
    pub fn with_stop_timeout(mut self, timeout: Duration) -> Self {
        self.stop_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Settle delay as a duration
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Receive timeout as a duration
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    /// Stop timeout as a duration
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Expected datagram length in bytes
    pub fn frame_len(&self) -> usize {
        self.zone_count * 3
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.zone_count == 0 {
            return Err(ConfigError::Invalid(
                "cinema.zone_count must be at least 1".to_string(),
            ));
        }
        if self.brightness > 100 {
            return Err(ConfigError::Invalid(format!(
                "cinema.brightness must be 0-100, got {}",
                self.brightness
            )));
        }
        if self.receive_timeout_ms == 0 || self.stop_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "cinema timeouts must be non-zero".to_string(),
            ));
        }
        if self.listen_address.is_empty() {
            return Err(ConfigError::Invalid(
                "cinema.listen_address must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LeafcastConfig {
    /// Fixture connection
    pub fixture: FixtureConfig,
    /// Cinema mode parameters
    pub cinema: CinemaConfig,
    /// Logging
    pub logging: LogConfig,
}

impl LeafcastConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|mut p| {
            p.push("Leafcast");
            p.push("config.toml");
            p
        })
    }

    /// Parse a config from TOML text
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load and validate a config file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load from the default location, falling back to defaults when no file exists
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Check every section
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cinema.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LeafcastConfig::default();
        assert_eq!(config.fixture.port, 16021);
        assert_eq!(config.cinema.listen_port, 20450);
        assert_eq!(config.cinema.zone_count, 7);
        assert_eq!(config.cinema.frame_len(), 21);
        assert_eq!(config.cinema.receive_timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = LeafcastConfig::from_toml(
            r#"
            [fixture]
            address = "192.168.1.20"
            auth_token = "abc"

            [cinema]
            zone_count = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.fixture.address, "192.168.1.20");
        assert_eq!(config.fixture.port, DEFAULT_FIXTURE_PORT);
        assert!(config.fixture.is_complete());
        assert_eq!(config.cinema.zone_count, 5);
        assert_eq!(config.cinema.listen_port, DEFAULT_LISTEN_PORT);
    }

    #[test]
    fn test_validation_rejects_zero_zones() {
        let cinema = CinemaConfig::default().with_zone_count(0);
        assert!(matches!(cinema.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validation_rejects_brightness_over_100() {
        let cinema = CinemaConfig {
            brightness: 101,
            ..Default::default()
        };
        assert!(cinema.validate().is_err());
    }

    #[test]
    fn test_fixture_config_debug_redaction() {
        let config = FixtureConfig::new("10.0.0.8", "secret_token_123");
        let debug_str = format!("{:?}", config);

        assert!(debug_str.contains("***REDACTED***"));
        assert!(!debug_str.contains("secret_token_123"));
        assert!(debug_str.contains("10.0.0.8"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cinema]\nlisten_port = 30000\n").unwrap();

        let config = LeafcastConfig::load_from(file.path()).unwrap();
        assert_eq!(config.cinema.listen_port, 30000);
    }

    #[test]
    fn test_load_from_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[cinema]\nzone_count = \"seven\"\n").unwrap();

        let err = LeafcastConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_missing_file() {
        let err = LeafcastConfig::load_from(Path::new("/nonexistent/leafcast.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
