//! Leafcast Core - Configuration and shared settings
//!
//! This crate holds the configuration model shared by the control library
//! and the command line front end:
//! - Fixture connection settings (address, port, auth token)
//! - Cinema mode streaming parameters (listen socket, zones, timings)
//! - Logging configuration

#![warn(missing_docs)]

/// Configuration loading and validation
pub mod config;
/// Logging configuration
pub mod logging;

pub use config::{
    CinemaConfig, ConfigError, FixtureConfig, LeafcastConfig, DEFAULT_FIXTURE_PORT,
    DEFAULT_LISTEN_PORT, DEFAULT_ZONE_COUNT,
};
pub use logging::LogConfig;
