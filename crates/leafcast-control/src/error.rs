//! Error types for cinema mode
use thiserror::Error;

use crate::cinema::{SessionId, StreamError, TopologyError};
use crate::fixture::FixtureError;
use leafcast_core::ConfigError;

/// Errors returned by the cinema mode control surface.
///
/// Everything here is a setup failure: once a session is streaming, loop
/// errors are logged and recorded in the session status instead.
#[derive(Error, Debug)]
pub enum CinemaError {
    /// Invalid or incomplete configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A session is already starting or streaming
    #[error("Session already active: {0}")]
    SessionActive(SessionId),

    /// Panel layout could not be resolved
    #[error("Topology error: {0}")]
    Topology(#[from] TopologyError),

    /// Configured zone count differs from the number of ring panels
    #[error("Configured for {configured} zones but the fixture ring has {ring} panels")]
    ZoneMismatch { configured: usize, ring: usize },

    /// Fixture rejected a power or brightness command
    #[error("Fixture error: {0}")]
    Fixture(#[from] FixtureError),

    /// External control stream could not be opened
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    /// Listen socket could not be bound
    #[error("Failed to bind UDP listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Listen address could not be determined
    #[error("Invalid listen address: {0}")]
    ListenAddress(String),

    /// `stop` was requested while the session was still starting
    #[error("Session start cancelled")]
    Cancelled,
}

impl CinemaError {
    /// Whether retrying `start` later can reasonably succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            CinemaError::SessionActive(_) | CinemaError::Cancelled => true,
            CinemaError::Fixture(e) => e.is_network(),
            CinemaError::Topology(TopologyError::Query(e)) => e.is_network(),
            CinemaError::Stream(StreamError::Enable(e)) => e.is_network(),
            CinemaError::Bind { .. } => true,
            // Needs a config change
            CinemaError::ZoneMismatch { .. } => false,
            _ => false,
        }
    }
}

/// Result type for cinema mode operations
pub type Result<T> = std::result::Result<T, CinemaError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_network_failures_are_retryable() {
        let refused = || FixtureError::Io(io::Error::from(io::ErrorKind::ConnectionRefused));

        assert!(CinemaError::Fixture(refused()).is_retryable());
        assert!(CinemaError::Topology(TopologyError::Query(refused())).is_retryable());
        assert!(CinemaError::Stream(StreamError::Enable(refused())).is_retryable());
        assert!(CinemaError::SessionActive(SessionId(1)).is_retryable());
    }

    #[test]
    fn test_setup_faults_are_not_retryable() {
        assert!(!CinemaError::Fixture(FixtureError::Unauthorized).is_retryable());
        assert!(!CinemaError::Topology(TopologyError::TooFewPanels { found: 2 }).is_retryable());
        assert!(!CinemaError::ListenAddress("bogus".to_string()).is_retryable());
        assert!(!CinemaError::ZoneMismatch {
            configured: 7,
            ring: 3
        }
        .is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = CinemaError::SessionActive(SessionId(4));
        assert_eq!(err.to_string(), "Session already active: session #4");

        let err = CinemaError::Topology(TopologyError::TooFewPanels { found: 1 });
        assert!(err.to_string().contains("at least 3"));
    }
}
