//! Leafcast Control - Ambient colour streaming to panel light fixtures
//!
//! This crate bridges an ambient-light video analyser, which sends one RGB
//! triple per screen zone over UDP, to a networked multi-panel light fixture:
//! - **Fixture**: REST client for power, brightness, panel layout and pairing,
//!   plus the external-control UDP stream codec
//! - **Cinema mode**: topology resolution, datagram decoding, zone to panel
//!   mapping and the cancellable streaming session
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use leafcast_control::cinema::CinemaMode;
//! use leafcast_core::LeafcastConfig;
//!
//! # async fn run() -> leafcast_control::Result<()> {
//! let config = LeafcastConfig::load()?;
//! let cinema = CinemaMode::from_config(&config)?;
//!
//! let session = cinema.start_cinema_mode().await?;
//! println!("streaming as {}", session);
//! cinema.stop_cinema_mode().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`fixture`] - Fixture REST API and stream protocol
//! - [`cinema`] - Cinema mode streaming engine
//! - [`error`] - Error types

#![allow(missing_docs)]

/// Cinema mode streaming engine
pub mod cinema;
/// Error types
pub mod error;
/// Light fixture integration
pub mod fixture;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use cinema::{CinemaController, CinemaMode, SessionId, SessionState, SessionStatus};
pub use error::{CinemaError, Result};
pub use fixture::{FixtureApi, FixtureClient, PanelId, Rgb};
