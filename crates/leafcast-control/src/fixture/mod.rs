//! Light fixture integration
//!
//! The fixture is a networked panel light controlled through a small REST API
//! (power, brightness, layout, pairing) and, while cinema mode runs, through the
//! external-control UDP stream that accepts direct per-panel colour writes.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use leafcast_control::fixture::{FixtureApi, FixtureClient, PanelId, PanelStream, Rgb};
//! use leafcast_core::FixtureConfig;
//!
//! # async fn run() -> Result<(), leafcast_control::fixture::FixtureError> {
//! let client = FixtureClient::new(FixtureConfig::new("192.168.1.20", "token"))?;
//! client.set_power(true).await?;
//!
//! let mut stream = client.open_stream().await?;
//! let datagram = leafcast_control::fixture::stream::protocol::encode_panel_update(
//!     PanelId(107),
//!     Rgb::new(255, 128, 0),
//!     1,
//! );
//! stream.send(&datagram).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod models;
pub mod stream;

pub use api::client::FixtureClient;
pub use api::error::FixtureError;
pub use api::FixtureApi;
pub use models::{PanelId, PanelPosition, Rgb};
pub use stream::{PanelStream, UdpPanelStream};
