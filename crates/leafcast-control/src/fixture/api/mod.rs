//! Fixture REST API

pub mod client;
pub mod error;

use async_trait::async_trait;

use super::models::PanelPosition;
use super::stream::PanelStream;
use error::FixtureError;

/// Operations the cinema engine needs from a fixture.
///
/// [`client::FixtureClient`] talks to real hardware; tests substitute an
/// in-process implementation.
#[async_trait]
pub trait FixtureApi: Send + Sync {
    /// Panel layout in the fixture's position order
    async fn panel_layout(&self) -> Result<Vec<PanelPosition>, FixtureError>;

    /// Switch the fixture on or off
    async fn set_power(&self, on: bool) -> Result<(), FixtureError>;

    /// Set global brightness (0-100)
    async fn set_brightness(&self, level: u8) -> Result<(), FixtureError>;

    /// Put the fixture into external-control mode and return a stream that
    /// accepts per-panel colour datagrams
    async fn open_stream(&self) -> Result<Box<dyn PanelStream>, FixtureError>;
}
