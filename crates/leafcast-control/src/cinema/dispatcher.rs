//! Pushes zone colours to panels over the external control stream.

use super::frame::Frame;
use super::mapping::ZoneMapping;
use crate::fixture::stream::protocol;
use crate::fixture::{FixtureApi, FixtureError, PanelId, PanelStream, Rgb};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Failed to enable external control: {0}")]
    Enable(#[from] FixtureError),
}

/// A colour write to one panel failed; the fixture is presumed unreachable.
#[derive(Error, Debug)]
#[error("Failed to set panel {panel}: {source}")]
pub struct DispatchError {
    pub panel: PanelId,
    #[source]
    pub source: std::io::Error,
}

/// Holds the open stream and applies colours panel by panel.
///
/// Every `set_panel` call sends its own datagram straight away.
pub struct StreamDispatcher {
    stream: Box<dyn PanelStream>,
    transition_time: u16,
}

impl StreamDispatcher {
    /// Switch the fixture to external control and take ownership of the stream
    pub async fn open(api: &dyn FixtureApi, transition_time: u16) -> Result<Self, StreamError> {
        let stream = api.open_stream().await?;
        Ok(Self::with_stream(stream, transition_time))
    }

    pub fn with_stream(stream: Box<dyn PanelStream>, transition_time: u16) -> Self {
        Self {
            stream,
            transition_time,
        }
    }

    pub async fn set_panel(&mut self, panel: PanelId, color: Rgb) -> Result<(), DispatchError> {
        let datagram = protocol::encode_panel_update(panel, color, self.transition_time);
        self.stream
            .send(&datagram)
            .await
            .map_err(|source| DispatchError { panel, source })
    }

    /// Apply every zone of `frame` to its mapped panels.
    ///
    /// Stops at the first failed write. Returns the number of panel writes.
    pub async fn apply(
        &mut self,
        mapping: &ZoneMapping,
        frame: &Frame,
    ) -> Result<usize, DispatchError> {
        let mut writes = 0;
        for (zone, targets) in mapping.iter() {
            let Some(color) = frame.zone(zone) else {
                break;
            };
            for &panel in targets {
                self.set_panel(panel, color).await?;
                writes += 1;
            }
        }
        Ok(writes)
    }

    pub async fn close(mut self) {
        if let Err(e) = self.stream.close().await {
            tracing::warn!("Failed to close external control stream: {}", e);
        }
    }
}
