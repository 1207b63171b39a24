//! Panel topology: a ring of panels closed by a lower and an upper anchor.

use crate::fixture::{FixtureApi, FixtureError, PanelId};
use thiserror::Error;
use tracing::info;

/// Smallest layout with distinct lower anchor, ring and upper anchor
pub const MIN_PANELS: usize = 3;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Fixture reported {found} panels, at least 3 are required")]
    TooFewPanels { found: usize },
    #[error("Failed to query panel layout: {0}")]
    Query(#[from] FixtureError),
}

/// Panel identifiers in the fixture's position order.
///
/// The first panel is the lower anchor, the last the upper anchor, and the
/// panels in between form the ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelTopology {
    panels: Vec<PanelId>,
}

impl PanelTopology {
    pub fn new(panels: Vec<PanelId>) -> Result<Self, TopologyError> {
        if panels.len() < MIN_PANELS {
            return Err(TopologyError::TooFewPanels {
                found: panels.len(),
            });
        }
        Ok(Self { panels })
    }

    /// Query the fixture's layout and build the topology from it
    pub async fn resolve(api: &dyn FixtureApi) -> Result<Self, TopologyError> {
        let layout = api.panel_layout().await?;
        let panels: Vec<PanelId> = layout.iter().map(|p| p.panel_id).collect();
        let topology = Self::new(panels)?;

        info!(
            "Resolved topology: lower={} ring={:?} upper={}",
            topology.lower_anchor(),
            topology.ring(),
            topology.upper_anchor()
        );
        Ok(topology)
    }

    pub fn panels(&self) -> &[PanelId] {
        &self.panels
    }

    pub fn lower_anchor(&self) -> PanelId {
        self.panels[0]
    }

    pub fn upper_anchor(&self) -> PanelId {
        self.panels[self.panels.len() - 1]
    }

    pub fn ring(&self) -> &[PanelId] {
        &self.panels[1..self.panels.len() - 1]
    }

    pub fn ring_first(&self) -> PanelId {
        self.panels[1]
    }

    pub fn ring_last(&self) -> PanelId {
        self.panels[self.panels.len() - 2]
    }
}
