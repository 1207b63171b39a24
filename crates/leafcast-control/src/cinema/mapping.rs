//! Zone to panel mapping.
//!
//! Zone `i` drives ring panel `i`. The two anchors usually sit on the same
//! vertical edge as the first and last ring panel, so they mirror those zones:
//! zone 0 also drives the lower anchor and zone N-1 the upper anchor.

use super::topology::PanelTopology;
use crate::fixture::PanelId;

/// Immutable zone index -> panel set table for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneMapping {
    zones: Vec<Vec<PanelId>>,
}

fn push_unique(targets: &mut Vec<PanelId>, panel: PanelId) {
    if !targets.contains(&panel) {
        targets.push(panel);
    }
}

impl ZoneMapping {
    pub fn build(topology: &PanelTopology) -> Self {
        let ring = topology.ring();
        let last = ring.len() - 1;

        let zones = ring
            .iter()
            .enumerate()
            .map(|(zone, &panel)| {
                let mut targets = Vec::with_capacity(3);
                // Both rules apply to the same zone when the ring has one panel
                if zone == 0 {
                    push_unique(&mut targets, topology.lower_anchor());
                }
                if zone == last {
                    push_unique(&mut targets, topology.upper_anchor());
                }
                push_unique(&mut targets, panel);
                targets
            })
            .collect();

        Self { zones }
    }

    /// Number of zones the mapping covers (the ring length)
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Panels driven by `zone`; empty for zones outside the ring
    pub fn targets(&self, zone: usize) -> &[PanelId] {
        self.zones.get(zone).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &[PanelId])> {
        self.zones.iter().enumerate().map(|(i, t)| (i, t.as_slice()))
    }
}
