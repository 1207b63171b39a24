use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric panel identifier as reported by the fixture's layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PanelId(pub u16);

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 8-bit RGB colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A panel entry from the fixture's layout, in the order the fixture reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PanelPosition {
    #[serde(rename = "panelId")]
    pub panel_id: PanelId,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    /// Orientation in degrees
    #[serde(default, rename = "o")]
    pub orientation: i32,
    #[serde(default, rename = "shapeType")]
    pub shape_type: u8,
}
