//! External control (v2) datagram encoding.

use crate::fixture::models::{PanelId, Rgb};

/// UDP port the fixture listens on for v2 external control
pub const EXT_CONTROL_PORT: u16 = 60222;

/// Bytes per panel entry
pub const PANEL_ENTRY_LEN: usize = 8;

/// Creates an external control datagram for a set of panels.
///
/// Format (all multi-byte fields big-endian):
/// - 2 bytes: number of panel entries
/// - per panel, 8 bytes:
///   - 2 bytes: panel ID
///   - 1 byte each: R, G, B, W (W unused, always 0)
///   - 2 bytes: transition time in tenths of a second
pub fn encode_panel_updates(updates: &[(PanelId, Rgb)], transition_time: u16) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(2 + updates.len() * PANEL_ENTRY_LEN);

    buffer.extend_from_slice(&(updates.len() as u16).to_be_bytes());

    for (panel, color) in updates {
        buffer.extend_from_slice(&panel.0.to_be_bytes());
        buffer.extend_from_slice(&[color.r, color.g, color.b, 0x00]);
        buffer.extend_from_slice(&transition_time.to_be_bytes());
    }

    buffer
}

/// Creates a datagram that sets a single panel
pub fn encode_panel_update(panel: PanelId, color: Rgb, transition_time: u16) -> Vec<u8> {
    encode_panel_updates(&[(panel, color)], transition_time)
}

/// Parses a datagram produced by [`encode_panel_updates`].
///
/// Returns `None` if the length does not match the declared entry count.
#[cfg(any(test, feature = "test-utils"))]
pub fn decode_panel_updates(datagram: &[u8]) -> Option<Vec<(PanelId, Rgb, u16)>> {
    if datagram.len() < 2 {
        return None;
    }
    let count = u16::from_be_bytes([datagram[0], datagram[1]]) as usize;
    let body = &datagram[2..];
    if body.len() != count * PANEL_ENTRY_LEN {
        return None;
    }

    let entries = body
        .chunks_exact(PANEL_ENTRY_LEN)
        .map(|entry| {
            let panel = PanelId(u16::from_be_bytes([entry[0], entry[1]]));
            let color = Rgb::new(entry[2], entry[3], entry[4]);
            let transition = u16::from_be_bytes([entry[6], entry[7]]);
            (panel, color, transition)
        })
        .collect();
    Some(entries)
}
