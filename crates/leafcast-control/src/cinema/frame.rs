//! Ambient colour datagram decoding.
//!
//! The source sends one datagram per video frame: `zone_count` RGB triples in
//! zone order, no header and no checksum.

use crate::fixture::Rgb;
use thiserror::Error;

/// Datagram length does not match the configured zone count
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Malformed frame: expected {expected} bytes, got {actual}")]
pub struct MalformedFrame {
    pub expected: usize,
    pub actual: usize,
}

/// One decoded datagram: a colour per zone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    zones: Vec<Rgb>,
}

impl Frame {
    pub fn new(zones: Vec<Rgb>) -> Self {
        Self { zones }
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn zone(&self, index: usize) -> Option<Rgb> {
        self.zones.get(index).copied()
    }

    pub fn zones(&self) -> &[Rgb] {
        &self.zones
    }
}

/// Decodes fixed-length datagrams into frames
#[derive(Debug, Clone, Copy)]
pub struct FrameDecoder {
    zone_count: usize,
}

impl FrameDecoder {
    pub fn new(zone_count: usize) -> Self {
        Self { zone_count }
    }

    pub fn zone_count(&self) -> usize {
        self.zone_count
    }

    /// Exact datagram length this decoder accepts
    pub fn frame_len(&self) -> usize {
        self.zone_count * 3
    }

    /// Bytes `[3i, 3i+1, 3i+2]` become the red, green and blue of zone `i`.
    pub fn decode(&self, bytes: &[u8]) -> Result<Frame, MalformedFrame> {
        let expected = self.frame_len();
        if bytes.len() != expected {
            return Err(MalformedFrame {
                expected,
                actual: bytes.len(),
            });
        }

        let zones = bytes
            .chunks_exact(3)
            .map(|c| Rgb::new(c[0], c[1], c[2]))
            .collect();
        Ok(Frame { zones })
    }
}
