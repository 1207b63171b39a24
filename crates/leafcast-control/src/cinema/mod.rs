//! Cinema mode streaming engine
//!
//! Receives ambient colour datagrams, one RGB triple per screen zone, and
//! forwards each zone's colour to the fixture panels it maps to.
//!
//! ## Topology
//!
//! The fixture's panels, in position order, form a ring closed by two anchors:
//!
//! ```text
//! [lower] [ring 0] [ring 1] ... [ring N-1] [upper]
//! ```
//!
//! Zone `i` drives ring panel `i`. Zone 0 additionally drives the lower anchor
//! and zone N-1 the upper anchor.
//!
//! ## Session lifecycle
//!
//! `Idle -> Starting -> Streaming -> Stopping -> Idle`
//!
//! - Setup failures return from `start` and leave the fixture powered off.
//! - Receive timeouts are retried, malformed datagrams are dropped.
//! - A failed panel write ends the session.
//! - Every session ends with the fixture powered off and the socket closed.

pub mod controller;
pub mod dispatcher;
pub mod frame;
pub mod listener;
pub mod mapping;
pub mod policy;
pub mod session;
pub mod topology;

pub use controller::{CinemaController, CinemaMode};
pub use dispatcher::{DispatchError, StreamDispatcher, StreamError};
pub use frame::{Frame, FrameDecoder, MalformedFrame};
pub use mapping::ZoneMapping;
pub use policy::{Disposition, ErrorPolicy, LoopError, ShutdownError};
pub use session::{SessionId, SessionState, SessionStats, SessionStatus};
pub use topology::{PanelTopology, TopologyError};
