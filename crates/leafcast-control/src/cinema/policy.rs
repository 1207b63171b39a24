//! Failure classification for the streaming loop.

use super::dispatcher::DispatchError;
use super::frame::MalformedFrame;
use crate::fixture::FixtureError;
use thiserror::Error;

/// Errors raised inside a running session
#[derive(Error, Debug)]
pub enum LoopError {
    #[error("No datagram within the receive timeout")]
    ReceiveTimeout,
    #[error("Socket receive failed: {0}")]
    Receive(#[source] std::io::Error),
    #[error(transparent)]
    Malformed(#[from] MalformedFrame),
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Errors during teardown. Logged, never propagated.
#[derive(Error, Debug)]
pub enum ShutdownError {
    #[error("Failed to power off fixture: {0}")]
    PowerOff(#[source] FixtureError),
    #[error("Session loop did not finish within {0:?}")]
    JoinTimeout(std::time::Duration),
    #[error("Session loop panicked")]
    Panicked,
}

/// What the loop does after an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Check cancellation and receive again
    Retry,
    /// Drop the current frame and continue
    Skip,
    /// End the session and shut down
    Abort,
}

pub struct ErrorPolicy;

impl ErrorPolicy {
    pub fn classify(error: &LoopError) -> Disposition {
        match error {
            LoopError::ReceiveTimeout => Disposition::Retry,
            LoopError::Malformed(_) => Disposition::Skip,
            LoopError::Receive(_) | LoopError::Dispatch(_) => Disposition::Abort,
        }
    }
}
