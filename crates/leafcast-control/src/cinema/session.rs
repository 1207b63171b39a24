//! One run of the receive -> decode -> map -> dispatch loop.

use super::dispatcher::StreamDispatcher;
use super::frame::FrameDecoder;
use super::mapping::ZoneMapping;
use super::policy::{Disposition, ErrorPolicy, LoopError, ShutdownError};
use crate::fixture::FixtureApi;
use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// Typical Ethernet MTU; anything larger than the expected frame is rejected anyway
const RECV_BUFFER_LEN: usize = 1500;

/// Identifies one streaming session of a controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session #{}", self.0)
    }
}

/// Lifecycle of the cinema mode controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Streaming,
    Stopping,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Starting => write!(f, "starting"),
            Self::Streaming => write!(f, "streaming"),
            Self::Stopping => write!(f, "stopping"),
        }
    }
}

/// Counters written by the loop and read by status queries
#[derive(Debug, Default)]
pub struct SessionStats {
    frames_received: AtomicU64,
    frames_dispatched: AtomicU64,
    frames_dropped: AtomicU64,
    panel_writes: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl SessionStats {
    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn frames_dispatched(&self) -> u64 {
        self.frames_dispatched.load(Ordering::Relaxed)
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped.load(Ordering::Relaxed)
    }

    pub fn panel_writes(&self) -> u64 {
        self.panel_writes.load(Ordering::Relaxed)
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub(crate) fn record_error(&self, message: String) {
        *self.last_error.lock() = Some(message);
    }
}

/// Snapshot returned by status queries
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub state: SessionState,
    /// Current session, or the most recent one when idle
    pub session_id: Option<SessionId>,
    /// Address the colour listener is bound to
    pub listen_addr: Option<SocketAddr>,
    pub frames_received: u64,
    pub frames_dispatched: u64,
    pub frames_dropped: u64,
    pub panel_writes: u64,
    pub last_error: Option<String>,
}

impl SessionStatus {
    pub(crate) fn snapshot(
        state: SessionState,
        session_id: Option<SessionId>,
        listen_addr: Option<SocketAddr>,
        stats: &SessionStats,
    ) -> Self {
        Self {
            state,
            session_id,
            listen_addr,
            frames_received: stats.frames_received(),
            frames_dispatched: stats.frames_dispatched(),
            frames_dropped: stats.frames_dropped(),
            panel_writes: stats.panel_writes(),
            last_error: stats.last_error(),
        }
    }
}

/// Power the fixture off, logging instead of propagating failures
pub(crate) async fn power_off_quietly(api: &dyn FixtureApi) {
    match api.set_power(false).await {
        Ok(()) => info!("Fixture powered off"),
        Err(e) => warn!("{}", ShutdownError::PowerOff(e)),
    }
}

/// Everything the loop task owns for the lifetime of a session
pub(crate) struct SessionRunner {
    pub id: SessionId,
    pub socket: UdpSocket,
    pub decoder: FrameDecoder,
    pub mapping: ZoneMapping,
    pub dispatcher: StreamDispatcher,
    pub api: Arc<dyn FixtureApi>,
    pub cancel: CancellationToken,
    pub receive_timeout: Duration,
    pub state: Arc<watch::Sender<SessionState>>,
    pub stats: Arc<SessionStats>,
}

impl SessionRunner {
    /// Run until cancelled or a fatal error, then shut down.
    pub async fn run(self) {
        let SessionRunner {
            id,
            socket,
            decoder,
            mapping,
            mut dispatcher,
            api,
            cancel,
            receive_timeout,
            state,
            stats,
        } = self;

        info!(
            "Cinema mode {} streaming on {:?} ({} zones)",
            id,
            socket.local_addr().ok(),
            decoder.zone_count()
        );

        let mut buf = vec![0u8; RECV_BUFFER_LEN.max(decoder.frame_len() + 1)];

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Stop signal received for {}", id);
                    break;
                }
                res = tokio::time::timeout(receive_timeout, socket.recv_from(&mut buf)) => res,
            };

            let result = match received {
                Err(_) => Err(LoopError::ReceiveTimeout),
                Ok(Err(e)) => Err(LoopError::Receive(e)),
                Ok(Ok((len, from))) => {
                    stats.frames_received.fetch_add(1, Ordering::Relaxed);
                    trace!("Datagram of {} bytes from {}", len, from);
                    match decoder.decode(&buf[..len]) {
                        Ok(frame) => dispatcher
                            .apply(&mapping, &frame)
                            .await
                            .map_err(LoopError::from),
                        Err(e) => Err(LoopError::from(e)),
                    }
                }
            };

            match result {
                Ok(writes) => {
                    stats.frames_dispatched.fetch_add(1, Ordering::Relaxed);
                    stats.panel_writes.fetch_add(writes as u64, Ordering::Relaxed);
                }
                Err(e) => match ErrorPolicy::classify(&e) {
                    Disposition::Retry => {
                        trace!("{} idle: {}", id, e);
                    }
                    Disposition::Skip => {
                        stats.frames_dropped.fetch_add(1, Ordering::Relaxed);
                        warn!("{} dropped frame: {}", id, e);
                    }
                    Disposition::Abort => {
                        error!("{} aborted: {}", id, e);
                        stats.record_error(e.to_string());
                        break;
                    }
                },
            }
        }

        state.send_replace(SessionState::Stopping);

        power_off_quietly(api.as_ref()).await;
        dispatcher.close().await;
        drop(socket);
        debug!("{} listen socket closed", id);

        info!(
            "Cinema mode {} ended ({} frames dispatched, {} dropped)",
            id,
            stats.frames_dispatched(),
            stats.frames_dropped()
        );
        state.send_replace(SessionState::Idle);
    }
}
