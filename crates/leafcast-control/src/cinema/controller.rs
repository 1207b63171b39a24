use super::dispatcher::StreamDispatcher;
use super::frame::FrameDecoder;
use super::listener;
use super::mapping::ZoneMapping;
use super::policy::ShutdownError;
use super::session::{
    power_off_quietly, SessionId, SessionRunner, SessionState, SessionStats, SessionStatus,
};
use super::topology::PanelTopology;
use crate::error::{CinemaError, Result};
use crate::fixture::{FixtureApi, FixtureClient};
use leafcast_core::{CinemaConfig, LeafcastConfig};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The loop task of a started session
struct ActiveSession {
    id: SessionId,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
    stop_timeout: Duration,
}

/// Everything produced by a successful setup phase
struct Prepared {
    mapping: ZoneMapping,
    dispatcher: StreamDispatcher,
    socket: UdpSocket,
}

/// Owns the cinema mode session lifecycle.
///
/// At most one session runs at a time; `start` while one is active is
/// rejected with [`CinemaError::SessionActive`].
pub struct CinemaController {
    api: Arc<dyn FixtureApi>,
    fixture_address: Option<String>,
    /// Held for the whole of `start` and while joining in `stop`
    session: Mutex<Option<ActiveSession>>,
    /// Most recent session and its cancellation token, readable without the session lock
    current: parking_lot::Mutex<Option<(SessionId, CancellationToken)>>,
    state: Arc<watch::Sender<SessionState>>,
    stats: parking_lot::Mutex<Arc<SessionStats>>,
    listen_addr: parking_lot::Mutex<Option<SocketAddr>>,
    next_id: AtomicU64,
}

impl CinemaController {
    pub fn new(api: Arc<dyn FixtureApi>) -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self {
            api,
            fixture_address: None,
            session: Mutex::new(None),
            current: parking_lot::Mutex::new(None),
            state: Arc::new(state),
            stats: parking_lot::Mutex::new(Arc::new(SessionStats::default())),
            listen_addr: parking_lot::Mutex::new(None),
            next_id: AtomicU64::new(0),
        }
    }

    /// Controller backed by the REST client; remembers the fixture address
    /// for `listen_address = "auto"`
    pub fn for_client(client: FixtureClient) -> Self {
        let address = client.config().address.clone();
        Self::new(Arc::new(client)).with_fixture_address(address)
    }

    pub fn with_fixture_address(mut self, address: impl Into<String>) -> Self {
        self.fixture_address = Some(address.into());
        self
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn is_active(&self) -> bool {
        self.state() != SessionState::Idle
    }

    pub fn status(&self) -> SessionStatus {
        let state = self.state();
        let session_id = self.current.lock().as_ref().map(|(id, _)| *id);
        let listen_addr = *self.listen_addr.lock();
        let stats = self.stats.lock().clone();
        SessionStatus::snapshot(state, session_id, listen_addr, &stats)
    }

    /// Start a streaming session.
    ///
    /// Resolves the topology, prepares the fixture, opens the stream and binds
    /// the listener before returning. The loop then runs in a background task.
    pub async fn start(&self, config: &CinemaConfig) -> Result<SessionId> {
        config.validate()?;

        let mut session = self.session.lock().await;
        if let Some(active) = session.as_ref() {
            if !active.handle.is_finished() {
                return Err(CinemaError::SessionActive(active.id));
            }
        }
        // A session that ended on its own has already shut down; just reap it
        if let Some(finished) = session.take() {
            self.join(finished).await;
        }

        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let cancel = CancellationToken::new();
        let stats = Arc::new(SessionStats::default());
        *self.current.lock() = Some((id, cancel.clone()));
        *self.stats.lock() = stats.clone();
        *self.listen_addr.lock() = None;
        self.state.send_replace(SessionState::Starting);
        info!("Starting cinema mode {}", id);

        let prepared = match self.prepare(config, &cancel).await {
            Ok(prepared) => prepared,
            Err(e) => {
                error!("Cinema mode {} failed to start: {}", id, e);
                stats.record_error(e.to_string());
                self.state.send_replace(SessionState::Idle);
                return Err(e);
            }
        };

        *self.listen_addr.lock() = prepared.socket.local_addr().ok();

        let runner = SessionRunner {
            id,
            socket: prepared.socket,
            decoder: FrameDecoder::new(config.zone_count),
            mapping: prepared.mapping,
            dispatcher: prepared.dispatcher,
            api: self.api.clone(),
            cancel: cancel.clone(),
            receive_timeout: config.receive_timeout(),
            state: self.state.clone(),
            stats,
        };

        self.state.send_replace(SessionState::Streaming);
        let handle = tokio::spawn(runner.run());

        *session = Some(ActiveSession {
            id,
            cancel,
            handle,
            stop_timeout: config.stop_timeout(),
        });
        Ok(id)
    }

    /// Stop the active session and wait for it to shut down.
    ///
    /// No-op when idle.
    pub async fn stop(&self) {
        self.stop_matching(None).await;
    }

    /// Stop only if `id` is still the active session
    pub async fn stop_session(&self, id: SessionId) {
        self.stop_matching(Some(id)).await;
    }

    async fn stop_matching(&self, target: Option<SessionId>) {
        // Cancel first so a session that is still starting gives up the lock quickly
        let token = match self.current.lock().as_ref() {
            Some((id, token)) if target.map_or(true, |t| t == *id) => token.clone(),
            _ => {
                debug!("Stop ignored: no matching session");
                return;
            }
        };
        token.cancel();

        let mut session = self.session.lock().await;
        let Some(active) = session.take() else {
            return;
        };
        if target.is_some_and(|t| t != active.id) {
            *session = Some(active);
            return;
        }

        info!("Stopping cinema mode {}", active.id);
        self.join(active).await;
    }

    /// Wait for the loop task with a bounded wait, forcing shutdown if it hangs
    async fn join(&self, mut active: ActiveSession) {
        active.cancel.cancel();

        let failure = match tokio::time::timeout(active.stop_timeout, &mut active.handle).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) if e.is_panic() => Some(ShutdownError::Panicked),
            Ok(Err(_)) => None,
            Err(_) => {
                active.handle.abort();
                Some(ShutdownError::JoinTimeout(active.stop_timeout))
            }
        };

        if let Some(e) = failure {
            warn!("{} for {}; powering off from controller", e, active.id);
            self.stats.lock().record_error(e.to_string());
            power_off_quietly(self.api.as_ref()).await;
            self.state.send_replace(SessionState::Idle);
        }
        debug!("{} joined", active.id);
    }

    async fn prepare(&self, config: &CinemaConfig, cancel: &CancellationToken) -> Result<Prepared> {
        let api = self.api.as_ref();

        let topology = PanelTopology::resolve(api).await?;
        let mapping = ZoneMapping::build(&topology);
        // Every datagram must carry exactly one colour per ring panel
        if mapping.zone_count() != config.zone_count {
            return Err(CinemaError::ZoneMismatch {
                configured: config.zone_count,
                ring: mapping.zone_count(),
            });
        }

        let listen_addr =
            listener::resolve_listen_addr(config, self.fixture_address.as_deref()).await?;

        match self.prepare_fixture(config, cancel, listen_addr).await {
            Ok((dispatcher, socket)) => Ok(Prepared {
                mapping,
                dispatcher,
                socket,
            }),
            Err(e) => {
                // The fixture may already be on; leave it dark
                power_off_quietly(api).await;
                Err(e)
            }
        }
    }

    async fn prepare_fixture(
        &self,
        config: &CinemaConfig,
        cancel: &CancellationToken,
        listen_addr: SocketAddr,
    ) -> Result<(StreamDispatcher, UdpSocket)> {
        let api = self.api.as_ref();

        api.set_power(true).await?;
        api.set_brightness(config.brightness).await?;

        tokio::select! {
            _ = cancel.cancelled() => return Err(CinemaError::Cancelled),
            _ = tokio::time::sleep(config.settle_delay()) => {}
        }

        let dispatcher = StreamDispatcher::open(api, config.transition_time).await?;

        let socket = match listener::bind(listen_addr).await {
            Ok(socket) => socket,
            Err(e) => {
                dispatcher.close().await;
                return Err(e);
            }
        };

        if cancel.is_cancelled() {
            dispatcher.close().await;
            return Err(CinemaError::Cancelled);
        }
        Ok((dispatcher, socket))
    }
}

impl Drop for CinemaController {
    fn drop(&mut self) {
        // The loop task powers the fixture off once it sees the token
        if let Some((_, token)) = self.current.get_mut().as_ref() {
            token.cancel();
        }
    }
}

/// Stored-configuration control surface for external callers
pub struct CinemaMode {
    controller: CinemaController,
    config: CinemaConfig,
}

impl CinemaMode {
    pub fn new(controller: CinemaController, config: CinemaConfig) -> Self {
        Self { controller, config }
    }

    /// Build from a loaded configuration using the REST client
    pub fn from_config(config: &LeafcastConfig) -> Result<Self> {
        config.validate()?;
        let client = FixtureClient::new(config.fixture.clone())?;
        Ok(Self::new(
            CinemaController::for_client(client),
            config.cinema.clone(),
        ))
    }

    pub async fn start_cinema_mode(&self) -> Result<SessionId> {
        self.controller.start(&self.config).await
    }

    pub async fn stop_cinema_mode(&self) {
        self.controller.stop().await;
    }

    pub fn status(&self) -> SessionStatus {
        self.controller.status()
    }

    pub fn controller(&self) -> &CinemaController {
        &self.controller
    }
}
