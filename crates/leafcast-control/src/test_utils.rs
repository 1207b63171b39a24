//! In-process fixture used by unit and integration tests.

#![cfg(any(test, feature = "test-utils"))]

use crate::fixture::stream::protocol::decode_panel_updates;
use crate::fixture::{FixtureApi, FixtureError, PanelId, PanelPosition, PanelStream, Rgb};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Datagrams captured by a [`RecordingStream`]
#[derive(Clone, Default)]
pub struct StreamLog {
    datagrams: Arc<Mutex<Vec<Vec<u8>>>>,
    closed: Arc<AtomicBool>,
}

impl StreamLog {
    pub fn datagrams(&self) -> Vec<Vec<u8>> {
        self.datagrams.lock().clone()
    }

    /// Every panel write in send order
    pub fn updates(&self) -> Vec<(PanelId, Rgb)> {
        self.datagrams
            .lock()
            .iter()
            .filter_map(|d| decode_panel_updates(d))
            .flatten()
            .map(|(panel, color, _)| (panel, color))
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

enum Behaviour {
    Record,
    FailAfter(usize),
    Hang,
}

/// Stream that records datagrams instead of sending them
pub struct RecordingStream {
    log: StreamLog,
    behaviour: Behaviour,
}

impl RecordingStream {
    pub fn new() -> (Self, StreamLog) {
        Self::with_behaviour(Behaviour::Record)
    }

    /// Accept `n` datagrams, then fail every send
    pub fn failing_after(n: usize) -> (Self, StreamLog) {
        Self::with_behaviour(Behaviour::FailAfter(n))
    }

    /// Never complete a send
    pub fn hanging() -> (Self, StreamLog) {
        Self::with_behaviour(Behaviour::Hang)
    }

    fn with_behaviour(behaviour: Behaviour) -> (Self, StreamLog) {
        let log = StreamLog::default();
        (
            Self {
                log: log.clone(),
                behaviour,
            },
            log,
        )
    }
}

#[async_trait]
impl PanelStream for RecordingStream {
    async fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        match self.behaviour {
            Behaviour::Hang => std::future::pending::<()>().await,
            Behaviour::FailAfter(n) if self.log.datagrams.lock().len() >= n => {
                return Err(io::Error::from(io::ErrorKind::ConnectionRefused));
            }
            _ => {}
        }
        self.log.datagrams.lock().push(datagram.to_vec());
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.log.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Which stream `open_stream` hands out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Record,
    FailAfter(usize),
    Hang,
}

/// Fixture that records power and brightness commands
pub struct MockFixture {
    panels: Vec<PanelId>,
    power_log: Mutex<Vec<bool>>,
    brightness_log: Mutex<Vec<u8>>,
    stream_log: Mutex<Option<StreamLog>>,
    streams_opened: Mutex<usize>,
    stream_mode: Mutex<StreamMode>,
    fail_layout: AtomicBool,
    fail_power_on: AtomicBool,
    fail_stream: AtomicBool,
}

impl MockFixture {
    pub fn new(panels: &[u16]) -> Self {
        Self {
            panels: panels.iter().copied().map(PanelId).collect(),
            power_log: Mutex::new(Vec::new()),
            brightness_log: Mutex::new(Vec::new()),
            stream_log: Mutex::new(None),
            streams_opened: Mutex::new(0),
            stream_mode: Mutex::new(StreamMode::Record),
            fail_layout: AtomicBool::new(false),
            fail_power_on: AtomicBool::new(false),
            fail_stream: AtomicBool::new(false),
        }
    }

    pub fn set_stream_mode(&self, mode: StreamMode) {
        *self.stream_mode.lock() = mode;
    }

    pub fn fail_layout(&self, fail: bool) {
        self.fail_layout.store(fail, Ordering::SeqCst);
    }

    pub fn fail_power_on(&self, fail: bool) {
        self.fail_power_on.store(fail, Ordering::SeqCst);
    }

    pub fn fail_stream(&self, fail: bool) {
        self.fail_stream.store(fail, Ordering::SeqCst);
    }

    pub fn power_log(&self) -> Vec<bool> {
        self.power_log.lock().clone()
    }

    /// Last power command; `None` if never switched
    pub fn is_powered(&self) -> Option<bool> {
        self.power_log.lock().last().copied()
    }

    pub fn brightness_log(&self) -> Vec<u8> {
        self.brightness_log.lock().clone()
    }

    pub fn streams_opened(&self) -> usize {
        *self.streams_opened.lock()
    }

    /// Log of the most recently opened stream
    pub fn stream_log(&self) -> Option<StreamLog> {
        self.stream_log.lock().clone()
    }
}

#[async_trait]
impl FixtureApi for MockFixture {
    async fn panel_layout(&self) -> Result<Vec<PanelPosition>, FixtureError> {
        if self.fail_layout.load(Ordering::SeqCst) {
            return Err(FixtureError::Unauthorized);
        }
        Ok(self
            .panels
            .iter()
            .enumerate()
            .map(|(i, &panel_id)| PanelPosition {
                panel_id,
                x: i as i32 * 150,
                y: 0,
                orientation: 0,
                shape_type: 0,
            })
            .collect())
    }

    async fn set_power(&self, on: bool) -> Result<(), FixtureError> {
        if on && self.fail_power_on.load(Ordering::SeqCst) {
            return Err(FixtureError::Api {
                status: 500,
                message: "power on failed".to_string(),
            });
        }
        self.power_log.lock().push(on);
        Ok(())
    }

    async fn set_brightness(&self, level: u8) -> Result<(), FixtureError> {
        self.brightness_log.lock().push(level);
        Ok(())
    }

    async fn open_stream(&self) -> Result<Box<dyn PanelStream>, FixtureError> {
        if self.fail_stream.load(Ordering::SeqCst) {
            return Err(FixtureError::Io(io::Error::from(
                io::ErrorKind::ConnectionRefused,
            )));
        }
        let (stream, log) = match *self.stream_mode.lock() {
            StreamMode::Record => RecordingStream::new(),
            StreamMode::FailAfter(n) => RecordingStream::failing_after(n),
            StreamMode::Hang => RecordingStream::hanging(),
        };
        *self.stream_log.lock() = Some(log);
        *self.streams_opened.lock() += 1;
        Ok(Box::new(stream))
    }
}
