//! External control stream
//!
//! While in external-control mode the fixture ignores its own effects engine
//! and applies colours received as UDP datagrams on [`protocol::EXT_CONTROL_PORT`].

pub mod protocol;

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// A channel that carries encoded external-control datagrams to the fixture.
#[async_trait]
pub trait PanelStream: Send {
    /// Send one encoded datagram
    async fn send(&mut self, datagram: &[u8]) -> io::Result<()>;

    /// Release the underlying transport
    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// UDP transport for the external control protocol
pub struct UdpPanelStream {
    socket: Option<UdpSocket>,
    target: SocketAddr,
}

impl UdpPanelStream {
    /// Bind an ephemeral local socket and connect it to `target`
    pub async fn connect(target: SocketAddr) -> io::Result<Self> {
        let local: SocketAddr = if target.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(target).await?;

        tracing::debug!("External control socket {} -> {}", socket.local_addr()?, target);

        Ok(Self {
            socket: Some(socket),
            target,
        })
    }
}

#[async_trait]
impl PanelStream for UdpPanelStream {
    async fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "stream closed"))?;

        let sent = socket.send(datagram).await?;
        if sent != datagram.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short send: {} of {} bytes", sent, datagram.len()),
            ));
        }
        tracing::trace!("Sent {} byte control datagram to {}", sent, self.target);
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        self.socket = None;
        Ok(())
    }
}
