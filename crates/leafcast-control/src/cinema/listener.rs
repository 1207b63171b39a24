//! Listen socket for incoming colour datagrams.

use crate::error::{CinemaError, Result};
use leafcast_core::CinemaConfig;
use std::net::{IpAddr, SocketAddr};
use tokio::net::UdpSocket;

/// Placeholder address meaning "the adapter that routes to the fixture"
pub const AUTO_ADDRESS: &str = "auto";

/// Best-effort lookup of the local address used to reach `remote`.
///
/// Connecting a UDP socket sends nothing; it only asks the OS to pick a route.
pub async fn local_address_for(remote: &str) -> Result<IpAddr> {
    let target = tokio::net::lookup_host((remote, 9))
        .await
        .ok()
        .and_then(|mut addrs| addrs.next())
        .ok_or_else(|| CinemaError::ListenAddress(format!("cannot resolve {}", remote)))?;

    let bind: SocketAddr = if target.is_ipv4() {
        SocketAddr::from(([0, 0, 0, 0], 0))
    } else {
        SocketAddr::from(([0u16; 8], 0))
    };
    let route_socket = UdpSocket::bind(bind)
        .await
        .map_err(|e| CinemaError::ListenAddress(e.to_string()))?;
    route_socket
        .connect(target)
        .await
        .map_err(|e| CinemaError::ListenAddress(format!("no route to {}: {}", remote, e)))?;

    let local = route_socket
        .local_addr()
        .map_err(|e| CinemaError::ListenAddress(e.to_string()))?;
    Ok(local.ip())
}

/// Resolve the configured listen address to a socket address
pub async fn resolve_listen_addr(
    config: &CinemaConfig,
    fixture_address: Option<&str>,
) -> Result<SocketAddr> {
    let ip = if config.listen_address.eq_ignore_ascii_case(AUTO_ADDRESS) {
        let remote = fixture_address.ok_or_else(|| {
            CinemaError::ListenAddress(
                "listen_address is \"auto\" but no fixture address is known".to_string(),
            )
        })?;
        let ip = local_address_for(remote).await?;
        tracing::info!("Using local address {} for the colour listener", ip);
        ip
    } else {
        config.listen_address.parse::<IpAddr>().map_err(|e| {
            CinemaError::ListenAddress(format!("{}: {}", config.listen_address, e))
        })?
    };
    Ok(SocketAddr::new(ip, config.listen_port))
}

/// Bind the UDP listener
pub async fn bind(addr: SocketAddr) -> Result<UdpSocket> {
    UdpSocket::bind(addr).await.map_err(|source| CinemaError::Bind {
        addr: addr.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_explicit_address() {
        let config = CinemaConfig::default().with_listen("127.0.0.1", 20450);
        let addr = resolve_listen_addr(&config, None).await.unwrap();
        assert_eq!(addr, "127.0.0.1:20450".parse().unwrap());
    }

    #[tokio::test]
    async fn test_resolve_invalid_address() {
        let config = CinemaConfig::default().with_listen("not-an-ip", 20450);
        let err = resolve_listen_addr(&config, None).await.unwrap_err();
        assert!(matches!(err, CinemaError::ListenAddress(_)));
    }

    #[tokio::test]
    async fn test_auto_without_fixture_address() {
        let config = CinemaConfig::default().with_listen("auto", 20450);
        assert!(resolve_listen_addr(&config, None).await.is_err());
    }

    #[tokio::test]
    async fn test_auto_loopback_fixture() {
        let config = CinemaConfig::default().with_listen("auto", 0);
        let addr = resolve_listen_addr(&config, Some("127.0.0.1")).await.unwrap();
        assert!(addr.ip().is_loopback());
    }

    #[tokio::test]
    async fn test_bind_conflict_reports_address() {
        let first = bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let taken = first.local_addr().unwrap();

        let err = bind(taken).await.unwrap_err();
        assert!(matches!(err, CinemaError::Bind { ref addr, .. } if *addr == taken.to_string()));
    }
}
