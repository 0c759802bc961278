//! UDP transport and name-resolution abstraction.
//!
//! The engine never touches `std::net` directly; it talks to [`Network`] and
//! [`UdpTransport`], so tests substitute scripted implementations and a host
//! can route queries through whatever stack it has.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

use crate::error::{TransportError, UnknownHostError};
use crate::time::Duration;

/// A blocking UDP socket with a per-receive timeout.
///
/// At most one receive may be outstanding at a time. `close` is idempotent
/// and safe to call from another thread while a receive is blocked; it does
/// not interrupt an in-flight receive, it only makes later operations fail.
pub trait UdpTransport {
    /// The local address the socket is bound to.
    ///
    /// # Errors
    ///
    /// Fails if the socket is closed or the address cannot be read.
    fn local_addr(&self) -> Result<SocketAddr, TransportError>;

    /// Sets the deadline applied to each subsequent receive.
    ///
    /// # Errors
    ///
    /// Fails if `timeout` is not positive or the socket rejects it.
    fn set_read_timeout(&self, timeout: Duration) -> Result<(), TransportError>;

    /// Sends one datagram to `addr`. Blocking.
    ///
    /// # Errors
    ///
    /// Fails if the socket is closed, the datagram is truncated, or the
    /// underlying send fails.
    fn send(&self, buf: &[u8], addr: SocketAddr) -> Result<(), TransportError>;

    /// Receives one datagram. Blocking, bounded by the read timeout.
    ///
    /// # Errors
    ///
    /// [`TransportError::Timeout`] when the deadline expires; other variants
    /// for socket failures.
    fn recv(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError>;

    /// Marks the socket closed. Idempotent.
    fn close(&self);

    fn is_closed(&self) -> bool;
}

/// Name resolution plus socket creation.
pub trait Network {
    /// Resolves `host` to an ordered address list. The order is the order in
    /// which a clustered operation will try the addresses.
    ///
    /// # Errors
    ///
    /// [`UnknownHostError`] if the name does not resolve.
    fn get_all_by_name(&self, host: &str) -> Result<Vec<IpAddr>, UnknownHostError>;

    /// Opens a fresh unconnected UDP socket bound to an ephemeral port.
    ///
    /// # Errors
    ///
    /// Fails if the socket cannot be created or bound.
    fn create_udp_socket(&self) -> Result<Box<dyn UdpTransport>, TransportError>;
}

/// The `std::net` implementation of [`Network`].
#[derive(Debug, Default, Clone, Copy)]
pub struct StdNetwork;

impl Network for StdNetwork {
    fn get_all_by_name(&self, host: &str) -> Result<Vec<IpAddr>, UnknownHostError> {
        // Port 0 satisfies ToSocketAddrs; only the addresses matter here.
        let addrs = (host, 0u16)
            .to_socket_addrs()
            .map_err(|err| UnknownHostError::new(host, Some(err)))?;
        let ips: Vec<IpAddr> = addrs.map(|addr| addr.ip()).collect();
        if ips.is_empty() {
            return Err(UnknownHostError::new(host, None));
        }
        debug!("resolved {host} to {ips:?}");
        Ok(ips)
    }

    fn create_udp_socket(&self) -> Result<Box<dyn UdpTransport>, TransportError> {
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(TransportError::from_io)?;
        Ok(Box::new(StdUdpSocket {
            socket,
            closed: AtomicBool::new(false),
        }))
    }
}

/// [`UdpTransport`] over [`std::net::UdpSocket`].
#[derive(Debug)]
pub struct StdUdpSocket {
    socket: UdpSocket,
    closed: AtomicBool,
}

impl StdUdpSocket {
    fn check_open(&self) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        Ok(())
    }
}

impl UdpTransport for StdUdpSocket {
    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        self.check_open()?;
        self.socket.local_addr().map_err(TransportError::from_io)
    }

    fn set_read_timeout(&self, timeout: Duration) -> Result<(), TransportError> {
        self.check_open()?;
        let Some(std_timeout) = timeout.to_std_duration().filter(|t| !t.is_zero()) else {
            return Err(TransportError::from_io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "read timeout must be positive",
            )));
        };
        self.socket
            .set_read_timeout(Some(std_timeout))
            .map_err(TransportError::from_io)
    }

    fn send(&self, buf: &[u8], addr: SocketAddr) -> Result<(), TransportError> {
        self.check_open()?;
        let sent = self
            .socket
            .send_to(buf, addr)
            .map_err(TransportError::from_io)?;
        if sent != buf.len() {
            return Err(TransportError::from_io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("sent {sent} of {} bytes", buf.len()),
            )));
        }
        Ok(())
    }

    fn recv(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        self.check_open()?;
        self.socket.recv_from(buf).map_err(TransportError::from_io)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
