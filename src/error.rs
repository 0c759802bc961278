//! Error taxonomy for the query boundary.
//!
//! Everything the network can do to a query is a value: transient conditions
//! and malformed responses travel through `Result`s and tagged result
//! variants, never panics. Panics are reserved for contract violations
//! (mixing [`Ticks`](crate::time::Ticks) origins, out-of-range builder
//! inputs, an operation lying about its time budget) and arithmetic
//! overflow, which indicate programmer error.

use std::io;
use std::sync::Arc;

use thiserror::Error;

use crate::header::ReferenceIdentifier;

/// A raw header field was outside its on-wire range.
///
/// Decoding stores response bytes verbatim; range checks happen when a field
/// is read, and this is what an out-of-range read reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid NTP {field} value {value}")]
pub struct InvalidNtpValue {
    field: &'static str,
    value: i64,
}

impl InvalidNtpValue {
    pub(crate) const fn new(field: &'static str, value: i64) -> InvalidNtpValue {
        InvalidNtpValue { field, value }
    }

    /// Name of the offending header field.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        self.field
    }

    /// The out-of-range raw value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.value
    }
}

/// A UDP transport failure.
///
/// Timeouts are a distinct variant so callers can tell an expired receive
/// deadline from a genuine socket failure. The `Io` payload is shared so the
/// error can appear in both per-attempt diagnostics and the query outcome.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The receive deadline expired before a datagram arrived.
    #[error("receive timed out")]
    Timeout,
    /// The socket was closed while an operation was outstanding.
    #[error("socket closed")]
    Closed,
    /// Any other socket I/O failure.
    #[error("socket I/O error: {0}")]
    Io(Arc<io::Error>),
}

impl TransportError {
    /// Wraps an I/O error, surfacing timeout kinds as [`TransportError::Timeout`].
    #[must_use]
    pub fn from_io(err: io::Error) -> TransportError {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::Timeout,
            _ => TransportError::Io(Arc::new(err)),
        }
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout)
    }
}

/// Name resolution failed for the configured server.
///
/// Raised from [`execute_query`](crate::SntpClient::execute_query) directly
/// rather than being folded into the query result: without addresses there
/// was no query to attempt.
#[derive(Debug, Error)]
#[error("unknown host {host}")]
pub struct UnknownHostError {
    host: String,
    #[source]
    source: Option<io::Error>,
}

impl UnknownHostError {
    #[must_use]
    pub fn new(host: impl Into<String>, source: Option<io::Error>) -> UnknownHostError {
        UnknownHostError {
            host: host.into(),
            source,
        }
    }

    /// The server name that failed to resolve.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }
}

/// A response that was received but failed validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProtocolError {
    /// A datagram arrived from an address other than the one queried.
    #[error("response from {actual} does not match queried server {expected}")]
    AddressMismatch {
        expected: std::net::SocketAddr,
        actual: std::net::SocketAddr,
    },
    /// Fewer than 48 bytes arrived.
    #[error("short NTP packet: {len} bytes")]
    ShortPacket { len: usize },
    /// The response version does not echo the request version.
    #[error("response version {response} does not match request version {request}")]
    VersionMismatch { request: u8, response: u8 },
    /// The response mode is not server (4).
    #[error("unexpected mode {0} in response")]
    UnexpectedMode(u8),
    /// Stratum above the unicast server range [1, 15].
    #[error("stratum {0} outside the server range")]
    InvalidStratum(u8),
    /// The response did not echo the request transmit timestamp, which is
    /// what a replayed or spoofed packet looks like.
    #[error("originate timestamp does not echo the request transmit timestamp")]
    OriginateMismatch,
    /// The server transmit timestamp was zero.
    #[error("zero transmit timestamp in response")]
    ZeroTransmitTimestamp,
    /// An echoed header field was outside its on-wire range.
    #[error(transparent)]
    InvalidValue(#[from] InvalidNtpValue),
}

/// A transient failure; the caller should retry later or let the cluster
/// loop advance to another server.
#[derive(Debug, Clone, Error)]
pub enum RetryCause {
    /// The server answered with stratum 0: a Kiss-o'-Death packet whose
    /// reference identifier carries an ASCII reason code such as `RATE`.
    #[error("kiss-o'-death from server: {code}")]
    KissOfDeath { code: ReferenceIdentifier },
    /// Socket-level failure or timeout.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The resolver produced an empty address list.
    #[error("name resolution produced no addresses")]
    NoAddresses,
}

/// Classification of one failed SNTP exchange.
#[derive(Debug, Clone, Error)]
pub enum QueryFailure {
    /// Transient; trying again (or elsewhere) may work.
    #[error("retry later: {0}")]
    RetryLater(#[from] RetryCause),
    /// The server (or something in the path) is speaking the protocol
    /// wrongly; retrying the same cluster is unlikely to help.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl QueryFailure {
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self, QueryFailure::Protocol(_))
    }
}
