//! Structured query outcomes and per-attempt diagnostics.

use std::net::SocketAddr;

use crate::error::QueryFailure;
use crate::header::ReferenceIdentifier;
use crate::time::{Duration, Instant, Ticks};
use crate::timestamp::Timestamp64;

/// How a single network attempt against one server address ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkOperationKind {
    Success,
    Failure,
    TimeAllowedExceeded,
}

/// Record of one network attempt, kept for diagnostics.
#[derive(Debug, Clone)]
pub struct NetworkOperationResult {
    socket_address: SocketAddr,
    kind: NetworkOperationKind,
    cause: Option<QueryFailure>,
}

impl NetworkOperationResult {
    #[must_use]
    pub(crate) fn success(socket_address: SocketAddr) -> NetworkOperationResult {
        NetworkOperationResult {
            socket_address,
            kind: NetworkOperationKind::Success,
            cause: None,
        }
    }

    #[must_use]
    pub(crate) fn failure(
        socket_address: SocketAddr,
        cause: QueryFailure,
    ) -> NetworkOperationResult {
        NetworkOperationResult {
            socket_address,
            kind: NetworkOperationKind::Failure,
            cause: Some(cause),
        }
    }

    #[must_use]
    pub(crate) fn time_allowed_exceeded(
        socket_address: SocketAddr,
        cause: Option<QueryFailure>,
    ) -> NetworkOperationResult {
        NetworkOperationResult {
            socket_address,
            kind: NetworkOperationKind::TimeAllowedExceeded,
            cause,
        }
    }

    /// The server address this attempt targeted.
    #[must_use]
    pub fn socket_address(&self) -> SocketAddr {
        self.socket_address
    }

    #[must_use]
    pub fn kind(&self) -> NetworkOperationKind {
        self.kind
    }

    /// The failure classification, when the attempt failed.
    #[must_use]
    pub fn cause(&self) -> Option<&QueryFailure> {
        self.cause.as_ref()
    }
}

/// Per-attempt diagnostics for a whole query, in attempt order.
#[derive(Debug, Clone, Default)]
pub struct SntpQueryDebugInfo {
    operation_results: Vec<NetworkOperationResult>,
}

impl SntpQueryDebugInfo {
    #[must_use]
    pub(crate) fn new(operation_results: Vec<NetworkOperationResult>) -> SntpQueryDebugInfo {
        SntpQueryDebugInfo { operation_results }
    }

    /// One entry per server address actually attempted, in order.
    #[must_use]
    pub fn operation_results(&self) -> &[NetworkOperationResult] {
        &self.operation_results
    }
}

/// The caller-visible outcome of one SNTP query.
#[derive(Debug, Clone)]
pub enum SntpQueryOutcome {
    /// A server answered and validated; the signal holds the result.
    Success(SntpTimeSignal),
    /// Every attempt failed transiently (timeouts, socket errors,
    /// Kiss-o'-Death); the carried failure is the last one observed.
    RetryLater(QueryFailure),
    /// A response failed validation badly enough to halt the cluster walk.
    ProtocolError(QueryFailure),
    /// The time budget ran out before any definitive answer.
    TimeAllowedExceeded,
}

/// Kind discriminant for [`SntpQueryOutcome`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SntpQueryResultKind {
    Success,
    RetryLater,
    ProtocolError,
    TimeAllowedExceeded,
}

/// Everything one query produced: the outcome plus per-attempt diagnostics.
#[derive(Debug, Clone)]
pub struct SntpQueryResult {
    outcome: SntpQueryOutcome,
    debug_info: SntpQueryDebugInfo,
}

impl SntpQueryResult {
    #[must_use]
    pub(crate) fn new(
        outcome: SntpQueryOutcome,
        debug_info: SntpQueryDebugInfo,
    ) -> SntpQueryResult {
        SntpQueryResult { outcome, debug_info }
    }

    #[must_use]
    pub fn outcome(&self) -> &SntpQueryOutcome {
        &self.outcome
    }

    #[must_use]
    pub fn kind(&self) -> SntpQueryResultKind {
        match self.outcome {
            SntpQueryOutcome::Success(_) => SntpQueryResultKind::Success,
            SntpQueryOutcome::RetryLater(_) => SntpQueryResultKind::RetryLater,
            SntpQueryOutcome::ProtocolError(_) => SntpQueryResultKind::ProtocolError,
            SntpQueryOutcome::TimeAllowedExceeded => SntpQueryResultKind::TimeAllowedExceeded,
        }
    }

    /// The time signal, for successful queries.
    #[must_use]
    pub fn signal(&self) -> Option<&SntpTimeSignal> {
        match &self.outcome {
            SntpQueryOutcome::Success(signal) => Some(signal),
            _ => None,
        }
    }

    /// The final failure, for failed queries.
    #[must_use]
    pub fn error(&self) -> Option<&QueryFailure> {
        match &self.outcome {
            SntpQueryOutcome::RetryLater(failure) | SntpQueryOutcome::ProtocolError(failure) => {
                Some(failure)
            }
            _ => None,
        }
    }

    #[must_use]
    pub fn debug_info(&self) -> &SntpQueryDebugInfo {
        &self.debug_info
    }
}

/// A frozen snapshot of a successful SNTP exchange.
///
/// The offset applies at `result_ticks`: a caller disciplining a clock
/// should measure its own elapsed time from that reading, not from "now".
#[derive(Debug, Clone)]
pub struct SntpTimeSignal {
    pub(crate) result_ticks: Ticks,
    pub(crate) result_instant: Instant,
    pub(crate) client_offset: Duration,
    pub(crate) round_trip_duration: Duration,
    pub(crate) server_address: SocketAddr,
    pub(crate) stratum: u8,
    pub(crate) request_version: u8,
    pub(crate) response_version: u8,
    pub(crate) poll_interval_exponent: u8,
    pub(crate) precision_exponent: i8,
    pub(crate) root_delay: Duration,
    pub(crate) root_dispersion: Duration,
    pub(crate) reference_identifier: ReferenceIdentifier,
    pub(crate) reference_timestamp: Timestamp64,
}

impl SntpTimeSignal {
    /// The client ticker reading at which the offset applies.
    #[must_use]
    pub fn result_ticks(&self) -> Ticks {
        self.result_ticks
    }

    /// The computed server time at [`SntpTimeSignal::result_ticks`].
    #[must_use]
    pub fn result_instant(&self) -> Instant {
        self.result_instant
    }

    /// Estimated `server − client` clock offset.
    #[must_use]
    pub fn client_offset(&self) -> Duration {
        self.client_offset
    }

    /// Round-trip duration of the exchange, clamped at zero.
    #[must_use]
    pub fn round_trip_duration(&self) -> Duration {
        self.round_trip_duration
    }

    /// Address and port of the server that answered.
    #[must_use]
    pub fn server_address(&self) -> SocketAddr {
        self.server_address
    }

    /// Server stratum, 1–15.
    #[must_use]
    pub fn stratum(&self) -> u8 {
        self.stratum
    }

    /// Version the request carried.
    #[must_use]
    pub fn request_version(&self) -> u8 {
        self.request_version
    }

    /// Version the response carried.
    #[must_use]
    pub fn response_version(&self) -> u8 {
        self.response_version
    }

    /// Server poll interval exponent (interval is `2^exp` seconds).
    #[must_use]
    pub fn poll_interval_exponent(&self) -> u8 {
        self.poll_interval_exponent
    }

    /// Server clock precision exponent (precision is `2^exp` seconds).
    #[must_use]
    pub fn precision_exponent(&self) -> i8 {
        self.precision_exponent
    }

    /// Server root delay.
    #[must_use]
    pub fn root_delay(&self) -> Duration {
        self.root_delay
    }

    /// Server root dispersion.
    #[must_use]
    pub fn root_dispersion(&self) -> Duration {
        self.root_dispersion
    }

    /// Server reference identifier.
    #[must_use]
    pub fn reference_identifier(&self) -> ReferenceIdentifier {
        self.reference_identifier
    }

    /// Server reference timestamp.
    #[must_use]
    pub fn reference_timestamp(&self) -> Timestamp64 {
        self.reference_timestamp
    }
}
