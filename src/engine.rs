//! The SNTP query engine.
//!
//! One [`SntpClient::execute_query`] call resolves the configured server
//! name, then walks the resolved addresses through the clustered loop. Each
//! per-address attempt opens a fresh UDP socket, sends one 48-byte request,
//! waits for one response bounded by the response timeout, validates it, and
//! computes the clock offset and round trip. Transient failures advance the
//! loop to the next address; protocol violations halt it.

use core::ops::Deref;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use log::{debug, warn};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::cluster::{ClusteredServiceKind, ClusteredServiceOperation, ServiceResult};
use crate::error::{ProtocolError, QueryFailure, RetryCause, UnknownHostError};
use crate::header::NtpHeader;
use crate::net::{Network, StdNetwork, UdpTransport};
use crate::request::{SntpRequestFactory, MODE_SERVER};
use crate::result::{
    NetworkOperationResult, SntpQueryDebugInfo, SntpQueryOutcome, SntpQueryResult,
    SntpTimeSignal,
};
use crate::time::{
    Duration, Instant, InstantSource, MonotonicTicker, SystemInstantSource, Ticker,
};
use crate::timestamp::Timestamp64;

/// Default NTP server UDP port.
pub const NTP_PORT: u16 = 123;

/// Highest stratum a usable unicast server may report.
const MAX_UNICAST_STRATUM: u8 = 15;

/// Configures and builds an [`SntpClient`].
///
/// The response timeout has no safe default and must be set explicitly;
/// everything else defaults to the standard platform collaborators.
pub struct SntpClientBuilder {
    server_name: String,
    port: u16,
    response_timeout: Option<Duration>,
    version: u8,
    data_minimization: bool,
    era_threshold: Option<Instant>,
    network: Option<Box<dyn Network>>,
    instant_source: Option<Arc<dyn InstantSource>>,
    ticker: Option<Arc<dyn Ticker>>,
    rng: Option<Box<dyn RngCore>>,
}

impl SntpClientBuilder {
    fn new(server_name: String) -> SntpClientBuilder {
        SntpClientBuilder {
            server_name,
            port: NTP_PORT,
            response_timeout: None,
            version: 4,
            data_minimization: true,
            era_threshold: None,
            network: None,
            instant_source: None,
            ticker: None,
            rng: None,
        }
    }

    /// UDP port to query; defaults to [`NTP_PORT`].
    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Receive deadline applied to every per-address attempt. Required.
    ///
    /// # Panics
    ///
    /// Panics if `timeout` is not positive.
    #[must_use]
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        assert!(
            timeout > Duration::ZERO,
            "response timeout {timeout} must be positive"
        );
        self.response_timeout = Some(timeout);
        self
    }

    /// Protocol version the client reports: 3 or 4. Defaults to 4.
    #[must_use]
    pub fn client_reported_version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    /// Whether transmitted timestamps hide the clock's read resolution.
    /// Defaults to on.
    #[must_use]
    pub fn client_data_minimization(mut self, enabled: bool) -> Self {
        self.data_minimization = enabled;
        self
    }

    /// Overrides the NTP era disambiguator. Only needed for clients that
    /// know they operate outside the 1968–2104 window.
    #[must_use]
    pub fn era_threshold(mut self, threshold: Instant) -> Self {
        self.era_threshold = Some(threshold);
        self
    }

    #[must_use]
    pub fn network(mut self, network: Box<dyn Network>) -> Self {
        self.network = Some(network);
        self
    }

    #[must_use]
    pub fn instant_source(mut self, instant_source: Arc<dyn InstantSource>) -> Self {
        self.instant_source = Some(instant_source);
        self
    }

    #[must_use]
    pub fn ticker(mut self, ticker: Arc<dyn Ticker>) -> Self {
        self.ticker = Some(ticker);
        self
    }

    /// RNG used for data minimization. The default is the operating system
    /// RNG; substitutes should be cryptographically strong outside tests.
    #[must_use]
    pub fn rng(mut self, rng: Box<dyn RngCore>) -> Self {
        self.rng = Some(rng);
        self
    }

    /// # Panics
    ///
    /// Panics if the response timeout was never set or the reported version
    /// is not 3 or 4.
    #[must_use]
    pub fn build(self) -> SntpClient {
        let response_timeout = self
            .response_timeout
            .unwrap_or_else(|| panic!("response timeout is required"));
        SntpClient {
            server_name: self.server_name,
            port: self.port,
            response_timeout,
            factory: SntpRequestFactory::new(self.version, self.data_minimization),
            era_threshold: self
                .era_threshold
                .unwrap_or_else(Timestamp64::default_era_threshold),
            network: self.network.unwrap_or_else(|| Box::new(StdNetwork)),
            instant_source: self
                .instant_source
                .unwrap_or_else(|| Arc::new(SystemInstantSource)),
            ticker: self.ticker.unwrap_or_else(|| Arc::new(MonotonicTicker::new())),
            rng: self.rng.unwrap_or_else(|| Box::new(OsRng)),
        }
    }
}

/// A single-server SNTP client.
///
/// The client itself holds no query state; state lives only for the duration
/// of one [`SntpClient::execute_query`] call. Run concurrent queries on
/// independent clients.
pub struct SntpClient {
    server_name: String,
    port: u16,
    response_timeout: Duration,
    factory: SntpRequestFactory,
    era_threshold: Instant,
    network: Box<dyn Network>,
    instant_source: Arc<dyn InstantSource>,
    ticker: Arc<dyn Ticker>,
    rng: Box<dyn RngCore>,
}

impl SntpClient {
    #[must_use]
    pub fn builder(server_name: impl Into<String>) -> SntpClientBuilder {
        SntpClientBuilder::new(server_name.into())
    }

    /// The configured server name.
    #[must_use]
    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    /// Performs one SNTP query, optionally bounded by `time_allowed`.
    ///
    /// # Errors
    ///
    /// [`UnknownHostError`] if the server name does not resolve. Every other
    /// failure is reported inside the returned [`SntpQueryResult`].
    ///
    /// # Panics
    ///
    /// Panics if `time_allowed` is non-positive.
    pub fn execute_query(
        &mut self,
        time_allowed: Option<Duration>,
    ) -> Result<SntpQueryResult, UnknownHostError> {
        let attempt = AttemptContext {
            network: self.network.as_ref(),
            ticker: self.ticker.as_ref(),
            instant_source: self.instant_source.as_ref(),
            factory: self.factory,
            port: self.port,
            response_timeout: self.response_timeout,
            era_threshold: self.era_threshold,
        };
        let rng = &mut self.rng;

        let runner = ClusteredServiceOperation::new(attempt.network, attempt.ticker);
        let mut operation =
            |_server: &str, ip: IpAddr, _param: &(), remaining: Option<Duration>| {
                attempt.run(ip, remaining, &mut **rng)
            };

        let cluster_result =
            runner.execute(&self.server_name, &(), time_allowed, &mut operation)?;
        let (kind, _addresses, success, failures, _halted) = cluster_result.into_parts();

        let mut operation_results = failures;
        let outcome = match (kind, success) {
            (ClusteredServiceKind::Success, Some(success)) => {
                operation_results.push(success.operation_result);
                SntpQueryOutcome::Success(success.signal)
            }
            (ClusteredServiceKind::TimeAllowedExceeded, _) => {
                SntpQueryOutcome::TimeAllowedExceeded
            }
            _ => match operation_results.last().and_then(NetworkOperationResult::cause) {
                Some(failure @ QueryFailure::Protocol(_)) => {
                    SntpQueryOutcome::ProtocolError(failure.clone())
                }
                Some(failure) => SntpQueryOutcome::RetryLater(failure.clone()),
                None => SntpQueryOutcome::RetryLater(QueryFailure::RetryLater(
                    RetryCause::NoAddresses,
                )),
            },
        };

        Ok(SntpQueryResult::new(
            outcome,
            SntpQueryDebugInfo::new(operation_results),
        ))
    }
}

/// Per-attempt success payload: the signal plus the attempt's own record.
struct AttemptSuccess {
    signal: SntpTimeSignal,
    operation_result: NetworkOperationResult,
}

/// The collaborators and configuration one attempt needs, split out of the
/// client so the clustered loop and the attempt can borrow disjointly.
struct AttemptContext<'a> {
    network: &'a dyn Network,
    ticker: &'a dyn Ticker,
    instant_source: &'a dyn InstantSource,
    factory: SntpRequestFactory,
    port: u16,
    response_timeout: Duration,
    era_threshold: Instant,
}

impl AttemptContext<'_> {
    fn run(
        &self,
        ip: IpAddr,
        remaining: Option<Duration>,
        rng: &mut dyn RngCore,
    ) -> ServiceResult<AttemptSuccess, NetworkOperationResult> {
        let server_addr = SocketAddr::new(ip, self.port);
        let op_start = self.ticker.ticks();

        let advance = |failure: QueryFailure| {
            ServiceResult::FailureAdvance(NetworkOperationResult::failure(server_addr, failure))
        };
        let halt = |failure: ProtocolError| {
            ServiceResult::FailureHalt(NetworkOperationResult::failure(
                server_addr,
                QueryFailure::Protocol(failure),
            ))
        };

        let socket = match self.network.create_udp_socket() {
            Ok(socket) => SocketGuard::new(socket),
            Err(err) => return advance(RetryCause::Transport(err).into()),
        };

        // The receive deadline never outlives the overall budget.
        let read_timeout = match remaining {
            Some(left) if left < self.response_timeout => left,
            _ => self.response_timeout,
        };
        if let Err(err) = socket.set_read_timeout(read_timeout) {
            return advance(RetryCause::Transport(err).into());
        }

        let request_ticks = self.ticker.ticks();
        let request = self.factory.create_request(self.instant_source, rng);
        debug!(
            "request to {server_addr} at ticks {} (timeout {read_timeout})",
            request_ticks.value()
        );
        if let Err(err) = socket.send(&request.to_bytes(), server_addr) {
            return advance(RetryCause::Transport(err).into());
        }

        let mut buf = [0u8; NtpHeader::SIZE];
        let (len, src) = match socket.recv(&mut buf) {
            Ok(received) => received,
            Err(err) => {
                if err.is_timeout() {
                    if let Some(budget) = remaining {
                        let elapsed = self
                            .ticker
                            .duration_between(op_start, self.ticker.ticks());
                        if elapsed >= budget {
                            return ServiceResult::TimeAllowedExceeded(
                                NetworkOperationResult::time_allowed_exceeded(
                                    server_addr,
                                    Some(RetryCause::Transport(err).into()),
                                ),
                            );
                        }
                    }
                }
                return advance(RetryCause::Transport(err).into());
            }
        };

        // T4: captured immediately after the receive returns.
        let result_ticks = self.ticker.ticks();
        let destination_instant = self.instant_source.instant();

        if src != server_addr {
            return halt(ProtocolError::AddressMismatch {
                expected: server_addr,
                actual: src,
            });
        }
        if len != NtpHeader::SIZE {
            return halt(ProtocolError::ShortPacket { len });
        }
        let response = NtpHeader::from_bytes(buf);
        debug!("response from {server_addr}: {response:?}");

        if response.version_number() != self.factory.version() {
            return halt(ProtocolError::VersionMismatch {
                request: self.factory.version(),
                response: response.version_number(),
            });
        }
        if response.mode() != MODE_SERVER {
            return halt(ProtocolError::UnexpectedMode(response.mode()));
        }
        let stratum = response.stratum();
        if stratum == 0 {
            let code = response.reference_identifier();
            warn!("kiss-o'-death from {server_addr}: {code}");
            return advance(RetryCause::KissOfDeath { code }.into());
        }
        if stratum > MAX_UNICAST_STRATUM {
            return halt(ProtocolError::InvalidStratum(stratum));
        }
        // Replay/spoof guard: the server must echo our transmit timestamp
        // bit for bit.
        if response.originate_timestamp() != request.transmit_timestamp() {
            return halt(ProtocolError::OriginateMismatch);
        }
        if response.transmit_timestamp() == Timestamp64::ZERO {
            return halt(ProtocolError::ZeroTransmitTimestamp);
        }
        let poll_interval_exponent = match response.poll_interval_exponent() {
            Ok(exponent) => exponent,
            Err(err) => return halt(err.into()),
        };
        let precision_exponent = match response.precision_exponent() {
            Ok(exponent) => exponent,
            Err(err) => return halt(err.into()),
        };

        let t1 = request.transmit_timestamp().to_instant(self.era_threshold);
        let t2 = response.receive_timestamp().to_instant(self.era_threshold);
        let t3 = response.transmit_timestamp().to_instant(self.era_threshold);
        let t4 = destination_instant;

        let client_offset = ((t2 - t1) + (t3 - t4)).divided_by(2);
        let mut round_trip_duration = (t4 - t1) - (t3 - t2);
        if round_trip_duration.is_negative() {
            // Clock jitter between the stamps; the true value is near zero.
            warn!("negative round trip {round_trip_duration} clamped to zero");
            round_trip_duration = Duration::ZERO;
        }
        debug!(
            "offset {client_offset}, round trip {round_trip_duration}, stratum {stratum}"
        );

        let signal = SntpTimeSignal {
            result_ticks,
            result_instant: t4 + client_offset,
            client_offset,
            round_trip_duration,
            server_address: server_addr,
            stratum,
            request_version: self.factory.version(),
            response_version: response.version_number(),
            poll_interval_exponent,
            precision_exponent,
            root_delay: response.root_delay(),
            root_dispersion: response.root_dispersion(),
            reference_identifier: response.reference_identifier(),
            reference_timestamp: response.reference_timestamp(),
        };
        ServiceResult::Success(AttemptSuccess {
            signal,
            operation_result: NetworkOperationResult::success(server_addr),
        })
    }
}

/// Closes the socket on every exit path, including panics and early returns
/// between send and receive.
struct SocketGuard {
    socket: Box<dyn UdpTransport>,
}

impl SocketGuard {
    fn new(socket: Box<dyn UdpTransport>) -> SocketGuard {
        SocketGuard { socket }
    }
}

impl Deref for SocketGuard {
    type Target = dyn UdpTransport;

    fn deref(&self) -> &Self::Target {
        self.socket.as_ref()
    }
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        self.socket.close();
    }
}
