//! Deterministic substitutes for the engine's collaborators.
//!
//! Everything here is scripted up front and advances simulated time only
//! when told to, so protocol and budget behavior can be asserted exactly.

use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use rand::RngCore;

use crate::error::{TransportError, UnknownHostError};
use crate::net::{Network, UdpTransport};
use crate::time::{Duration, Instant, InstantSource, Precision, Ticker, TickerId, Ticks};

/// A wall clock that returns programmed instants.
///
/// Each read returns the current instant and then steps it forward by the
/// auto-advance amount, which models a clock that keeps moving between
/// reads.
pub(crate) struct FakeInstantSource {
    inner: Mutex<InstantState>,
}

struct InstantState {
    current: Instant,
    auto_advance: Duration,
    precision: Precision,
}

impl FakeInstantSource {
    pub(crate) fn new(start: Instant) -> FakeInstantSource {
        FakeInstantSource {
            inner: Mutex::new(InstantState {
                current: start,
                auto_advance: Duration::ZERO,
                precision: Precision::Nanos,
            }),
        }
    }

    pub(crate) fn set_auto_advance(&self, step: Duration) {
        self.inner.lock().unwrap().auto_advance = step;
    }

    pub(crate) fn set_precision(&self, precision: Precision) {
        self.inner.lock().unwrap().precision = precision;
    }

    pub(crate) fn set_instant(&self, instant: Instant) {
        self.inner.lock().unwrap().current = instant;
    }

    pub(crate) fn advance(&self, step: Duration) {
        let mut state = self.inner.lock().unwrap();
        state.current = state.current + step;
    }
}

impl InstantSource for FakeInstantSource {
    fn instant(&self) -> Instant {
        let mut state = self.inner.lock().unwrap();
        let reading = state.current;
        state.current = state.current + state.auto_advance;
        reading
    }

    fn precision(&self) -> Precision {
        self.inner.lock().unwrap().precision
    }
}

/// A ticker whose nanosecond counter moves only when a test advances it.
///
/// Clones share the counter and the identity, so a test can hand the ticker
/// to the engine and keep a handle for advancing simulated time.
#[derive(Clone)]
pub(crate) struct FakeTicker {
    id: TickerId,
    nanos: Arc<AtomicI64>,
    auto_advance_nanos: Arc<AtomicI64>,
}

impl FakeTicker {
    pub(crate) fn new() -> FakeTicker {
        FakeTicker {
            id: TickerId::allocate(),
            nanos: Arc::new(AtomicI64::new(0)),
            auto_advance_nanos: Arc::new(AtomicI64::new(0)),
        }
    }

    pub(crate) fn advance(&self, step: Duration) {
        self.nanos.fetch_add(step.to_nanos(), Ordering::SeqCst);
    }

    /// Every read advances the counter by `step` afterwards.
    pub(crate) fn set_auto_advance(&self, step: Duration) {
        self.auto_advance_nanos
            .store(step.to_nanos(), Ordering::SeqCst);
    }
}

impl Ticker for FakeTicker {
    fn ticks(&self) -> Ticks {
        let step = self.auto_advance_nanos.load(Ordering::SeqCst);
        Ticks::new(self.id, self.nanos.fetch_add(step, Ordering::SeqCst))
    }

    fn id(&self) -> TickerId {
        self.id
    }
}

/// One scripted socket: what happens on send and on the single receive.
pub(crate) struct SocketScript {
    fail_send: bool,
    recv: RecvBehavior,
}

enum RecvBehavior {
    /// The "server" answers: the builder maps the sent request bytes to
    /// response bytes, after `elapsed` simulated time passes. The datagram
    /// appears to come from `from`, or from the queried address by default.
    Reply {
        elapsed: Duration,
        from: Option<SocketAddr>,
        build: Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>,
    },
    /// The read deadline expires; simulated time advances by the configured
    /// read timeout, like a real blocking receive would.
    Timeout,
    /// The receive fails with a non-timeout I/O error.
    IoError,
    /// Nothing scripted; reaching the receive is a test bug.
    Unreachable,
}

impl SocketScript {
    pub(crate) fn replying(
        build: impl FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    ) -> SocketScript {
        SocketScript::replying_after(Duration::ZERO, build)
    }

    pub(crate) fn replying_after(
        elapsed: Duration,
        build: impl FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    ) -> SocketScript {
        SocketScript {
            fail_send: false,
            recv: RecvBehavior::Reply {
                elapsed,
                from: None,
                build: Box::new(build),
            },
        }
    }

    pub(crate) fn replying_from(
        from: SocketAddr,
        build: impl FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    ) -> SocketScript {
        SocketScript {
            fail_send: false,
            recv: RecvBehavior::Reply {
                elapsed: Duration::ZERO,
                from: Some(from),
                build: Box::new(build),
            },
        }
    }

    pub(crate) fn timing_out() -> SocketScript {
        SocketScript {
            fail_send: false,
            recv: RecvBehavior::Timeout,
        }
    }

    pub(crate) fn recv_erroring() -> SocketScript {
        SocketScript {
            fail_send: false,
            recv: RecvBehavior::IoError,
        }
    }

    pub(crate) fn send_failing() -> SocketScript {
        SocketScript {
            fail_send: true,
            recv: RecvBehavior::Unreachable,
        }
    }
}

enum ScriptEntry {
    Socket(SocketScript),
    CreationFails,
}

/// A scripted [`Network`]: resolution results, per-socket behaviors, and
/// optional simulated elapsed time, all programmed by the test. Clones
/// share the script, so a test keeps a handle after handing one to the
/// engine.
#[derive(Clone)]
pub(crate) struct FakeNetwork {
    inner: Arc<Mutex<NetworkState>>,
}

struct NetworkState {
    resolution: Option<Result<Vec<IpAddr>, String>>,
    resolution_elapsed: Option<(FakeTicker, Duration)>,
    ticker: Option<FakeTicker>,
    scripts: VecDeque<ScriptEntry>,
    closed_flags: Vec<Arc<AtomicBool>>,
}

impl FakeNetwork {
    pub(crate) fn new() -> FakeNetwork {
        FakeNetwork {
            inner: Arc::new(Mutex::new(NetworkState {
                resolution: None,
                resolution_elapsed: None,
                ticker: None,
                scripts: VecDeque::new(),
                closed_flags: Vec::new(),
            })),
        }
    }

    pub(crate) fn script_resolution(&self, addresses: Vec<IpAddr>) {
        self.inner.lock().unwrap().resolution = Some(Ok(addresses));
    }

    pub(crate) fn script_resolution_failure(&self, host: &str) {
        self.inner.lock().unwrap().resolution = Some(Err(host.to_string()));
    }

    /// Makes resolution consume `elapsed` of the given ticker's time.
    pub(crate) fn set_resolution_elapsed(&self, ticker: &FakeTicker, elapsed: Duration) {
        self.inner.lock().unwrap().resolution_elapsed = Some((ticker.clone(), elapsed));
    }

    /// Ticker advanced by socket behaviors (reply delay, receive timeout).
    pub(crate) fn link_ticker(&self, ticker: &FakeTicker) {
        self.inner.lock().unwrap().ticker = Some(ticker.clone());
    }

    pub(crate) fn push_socket(&self, script: SocketScript) {
        self.inner
            .lock()
            .unwrap()
            .scripts
            .push_back(ScriptEntry::Socket(script));
    }

    pub(crate) fn push_socket_creation_failure(&self) {
        self.inner
            .lock()
            .unwrap()
            .scripts
            .push_back(ScriptEntry::CreationFails);
    }

    pub(crate) fn sockets_created(&self) -> usize {
        self.inner.lock().unwrap().closed_flags.len()
    }

    /// True when every socket handed out was closed again.
    pub(crate) fn all_sockets_closed(&self) -> bool {
        self.inner
            .lock()
            .unwrap()
            .closed_flags
            .iter()
            .all(|flag| flag.load(Ordering::SeqCst))
    }
}

impl Network for FakeNetwork {
    fn get_all_by_name(&self, host: &str) -> Result<Vec<IpAddr>, UnknownHostError> {
        let (resolution, elapsed) = {
            let state = self.inner.lock().unwrap();
            (
                state
                    .resolution
                    .clone()
                    .expect("no resolution scripted"),
                state.resolution_elapsed.clone(),
            )
        };
        if let Some((ticker, elapsed)) = elapsed {
            ticker.advance(elapsed);
        }
        resolution.map_err(|scripted| {
            assert_eq!(scripted, host, "resolved a host the test did not script");
            UnknownHostError::new(host, None)
        })
    }

    fn create_udp_socket(&self) -> Result<Box<dyn UdpTransport>, TransportError> {
        let mut state = self.inner.lock().unwrap();
        match state.scripts.pop_front().expect("no socket scripted") {
            ScriptEntry::CreationFails => Err(TransportError::from_io(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                "scripted socket creation failure",
            ))),
            ScriptEntry::Socket(script) => {
                let closed = Arc::new(AtomicBool::new(false));
                state.closed_flags.push(closed.clone());
                Ok(Box::new(FakeUdpSocket {
                    script: Mutex::new(script),
                    ticker: state.ticker.clone(),
                    read_timeout: Mutex::new(None),
                    sent: Mutex::new(None),
                    closed,
                }))
            }
        }
    }
}

struct FakeUdpSocket {
    script: Mutex<SocketScript>,
    ticker: Option<FakeTicker>,
    read_timeout: Mutex<Option<Duration>>,
    sent: Mutex<Option<(Vec<u8>, SocketAddr)>>,
    closed: Arc<AtomicBool>,
}

impl UdpTransport for FakeUdpSocket {
    fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(SocketAddr::from(([127, 0, 0, 1], 40000)))
    }

    fn set_read_timeout(&self, timeout: Duration) -> Result<(), TransportError> {
        *self.read_timeout.lock().unwrap() = Some(timeout);
        Ok(())
    }

    fn send(&self, buf: &[u8], addr: SocketAddr) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        if self.script.lock().unwrap().fail_send {
            return Err(TransportError::from_io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "scripted send failure",
            )));
        }
        *self.sent.lock().unwrap() = Some((buf.to_vec(), addr));
        Ok(())
    }

    fn recv(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        let mut script = self.script.lock().unwrap();
        match &mut script.recv {
            RecvBehavior::Reply { elapsed, from, build } => {
                if let Some(ticker) = &self.ticker {
                    ticker.advance(*elapsed);
                }
                let (request, peer) = self
                    .sent
                    .lock()
                    .unwrap()
                    .clone()
                    .expect("receive scripted before any send");
                let response = build(&request);
                let len = response.len().min(buf.len());
                buf[..len].copy_from_slice(&response[..len]);
                Ok((len, from.unwrap_or(peer)))
            }
            RecvBehavior::Timeout => {
                let timeout = self
                    .read_timeout
                    .lock()
                    .unwrap()
                    .expect("timeout scripted but no read timeout set");
                if let Some(ticker) = &self.ticker {
                    ticker.advance(timeout);
                }
                Err(TransportError::Timeout)
            }
            RecvBehavior::IoError => Err(TransportError::from_io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "scripted receive failure",
            ))),
            RecvBehavior::Unreachable => panic!("receive reached an unscripted socket"),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A deterministic xorshift RNG. Not remotely cryptographic, which is the
/// point: tests need reproducible "random" bits.
pub(crate) struct FakeRng {
    state: u64,
}

impl FakeRng {
    pub(crate) fn new(seed: u64) -> FakeRng {
        FakeRng {
            state: seed.max(1),
        }
    }
}

impl RngCore for FakeRng {
    fn next_u32(&mut self) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        {
            self.next_u64() as u32
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instant_source_auto_advances_per_read() {
        let source = FakeInstantSource::new(Instant::of_epoch_second(100));
        source.set_auto_advance(Duration::of_millis(210));
        assert_eq!(source.instant(), Instant::of_epoch_second(100));
        assert_eq!(source.instant(), Instant::of_epoch_milli(100_210));
    }

    #[test]
    fn instant_source_can_be_repositioned() {
        let source = FakeInstantSource::new(Instant::EPOCH);
        source.set_precision(Precision::Millis);
        assert_eq!(source.precision(), Precision::Millis);
        source.set_instant(Instant::of_epoch_second(50));
        source.advance(Duration::of_seconds(5));
        assert_eq!(source.instant(), Instant::of_epoch_second(55));
    }

    #[test]
    fn ticker_auto_advance_steps_after_each_read() {
        let ticker = FakeTicker::new();
        ticker.set_auto_advance(Duration::of_millis(1));
        assert_eq!(ticker.ticks().value(), 0);
        assert_eq!(ticker.ticks().value(), 1_000_000);
    }

    #[test]
    fn ticker_clones_share_time() {
        let ticker = FakeTicker::new();
        let clone = ticker.clone();
        ticker.advance(Duration::of_seconds(2));
        assert_eq!(clone.ticks().value(), 2_000_000_000);
        assert_eq!(clone.id(), ticker.id());
    }

    #[test]
    fn fake_rng_is_deterministic() {
        let mut a = FakeRng::new(99);
        let mut b = FakeRng::new(99);
        for _ in 0..10 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn scripted_socket_replies_with_request_in_hand() {
        let network = FakeNetwork::new();
        network.push_socket(SocketScript::replying(|request| {
            let mut response = request.to_vec();
            response.reverse();
            response
        }));

        let socket = network.create_udp_socket().unwrap();
        let peer = SocketAddr::from(([1, 1, 1, 1], 123));
        socket.send(&[1, 2, 3], peer).unwrap();

        let mut buf = [0u8; 8];
        let (len, from) = socket.recv(&mut buf).unwrap();
        assert_eq!(&buf[..len], &[3, 2, 1]);
        assert_eq!(from, peer);
        assert!(!network.all_sockets_closed());
        socket.close();
        assert!(network.all_sockets_closed());
    }

    #[test]
    fn timeout_advances_linked_ticker_by_read_timeout() {
        let ticker = FakeTicker::new();
        let network = FakeNetwork::new();
        network.link_ticker(&ticker);
        network.push_socket(SocketScript::timing_out());

        let socket = network.create_udp_socket().unwrap();
        socket.set_read_timeout(Duration::of_seconds(1)).unwrap();
        let mut buf = [0u8; 48];
        assert!(socket.recv(&mut buf).unwrap_err().is_timeout());
        assert_eq!(ticker.ticks().value(), 1_000_000_000);
    }
}
