//! Rust SNTP client producing structured time signals.
//!
//! # Overview
//!
//! This crate queries NTP servers over the Simple Network Time Protocol
//! (SNTP, [RFC 4330](https://datatracker.ietf.org/doc/html/rfc4330)) and
//! returns the client clock offset and round-trip duration as a structured
//! [`SntpTimeSignal`], suitable for disciplining a local clock or for
//! logging and telemetry.
//!
//! One query resolves the configured server name to its full address list
//! and walks the addresses in order until one produces a definitive answer,
//! under an optional overall time budget:
//!
//! - transient failures (timeouts, socket errors, Kiss-o'-Death rate
//!   limiting) advance to the next address and surface as
//!   [`SntpQueryResultKind::RetryLater`] when every address fails;
//! - protocol violations (bad mode or stratum, version mismatch, missing
//!   originate echo) halt the walk and surface as
//!   [`SntpQueryResultKind::ProtocolError`];
//! - an exhausted budget surfaces as
//!   [`SntpQueryResultKind::TimeAllowedExceeded`].
//!
//! Every attempt is recorded in the result's [`SntpQueryDebugInfo`].
//!
//! The engine reads time only through the [`Ticker`] and [`InstantSource`]
//! traits and the network only through [`net::Network`], so hosts choose
//! concrete clock and socket implementations at construction and tests run
//! against deterministic substitutes. By default requests carry a
//! data-minimized transmit timestamp: the low fraction bits are replaced
//! with random bits so the server cannot fingerprint the client clock's
//! read resolution.
//!
//! # Usage
//!
//! Put this in your `Cargo.toml`:
//! ```cargo
//! [dependencies]
//! timesignal = "0.1"
//! ```
//!
//! # Example
//!
//! ```no_run
//! use timesignal::{Duration, SntpClient};
//!
//! let mut client = SntpClient::builder("pool.ntp.org")
//!     .response_timeout(Duration::of_seconds(2))
//!     .build();
//!
//! match client.execute_query(Some(Duration::of_seconds(10))) {
//!     Ok(result) => match result.signal() {
//!         Some(signal) => println!(
//!             "clock offset {}, round trip {}",
//!             signal.client_offset(),
//!             signal.round_trip_duration()
//!         ),
//!         None => eprintln!("query failed: {:?}", result.outcome()),
//!     },
//!     Err(err) => eprintln!("name resolution failed: {err}"),
//! }
//! ```
//!
//! ## Features
//!
//! - `utils`: OS-specific helpers to apply a time signal to the system
//!   clock.
//!
//! ## Logging support
//!
//! The crate logs through the [`log`] facade: per-attempt protocol detail
//! at debug level, absorbed per-address failures at warn level.

pub mod cluster;
pub mod error;
pub mod header;
pub mod net;
pub mod request;
pub mod result;
pub mod time;
pub mod timestamp;

mod engine;

#[cfg(feature = "utils")]
pub mod utils;

#[cfg(test)]
pub(crate) mod fake;

pub use crate::engine::{SntpClient, SntpClientBuilder, NTP_PORT};
pub use crate::error::{
    InvalidNtpValue, ProtocolError, QueryFailure, RetryCause, TransportError, UnknownHostError,
};
pub use crate::header::{NtpHeader, NtpHeaderBuilder, ReferenceIdentifier};
pub use crate::request::{SntpRequestFactory, CLIENT_DATA_MINIMIZATION_BITS};
pub use crate::result::{
    NetworkOperationKind, NetworkOperationResult, SntpQueryDebugInfo, SntpQueryOutcome,
    SntpQueryResult, SntpQueryResultKind, SntpTimeSignal,
};
pub use crate::time::{
    Duration, Instant, InstantSource, LinearAdjustmentTicker, MonotonicTicker, Precision,
    SystemInstantSource, SystemMillisInstantSource, Ticker, TickerId, Ticks,
};
pub use crate::timestamp::Timestamp64;
