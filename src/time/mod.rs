//! Platform-agnostic time primitives and clock abstractions.
//!
//! The engine never reads the platform clock directly. It consumes the
//! [`Ticker`] and [`InstantSource`] traits, so a host (or a test) decides at
//! construction time where elapsed time and wall-clock readings come from.

mod duration;
mod instant;
mod platform;
mod ticks;

pub use duration::Duration;
pub use instant::Instant;
pub use platform::{
    LinearAdjustmentTicker, MonotonicTicker, SystemInstantSource, SystemMillisInstantSource,
};
pub use ticks::{InstantSource, Precision, Ticker, TickerId, Ticks};

/// Nanoseconds in a second.
pub(crate) const NANOS_IN_SEC: u32 = 1_000_000_000;
/// Nanoseconds in a millisecond.
pub(crate) const NANOS_IN_MILLI: u32 = 1_000_000;
/// Milliseconds in a second.
pub(crate) const MILLIS_IN_SEC: i64 = 1_000;
