use core::sync::atomic::{AtomicU64, Ordering};

use crate::time::duration::Duration;
use crate::time::instant::Instant;

static NEXT_TICKER_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a [`Ticker`] instance.
///
/// Every ticker receives a process-unique id at construction. Ticks carry the
/// id of the ticker that produced them, which lets readings from unrelated
/// tickers be rejected instead of silently compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickerId(u64);

impl TickerId {
    /// Allocates a fresh process-unique id.
    #[must_use]
    pub fn allocate() -> TickerId {
        TickerId(NEXT_TICKER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// An opaque monotonic clock reading.
///
/// The value is meaningful only relative to other readings of the same
/// ticker; it carries no epoch. For nanosecond tickers the value is a
/// nanosecond count from an arbitrary origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticks {
    origin: TickerId,
    value: i64,
}

impl Ticks {
    /// A reading attributed to the ticker identified by `origin`.
    #[must_use]
    pub const fn new(origin: TickerId, value: i64) -> Ticks {
        Ticks { origin, value }
    }

    /// The id of the ticker this reading came from.
    #[must_use]
    pub const fn origin(&self) -> TickerId {
        self.origin
    }

    /// The raw reading.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.value
    }
}

/// A source of monotonic [`Ticks`].
///
/// Readings are assumed monotonic non-decreasing under normal use; precision
/// depends on the underlying clock.
pub trait Ticker {
    /// Takes a reading.
    fn ticks(&self) -> Ticks;

    /// The id stamped on this ticker's readings.
    fn id(&self) -> TickerId;

    /// The elapsed time from `start` to `end`.
    ///
    /// The default interprets the reading delta as nanoseconds, which is
    /// correct for any nanosecond-resolution ticker.
    ///
    /// # Panics
    ///
    /// Panics if either reading did not originate from this ticker, or if the
    /// delta overflows `i64`.
    fn duration_between(&self, start: Ticks, end: Ticks) -> Duration {
        assert_eq!(
            start.origin(),
            self.id(),
            "start ticks did not originate from this ticker"
        );
        assert_eq!(
            end.origin(),
            self.id(),
            "end ticks did not originate from this ticker"
        );
        let delta = end
            .value()
            .checked_sub(start.value())
            .unwrap_or_else(|| panic!("tick delta overflow"));
        Duration::of_nanos(delta)
    }
}

/// Declared resolution of an [`InstantSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Readings are accurate to the millisecond.
    Millis,
    /// Readings are accurate to the nanosecond.
    Nanos,
}

impl Precision {
    /// Distinguishable sub-second values per second at this precision.
    #[must_use]
    pub const fn ticks_per_second(&self) -> i64 {
        match self {
            Precision::Millis => 1_000,
            Precision::Nanos => 1_000_000_000,
        }
    }
}

/// A source of wall-clock [`Instant`]s with a declared precision.
pub trait InstantSource {
    /// The current wall-clock reading.
    fn instant(&self) -> Instant;

    /// The resolution of readings from this source.
    fn precision(&self) -> Precision;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingTicker {
        id: TickerId,
    }

    impl Ticker for CountingTicker {
        fn ticks(&self) -> Ticks {
            Ticks::new(self.id, 0)
        }

        fn id(&self) -> TickerId {
            self.id
        }
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(TickerId::allocate(), TickerId::allocate());
    }

    #[test]
    fn duration_between_interprets_nanos() {
        let ticker = CountingTicker { id: TickerId::allocate() };
        let a = Ticks::new(ticker.id, 1_000);
        let b = Ticks::new(ticker.id, 2_500_000_000);
        assert_eq!(
            ticker.duration_between(a, b),
            Duration::of_nanos(2_499_999_000)
        );
        assert_eq!(
            ticker.duration_between(b, a),
            Duration::of_nanos(-2_499_999_000)
        );
    }

    #[test]
    #[should_panic(expected = "did not originate from this ticker")]
    fn mixing_ticker_origins_panics() {
        let ticker = CountingTicker { id: TickerId::allocate() };
        let foreign = Ticks::new(TickerId::allocate(), 0);
        let _ = ticker.duration_between(ticker.ticks(), foreign);
    }

    #[test]
    fn ticks_equality_requires_same_origin() {
        let id = TickerId::allocate();
        assert_eq!(Ticks::new(id, 5), Ticks::new(id, 5));
        assert_ne!(Ticks::new(id, 5), Ticks::new(TickerId::allocate(), 5));
    }

    #[test]
    fn precision_ticks_per_second() {
        assert_eq!(Precision::Millis.ticks_per_second(), 1_000);
        assert_eq!(Precision::Nanos.ticks_per_second(), 1_000_000_000);
    }
}
