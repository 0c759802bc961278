use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::time::instant::Instant;
use crate::time::ticks::{InstantSource, Precision, Ticker, TickerId, Ticks};

/// Wall-clock readings from [`std::time::SystemTime`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemInstantSource;

impl InstantSource for SystemInstantSource {
    fn instant(&self) -> Instant {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(since) => {
                #[allow(clippy::cast_possible_wrap)]
                Instant::of_epoch_second_adjusted(
                    since.as_secs() as i64,
                    i64::from(since.subsec_nanos()),
                )
            }
            // Clock set before 1970; the reading is still well-defined.
            Err(err) => {
                let before = err.duration();
                #[allow(clippy::cast_possible_wrap)]
                Instant::of_epoch_second_adjusted(
                    -(before.as_secs() as i64),
                    -i64::from(before.subsec_nanos()),
                )
            }
        }
    }

    fn precision(&self) -> Precision {
        Precision::Nanos
    }
}

/// Wall-clock readings truncated to millisecond precision.
///
/// For hosts whose clock reads are only meaningful to the millisecond; the
/// declared [`Precision::Millis`] tells consumers not to trust the
/// sub-millisecond digits, and truncating makes the reading honest about it.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMillisInstantSource;

impl InstantSource for SystemMillisInstantSource {
    fn instant(&self) -> Instant {
        Instant::of_epoch_milli(SystemInstantSource.instant().to_epoch_milli())
    }

    fn precision(&self) -> Precision {
        Precision::Millis
    }
}

/// Nanosecond ticks from [`std::time::Instant`], anchored at construction.
#[derive(Debug)]
pub struct MonotonicTicker {
    id: TickerId,
    anchor: std::time::Instant,
}

impl MonotonicTicker {
    #[must_use]
    pub fn new() -> MonotonicTicker {
        MonotonicTicker {
            id: TickerId::allocate(),
            anchor: std::time::Instant::now(),
        }
    }
}

impl Default for MonotonicTicker {
    fn default() -> Self {
        MonotonicTicker::new()
    }
}

impl Ticker for MonotonicTicker {
    fn ticks(&self) -> Ticks {
        let elapsed = self.anchor.elapsed();
        #[allow(clippy::cast_possible_truncation)]
        Ticks::new(self.id, elapsed.as_nanos() as i64)
    }

    fn id(&self) -> TickerId {
        self.id
    }
}

/// A ticker that applies a constant frequency-error correction to another
/// ticker.
///
/// The adjustment is expressed in parts per billion: `adjustment_ppb`
/// correction ticks are added per `10^9` base ticks. The correction term is
/// computed in floating point so that large ppb magnitudes cannot overflow
/// the intermediate multiplication, then added to the base nanosecond delta.
/// Readings are stamped with this ticker's own id and are zero at the anchor
/// reading captured from the base ticker at construction.
pub struct LinearAdjustmentTicker {
    id: TickerId,
    base: Arc<dyn Ticker>,
    anchor: Ticks,
    adjustment_ppb: i64,
}

impl LinearAdjustmentTicker {
    #[must_use]
    pub fn new(base: Arc<dyn Ticker>, adjustment_ppb: i64) -> LinearAdjustmentTicker {
        let anchor = base.ticks();
        LinearAdjustmentTicker {
            id: TickerId::allocate(),
            base,
            anchor,
            adjustment_ppb,
        }
    }

    /// The correction applied per 10^9 base ticks.
    #[must_use]
    pub fn adjustment_ppb(&self) -> i64 {
        self.adjustment_ppb
    }
}

impl Ticker for LinearAdjustmentTicker {
    fn ticks(&self) -> Ticks {
        let elapsed = self
            .base
            .duration_between(self.anchor, self.base.ticks())
            .to_nanos();
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let adjustment = (elapsed as f64 * self.adjustment_ppb as f64 / 1e9) as i64;
        Ticks::new(self.id, elapsed + adjustment)
    }

    fn id(&self) -> TickerId {
        self.id
    }
}
