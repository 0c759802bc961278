use core::fmt;
use core::ops::{Add, Sub};

use crate::time::duration::Duration;
use crate::time::{MILLIS_IN_SEC, NANOS_IN_MILLI, NANOS_IN_SEC};

/// A point on the UTC timeline.
///
/// Represented as a second count from `1970-01-01T00:00:00Z` plus a
/// nanosecond-of-second in `[0, 1e9)`. Instants before the epoch carry the
/// sign in the second count, so the derived ordering is correct.
///
/// The supported second range is `[-31_556_889_864_403_199,
/// 31_556_889_864_403_199]` (roughly ±1 billion years); constructors panic
/// outside it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Instant {
    seconds: i64,
    nanos: u32,
}

impl Instant {
    pub(crate) const MIN_SECOND: i64 = -31_556_889_864_403_199;
    pub(crate) const MAX_SECOND: i64 = 31_556_889_864_403_199;

    /// The earliest supported instant.
    pub const MIN: Instant = Instant {
        seconds: Instant::MIN_SECOND,
        nanos: 0,
    };

    /// The latest supported instant.
    pub const MAX: Instant = Instant {
        seconds: Instant::MAX_SECOND,
        nanos: NANOS_IN_SEC - 1,
    };

    /// The Unix epoch, `1970-01-01T00:00:00Z`.
    pub const EPOCH: Instant = Instant { seconds: 0, nanos: 0 };

    /// An instant at a whole second offset from the epoch.
    ///
    /// # Panics
    ///
    /// Panics if `seconds` is outside the supported range.
    #[must_use]
    pub fn of_epoch_second(seconds: i64) -> Instant {
        Instant::create(seconds, 0)
    }

    /// An instant at `seconds` from the epoch plus a signed nanosecond
    /// adjustment, renormalized so the nano-of-second lands in `[0, 1e9)`.
    ///
    /// # Panics
    ///
    /// Panics if the normalized instant is outside the supported range.
    #[must_use]
    pub fn of_epoch_second_adjusted(seconds: i64, nano_adjustment: i64) -> Instant {
        let carry = nano_adjustment.div_euclid(i64::from(NANOS_IN_SEC));
        let nanos = nano_adjustment.rem_euclid(i64::from(NANOS_IN_SEC));
        let seconds = seconds
            .checked_add(carry)
            .unwrap_or_else(|| panic!("instant second overflow"));

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Instant::create(seconds, nanos as u32)
    }

    /// An instant from a millisecond offset from the epoch.
    #[must_use]
    pub fn of_epoch_milli(millis: i64) -> Instant {
        let seconds = millis.div_euclid(MILLIS_IN_SEC);
        let sub_millis = millis.rem_euclid(MILLIS_IN_SEC);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Instant::create(seconds, sub_millis as u32 * NANOS_IN_MILLI)
    }

    pub(crate) fn create(seconds: i64, nanos: u32) -> Instant {
        assert!(
            (Instant::MIN_SECOND..=Instant::MAX_SECOND).contains(&seconds),
            "instant second {seconds} outside the supported range"
        );
        debug_assert!(nanos < NANOS_IN_SEC);
        Instant { seconds, nanos }
    }

    /// Seconds from the epoch; negative before 1970.
    #[must_use]
    pub const fn epoch_second(&self) -> i64 {
        self.seconds
    }

    /// Nanosecond-of-second, always in `[0, 1e9)`.
    #[must_use]
    pub const fn nano(&self) -> u32 {
        self.nanos
    }

    /// Milliseconds from the epoch, truncating sub-millisecond nanoseconds
    /// toward negative infinity (exact inverse of [`Instant::of_epoch_milli`]
    /// for millisecond-aligned instants).
    ///
    /// # Panics
    ///
    /// Panics if the millisecond count overflows `i64`.
    #[must_use]
    pub fn to_epoch_milli(&self) -> i64 {
        let millis = i128::from(self.seconds) * i128::from(MILLIS_IN_SEC)
            + i128::from(self.nanos / NANOS_IN_MILLI);
        i64::try_from(millis).unwrap_or_else(|_| panic!("instant millisecond overflow"))
    }

    /// Checked addition of a duration. `None` if the result leaves the
    /// supported range.
    #[must_use]
    pub fn checked_add(self, duration: Duration) -> Option<Instant> {
        let mut seconds = self.seconds.checked_add(duration.seconds())?;
        let mut nanos = self.nanos + duration.subsec_nanos();
        if nanos >= NANOS_IN_SEC {
            nanos -= NANOS_IN_SEC;
            seconds = seconds.checked_add(1)?;
        }
        if !(Instant::MIN_SECOND..=Instant::MAX_SECOND).contains(&seconds) {
            return None;
        }
        Some(Instant { seconds, nanos })
    }

    /// Checked subtraction of a duration. `None` if the result leaves the
    /// supported range.
    #[must_use]
    pub fn checked_sub(self, duration: Duration) -> Option<Instant> {
        let mut seconds = self.seconds.checked_sub(duration.seconds())?;
        let nanos = if self.nanos >= duration.subsec_nanos() {
            self.nanos - duration.subsec_nanos()
        } else {
            seconds = seconds.checked_sub(1)?;
            self.nanos + NANOS_IN_SEC - duration.subsec_nanos()
        };
        if !(Instant::MIN_SECOND..=Instant::MAX_SECOND).contains(&seconds) {
            return None;
        }
        Some(Instant { seconds, nanos })
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    /// # Panics
    ///
    /// Panics if the result leaves the supported range.
    fn add(self, rhs: Duration) -> Instant {
        self.checked_add(rhs)
            .unwrap_or_else(|| panic!("instant out of supported range"))
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;

    /// # Panics
    ///
    /// Panics if the result leaves the supported range.
    fn sub(self, rhs: Duration) -> Instant {
        self.checked_sub(rhs)
            .unwrap_or_else(|| panic!("instant out of supported range"))
    }
}

impl Sub for Instant {
    type Output = Duration;

    /// The elapsed time from `rhs` to `self`; sugar for
    /// [`Duration::between`]`(rhs, self)`.
    fn sub(self, rhs: Instant) -> Duration {
        Duration::between(rhs, self)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}Z", self.seconds, self.nanos)
    }
}
