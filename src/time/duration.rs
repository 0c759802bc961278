use core::fmt;
use core::ops::{Add, Neg, Sub};

use crate::time::instant::Instant;
use crate::time::{MILLIS_IN_SEC, NANOS_IN_MILLI, NANOS_IN_SEC};

/// A signed span of time with nanosecond resolution.
///
/// Stored in canonical form: `nanos` is always in `[0, 1_000_000_000)` and a
/// negative duration carries its sign in `seconds`. `-0.5s` is therefore
/// `{ seconds: -1, nanos: 500_000_000 }`, which keeps the derived ordering
/// correct without a custom comparator.
///
/// Arithmetic that cannot represent its result panics; the checked variants
/// return `None` instead. This mirrors the operator/`checked_*` split of
/// `std::time::Duration`, except that this type is signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration {
    seconds: i64,
    nanos: u32,
}

impl Duration {
    /// The zero-length duration.
    pub const ZERO: Duration = Duration { seconds: 0, nanos: 0 };

    /// The largest representable duration.
    pub const MAX: Duration = Duration {
        seconds: i64::MAX,
        nanos: NANOS_IN_SEC - 1,
    };

    /// The smallest (most negative) representable duration.
    pub const MIN: Duration = Duration {
        seconds: i64::MIN,
        nanos: 0,
    };

    /// A duration of whole seconds.
    #[must_use]
    pub const fn of_seconds(seconds: i64) -> Duration {
        Duration { seconds, nanos: 0 }
    }

    /// A duration of `seconds` plus a signed nanosecond adjustment.
    ///
    /// The adjustment may be any `i64`; the result is renormalized so the
    /// stored nanosecond field lands in `[0, 1e9)`.
    ///
    /// # Panics
    ///
    /// Panics if the resulting second count overflows `i64`.
    #[must_use]
    pub fn of_seconds_adjusted(seconds: i64, nano_adjustment: i64) -> Duration {
        let carry_seconds = nano_adjustment.div_euclid(i64::from(NANOS_IN_SEC));
        let nanos = nano_adjustment.rem_euclid(i64::from(NANOS_IN_SEC));
        let seconds = seconds
            .checked_add(carry_seconds)
            .unwrap_or_else(|| panic!("duration seconds overflow"));

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration {
            seconds,
            nanos: nanos as u32,
        }
    }

    /// A duration of whole milliseconds.
    #[must_use]
    pub fn of_millis(millis: i64) -> Duration {
        let seconds = millis.div_euclid(MILLIS_IN_SEC);
        let sub_millis = millis.rem_euclid(MILLIS_IN_SEC);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration {
            seconds,
            nanos: sub_millis as u32 * NANOS_IN_MILLI,
        }
    }

    /// A duration of whole nanoseconds.
    #[must_use]
    pub fn of_nanos(nanos: i64) -> Duration {
        Duration::of_seconds_adjusted(0, nanos)
    }

    /// The elapsed time from `start` to `end` (`end - start`).
    ///
    /// Never fails: the full instant range fits in a `Duration`.
    #[must_use]
    pub fn between(start: Instant, end: Instant) -> Duration {
        let seconds = end.epoch_second() - start.epoch_second();
        let nanos = i64::from(end.nano()) - i64::from(start.nano());
        Duration::of_seconds_adjusted(seconds, nanos)
    }

    /// The whole-second part, which carries the sign.
    #[must_use]
    pub const fn seconds(&self) -> i64 {
        self.seconds
    }

    /// The nanosecond-of-second part, always in `[0, 1e9)`.
    #[must_use]
    pub const fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.seconds == 0 && self.nanos == 0
    }

    #[must_use]
    pub const fn is_negative(&self) -> bool {
        self.seconds < 0
    }

    /// Checked addition. `None` on overflow.
    #[must_use]
    pub fn checked_add(self, other: Duration) -> Option<Duration> {
        let mut seconds = self.seconds.checked_add(other.seconds)?;
        let mut nanos = self.nanos + other.nanos;
        if nanos >= NANOS_IN_SEC {
            nanos -= NANOS_IN_SEC;
            seconds = seconds.checked_add(1)?;
        }
        Some(Duration { seconds, nanos })
    }

    /// Checked subtraction. `None` on overflow.
    #[must_use]
    pub fn checked_sub(self, other: Duration) -> Option<Duration> {
        let mut seconds = self.seconds.checked_sub(other.seconds)?;
        let nanos = if self.nanos >= other.nanos {
            self.nanos - other.nanos
        } else {
            seconds = seconds.checked_sub(1)?;
            self.nanos + NANOS_IN_SEC - other.nanos
        };
        Some(Duration { seconds, nanos })
    }

    /// Division by an integer, rounding toward zero.
    ///
    /// Rounding toward zero keeps the operation sign-symmetric:
    /// `(-d).divided_by(n) == -(d.divided_by(n))`.
    ///
    /// # Panics
    ///
    /// Panics if `divisor` is zero.
    #[must_use]
    pub fn divided_by(self, divisor: i64) -> Duration {
        assert!(divisor != 0, "division of a duration by zero");
        let total = self.as_total_nanos() / i128::from(divisor);
        Duration::from_total_nanos(total)
    }

    /// The duration in whole milliseconds, truncating sub-millisecond
    /// nanoseconds toward zero.
    ///
    /// # Panics
    ///
    /// Panics if the millisecond count overflows `i64`.
    #[must_use]
    pub fn to_millis(self) -> i64 {
        let millis = self.as_total_nanos() / i128::from(NANOS_IN_MILLI);
        i64::try_from(millis).unwrap_or_else(|_| panic!("duration millisecond overflow"))
    }

    /// The duration in whole nanoseconds.
    ///
    /// # Panics
    ///
    /// Panics if the nanosecond count overflows `i64`.
    #[must_use]
    pub fn to_nanos(self) -> i64 {
        i64::try_from(self.as_total_nanos())
            .unwrap_or_else(|_| panic!("duration nanosecond overflow"))
    }

    /// Conversion to `std::time::Duration`. `None` for negative durations,
    /// which `std` cannot represent.
    #[must_use]
    pub fn to_std_duration(self) -> Option<std::time::Duration> {
        if self.is_negative() {
            return None;
        }
        #[allow(clippy::cast_sign_loss)]
        Some(std::time::Duration::new(self.seconds as u64, self.nanos))
    }

    fn as_total_nanos(self) -> i128 {
        i128::from(self.seconds) * i128::from(NANOS_IN_SEC) + i128::from(self.nanos)
    }

    fn from_total_nanos(total: i128) -> Duration {
        let seconds = total.div_euclid(i128::from(NANOS_IN_SEC));
        let nanos = total.rem_euclid(i128::from(NANOS_IN_SEC));

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Duration {
            seconds: i64::try_from(seconds)
                .unwrap_or_else(|_| panic!("duration seconds overflow")),
            nanos: nanos as u32,
        }
    }
}

impl Add for Duration {
    type Output = Duration;

    /// # Panics
    ///
    /// Panics on overflow. Use [`Duration::checked_add`] to observe overflow
    /// as a value.
    fn add(self, rhs: Duration) -> Duration {
        self.checked_add(rhs)
            .unwrap_or_else(|| panic!("duration addition overflow"))
    }
}

impl Sub for Duration {
    type Output = Duration;

    /// # Panics
    ///
    /// Panics on overflow. Use [`Duration::checked_sub`] to observe overflow
    /// as a value.
    fn sub(self, rhs: Duration) -> Duration {
        self.checked_sub(rhs)
            .unwrap_or_else(|| panic!("duration subtraction overflow"))
    }
}

impl Neg for Duration {
    type Output = Duration;

    fn neg(self) -> Duration {
        Duration::ZERO - self
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.seconds < 0 && self.nanos > 0 {
            // Render -0.5s as "-0.500000000s", not "-1.500000000s".
            let positive = -*self;
            write!(f, "-{}.{:09}s", positive.seconds, positive.nanos)
        } else {
            write!(f, "{}.{:09}s", self.seconds, self.nanos)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form() {
        let d = Duration::of_seconds_adjusted(0, -1);
        assert_eq!(d.seconds(), -1);
        assert_eq!(d.subsec_nanos(), 999_999_999);

        let d = Duration::of_seconds_adjusted(3, 2_500_000_000);
        assert_eq!(d.seconds(), 5);
        assert_eq!(d.subsec_nanos(), 500_000_000);

        let d = Duration::of_millis(-1500);
        assert_eq!(d.seconds(), -2);
        assert_eq!(d.subsec_nanos(), 500_000_000);
    }

    #[test]
    fn add_and_sub() {
        let a = Duration::of_millis(1_500);
        let b = Duration::of_millis(700);

        assert_eq!(a + b, Duration::of_millis(2_200));
        assert_eq!(a - b, Duration::of_millis(800));
        assert_eq!(b - a, Duration::of_millis(-800));
        assert_eq!(-(a - b), b - a);
    }

    #[test]
    fn add_at_max_overflows() {
        assert_eq!(Duration::MAX.checked_add(Duration::of_nanos(1)), None);
        assert_eq!(Duration::MIN.checked_sub(Duration::of_nanos(1)), None);
        assert_eq!(
            Duration::MAX.checked_add(Duration::ZERO),
            Some(Duration::MAX)
        );
    }

    #[test]
    #[should_panic(expected = "duration addition overflow")]
    fn add_operator_panics_on_overflow() {
        let _ = Duration::MAX + Duration::of_nanos(1);
    }

    #[test]
    fn divided_by_rounds_toward_zero() {
        let d = Duration::of_nanos(7);
        assert_eq!(d.divided_by(2), Duration::of_nanos(3));
        assert_eq!((-d).divided_by(2), Duration::of_nanos(-3));
        assert_eq!((-d).divided_by(2), -(d.divided_by(2)));

        // The offset formula divides signed sums like this one.
        let d = Duration::of_millis(100) + Duration::of_millis(-109);
        assert_eq!(d.divided_by(2), Duration::of_nanos(-4_500_000));
    }

    #[test]
    #[should_panic(expected = "division of a duration by zero")]
    fn divided_by_zero_panics() {
        let _ = Duration::of_seconds(1).divided_by(0);
    }

    #[test]
    fn to_millis_truncates_toward_zero() {
        assert_eq!(Duration::of_nanos(1_999_999).to_millis(), 1);
        assert_eq!(Duration::of_nanos(-1_999_999).to_millis(), -1);
        assert_eq!(Duration::of_nanos(999_999).to_millis(), 0);
    }

    #[test]
    fn to_nanos_round_trips() {
        for n in [0i64, 1, -1, 999_999_999, -999_999_999, 1_000_000_001] {
            assert_eq!(Duration::of_nanos(n).to_nanos(), n);
        }
    }

    #[test]
    #[should_panic(expected = "duration nanosecond overflow")]
    fn to_nanos_overflow_panics() {
        let _ = Duration::of_seconds(i64::MAX).to_nanos();
    }

    #[test]
    fn between_instants() {
        let a = Instant::of_epoch_second_adjusted(10, 900_000_000);
        let b = Instant::of_epoch_second_adjusted(12, 100_000_000);
        assert_eq!(Duration::between(a, b), Duration::of_millis(1_200));
        assert_eq!(Duration::between(b, a), Duration::of_millis(-1_200));
        assert_eq!(Duration::between(a, a), Duration::ZERO);
    }

    #[test]
    fn ordering_is_consistent_with_sign() {
        assert!(Duration::of_millis(-1) < Duration::ZERO);
        assert!(Duration::ZERO < Duration::of_nanos(1));
        assert!(Duration::of_millis(-1500) < Duration::of_millis(-500));
    }

    #[test]
    fn display_renders_sign() {
        assert_eq!(Duration::of_millis(1500).to_string(), "1.500000000s");
        assert_eq!(Duration::of_millis(-500).to_string(), "-0.500000000s");
        assert_eq!(Duration::of_seconds(-2).to_string(), "-2.000000000s");
    }

    #[test]
    fn nano_of_second_always_canonical() {
        for (secs, adj) in [
            (0i64, 0i64),
            (0, -1),
            (5, 1_999_999_999),
            (-5, -1_999_999_999),
            (1, i64::from(u32::MAX)),
        ] {
            let d = Duration::of_seconds_adjusted(secs, adj);
            assert!(d.subsec_nanos() < NANOS_IN_SEC);
        }
    }
}
