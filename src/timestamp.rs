//! The NTP 64-bit fixed-point timestamp.

use core::fmt;

use rand::RngCore;

use crate::time::Instant;

/// Offset between the NTP epoch (1900-01-01T00:00:00Z) and the Unix epoch,
/// in seconds. See RFC 5905.
pub(crate) const NTP_TIMESTAMP_DELTA: i64 = 2_208_988_800;

/// Length of one NTP era in seconds (2^32, roughly 136 years).
const ERA_SECONDS: i64 = 1 << 32;

const NANOS_IN_SEC: u64 = 1_000_000_000;

/// An NTP timestamp: a 32-bit unsigned second count from the start of an NTP
/// era plus a 32-bit binary fraction of a second.
///
/// The second count wraps every 2^32 seconds, so a `Timestamp64` on its own
/// does not identify a unique point in time. [`Timestamp64::to_instant`]
/// resolves the ambiguity with an era threshold: the decoded instant is the
/// smallest instant at or after the threshold whose NTP second count equals
/// the stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Timestamp64 {
    seconds: u32,
    fraction: u32,
}

impl Timestamp64 {
    /// The all-zero timestamp, used on the wire for "unset" fields.
    pub const ZERO: Timestamp64 = Timestamp64 {
        seconds: 0,
        fraction: 0,
    };

    #[must_use]
    pub const fn new(seconds: u32, fraction: u32) -> Timestamp64 {
        Timestamp64 { seconds, fraction }
    }

    /// The default era threshold: NTP second `0x7FFF_FFFF` of era 0
    /// (1968-01-20T03:14:07Z). With this threshold any timestamp in the
    /// 1968–2104 window decodes to the intended instant.
    #[must_use]
    pub fn default_era_threshold() -> Instant {
        Instant::of_epoch_second(i64::from(u32::MAX / 2) - NTP_TIMESTAMP_DELTA)
    }

    /// NTP seconds within the era.
    #[must_use]
    pub const fn seconds(&self) -> u32 {
        self.seconds
    }

    /// Binary fraction of a second (seconds × 2^32).
    #[must_use]
    pub const fn fraction(&self) -> u32 {
        self.fraction
    }

    /// The on-wire `u64` form: seconds in the high word, fraction in the low.
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.seconds as u64) << 32) | self.fraction as u64
    }

    #[must_use]
    pub const fn from_bits(bits: u64) -> Timestamp64 {
        Timestamp64 {
            seconds: (bits >> 32) as u32,
            fraction: bits as u32,
        }
    }

    /// Converts an instant to its era-relative NTP form.
    ///
    /// The era number is discarded: the NTP second count is the instant's
    /// second count from the NTP epoch reduced modulo 2^32. The fraction is
    /// `floor(nano_of_second × 2^32 / 1e9)`.
    #[must_use]
    pub fn from_instant(instant: Instant) -> Timestamp64 {
        let ntp_seconds = instant.epoch_second() + NTP_TIMESTAMP_DELTA;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let seconds = ntp_seconds.rem_euclid(ERA_SECONDS) as u32;
        #[allow(clippy::cast_possible_truncation)]
        let fraction = ((u64::from(instant.nano()) << 32) / NANOS_IN_SEC) as u32;
        Timestamp64 { seconds, fraction }
    }

    /// Resolves this timestamp to an instant using `era_threshold` to pick
    /// the NTP era.
    ///
    /// Returns the smallest instant at or after the threshold whose NTP
    /// second count equals the stored value. The fraction converts to
    /// nanoseconds truncating, so a round trip through
    /// [`Timestamp64::from_instant`] may lose up to one nanosecond.
    #[must_use]
    pub fn to_instant(self, era_threshold: Instant) -> Instant {
        let threshold_ntp_seconds = era_threshold.epoch_second() + NTP_TIMESTAMP_DELTA;
        let era = threshold_ntp_seconds.div_euclid(ERA_SECONDS);

        #[allow(clippy::cast_possible_truncation)]
        let nanos = ((u64::from(self.fraction) * NANOS_IN_SEC) >> 32) as u32;
        let epoch_seconds =
            era * ERA_SECONDS + i64::from(self.seconds) - NTP_TIMESTAMP_DELTA;
        let candidate = Instant::of_epoch_second_adjusted(epoch_seconds, i64::from(nanos));
        if candidate >= era_threshold {
            candidate
        } else {
            Instant::of_epoch_second_adjusted(epoch_seconds + ERA_SECONDS, i64::from(nanos))
        }
    }

    /// Replaces the `bits` least-significant fraction bits with uniform
    /// random bits, preserving everything above them.
    ///
    /// Used to hide the client clock's true read resolution in transmitted
    /// timestamps (NTP client data minimization).
    ///
    /// # Panics
    ///
    /// Panics unless `1 <= bits < 32`.
    #[must_use]
    pub fn randomize_lowest_bits(self, rng: &mut dyn RngCore, bits: u32) -> Timestamp64 {
        assert!(
            (1..32).contains(&bits),
            "randomized bit count {bits} outside [1, 32)"
        );
        let mask = (1u32 << bits) - 1;
        Timestamp64 {
            seconds: self.seconds,
            fraction: (self.fraction & !mask) | (rng.next_u32() & mask),
        }
    }
}

impl fmt::Display for Timestamp64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}.{:08x}", self.seconds, self.fraction)
    }
}
