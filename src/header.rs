//! The 48-byte NTPv3/v4 message header codec.
//!
//! A received header is stored verbatim; nothing is rejected at decode time.
//! Fields with a constrained on-wire range (poll interval, precision) are
//! validated when they are read, so a response with one bad field can still
//! have its other fields inspected. Outgoing headers are produced through
//! [`NtpHeaderBuilder`], which enforces field ranges at set time.

use core::fmt;

use crate::error::InvalidNtpValue;
use crate::time::Duration;
use crate::timestamp::Timestamp64;

/// Leap indicator bit mask within the first header byte.
const LI_MASK: u8 = 0b1100_0000;
const LI_SHIFT: u8 = 6;
/// Version number bit mask within the first header byte.
const VERSION_MASK: u8 = 0b0011_1000;
const VERSION_SHIFT: u8 = 3;
/// Mode bit mask within the first header byte.
const MODE_MASK: u8 = 0b0000_0111;

const LI_VN_MODE_OFFSET: usize = 0;
const STRATUM_OFFSET: usize = 1;
const POLL_OFFSET: usize = 2;
const PRECISION_OFFSET: usize = 3;
const ROOT_DELAY_OFFSET: usize = 4;
const ROOT_DISPERSION_OFFSET: usize = 8;
const REFERENCE_IDENTIFIER_OFFSET: usize = 12;
const REFERENCE_TIMESTAMP_OFFSET: usize = 16;
const ORIGINATE_TIMESTAMP_OFFSET: usize = 24;
const RECEIVE_TIMESTAMP_OFFSET: usize = 32;
const TRANSMIT_TIMESTAMP_OFFSET: usize = 40;

/// Highest poll interval exponent a conforming server may report.
const MAX_POLL_EXPONENT: u8 = 17;

const NANOS_IN_SEC: u64 = 1_000_000_000;

/// The 4-byte reference identifier field.
///
/// For stratum 0 (Kiss-o'-Death) and stratum 1 the bytes are an ASCII code;
/// for higher strata they hold an IPv4 address or an address hash. Both the
/// raw bytes and a trimmed ASCII rendering are available; non-printable
/// bytes survive only in the byte form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReferenceIdentifier([u8; 4]);

impl ReferenceIdentifier {
    pub const ZERO: ReferenceIdentifier = ReferenceIdentifier([0; 4]);

    #[must_use]
    pub const fn new(bytes: [u8; 4]) -> ReferenceIdentifier {
        ReferenceIdentifier(bytes)
    }

    #[must_use]
    pub const fn bytes(&self) -> [u8; 4] {
        self.0
    }

    /// The ASCII rendering with trailing NULs trimmed; non-ASCII bytes are
    /// replaced.
    #[must_use]
    pub fn as_ascii(&self) -> String {
        let end = self
            .0
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |pos| pos + 1);
        String::from_utf8_lossy(&self.0[..end]).into_owned()
    }
}

impl fmt::Display for ReferenceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_ascii())
    }
}

/// An immutable 48-byte NTP header.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct NtpHeader {
    bytes: [u8; NtpHeader::SIZE],
}

impl NtpHeader {
    /// On-wire size of an NTP header without extension fields.
    pub const SIZE: usize = 48;

    /// Wraps a raw 48-byte header verbatim.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; NtpHeader::SIZE]) -> NtpHeader {
        NtpHeader { bytes }
    }

    /// Wraps a raw header slice; `None` unless it is exactly 48 bytes.
    #[must_use]
    pub fn from_slice(slice: &[u8]) -> Option<NtpHeader> {
        if slice.len() != NtpHeader::SIZE {
            return None;
        }
        let mut bytes = [0u8; NtpHeader::SIZE];
        bytes.copy_from_slice(slice);
        Some(NtpHeader { bytes })
    }

    /// The on-wire form; always exactly 48 bytes.
    #[must_use]
    pub const fn to_bytes(&self) -> [u8; NtpHeader::SIZE] {
        self.bytes
    }

    #[must_use]
    pub fn builder() -> NtpHeaderBuilder {
        NtpHeaderBuilder {
            bytes: [0u8; NtpHeader::SIZE],
        }
    }

    /// Leap indicator, two bits: 0–3.
    #[must_use]
    pub fn leap_indicator(&self) -> u8 {
        (self.bytes[LI_VN_MODE_OFFSET] & LI_MASK) >> LI_SHIFT
    }

    /// Protocol version, three bits: 0–7.
    #[must_use]
    pub fn version_number(&self) -> u8 {
        (self.bytes[LI_VN_MODE_OFFSET] & VERSION_MASK) >> VERSION_SHIFT
    }

    /// Association mode, three bits: 0–7.
    #[must_use]
    pub fn mode(&self) -> u8 {
        self.bytes[LI_VN_MODE_OFFSET] & MODE_MASK
    }

    #[must_use]
    pub fn stratum(&self) -> u8 {
        self.bytes[STRATUM_OFFSET]
    }

    /// Poll interval exponent, validated to [0, 17] on read.
    ///
    /// # Errors
    ///
    /// [`InvalidNtpValue`] if the raw byte is outside the range.
    pub fn poll_interval_exponent(&self) -> Result<u8, InvalidNtpValue> {
        let raw = self.bytes[POLL_OFFSET];
        if raw > MAX_POLL_EXPONENT {
            return Err(InvalidNtpValue::new(
                "poll interval exponent",
                i64::from(raw),
            ));
        }
        Ok(raw)
    }

    /// The poll interval as a duration: `2^exponent` seconds.
    ///
    /// # Errors
    ///
    /// [`InvalidNtpValue`] if the raw exponent is outside [0, 17].
    pub fn poll_interval(&self) -> Result<Duration, InvalidNtpValue> {
        let exponent = self.poll_interval_exponent()?;
        Ok(Duration::of_seconds(1i64 << exponent))
    }

    /// Precision exponent, a negative power of two: [−128, −1].
    ///
    /// # Errors
    ///
    /// [`InvalidNtpValue`] if the raw byte encodes a non-negative exponent.
    pub fn precision_exponent(&self) -> Result<i8, InvalidNtpValue> {
        #[allow(clippy::cast_possible_wrap)]
        let raw = self.bytes[PRECISION_OFFSET] as i8;
        if raw >= 0 {
            return Err(InvalidNtpValue::new("precision exponent", i64::from(raw)));
        }
        Ok(raw)
    }

    /// Root delay as raw unsigned 16.16 fixed-point seconds.
    #[must_use]
    pub fn root_delay_raw(&self) -> u32 {
        self.read_u32(ROOT_DELAY_OFFSET)
    }

    /// Root delay as a duration.
    #[must_use]
    pub fn root_delay(&self) -> Duration {
        fixed_point_to_duration(self.root_delay_raw())
    }

    /// Root dispersion as raw unsigned 16.16 fixed-point seconds.
    #[must_use]
    pub fn root_dispersion_raw(&self) -> u32 {
        self.read_u32(ROOT_DISPERSION_OFFSET)
    }

    /// Root dispersion as a duration.
    #[must_use]
    pub fn root_dispersion(&self) -> Duration {
        fixed_point_to_duration(self.root_dispersion_raw())
    }

    #[must_use]
    pub fn reference_identifier(&self) -> ReferenceIdentifier {
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(
            &self.bytes[REFERENCE_IDENTIFIER_OFFSET..REFERENCE_IDENTIFIER_OFFSET + 4],
        );
        ReferenceIdentifier(bytes)
    }

    #[must_use]
    pub fn reference_timestamp(&self) -> Timestamp64 {
        Timestamp64::from_bits(self.read_u64(REFERENCE_TIMESTAMP_OFFSET))
    }

    #[must_use]
    pub fn originate_timestamp(&self) -> Timestamp64 {
        Timestamp64::from_bits(self.read_u64(ORIGINATE_TIMESTAMP_OFFSET))
    }

    #[must_use]
    pub fn receive_timestamp(&self) -> Timestamp64 {
        Timestamp64::from_bits(self.read_u64(RECEIVE_TIMESTAMP_OFFSET))
    }

    #[must_use]
    pub fn transmit_timestamp(&self) -> Timestamp64 {
        Timestamp64::from_bits(self.read_u64(TRANSMIT_TIMESTAMP_OFFSET))
    }

    fn read_u32(&self, offset: usize) -> u32 {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&self.bytes[offset..offset + 4]);
        u32::from_be_bytes(buf)
    }

    fn read_u64(&self, offset: usize) -> u64 {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&self.bytes[offset..offset + 8]);
        u64::from_be_bytes(buf)
    }
}

impl fmt::Debug for NtpHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NtpHeader")
            .field("leap_indicator", &self.leap_indicator())
            .field("version_number", &self.version_number())
            .field("mode", &self.mode())
            .field("stratum", &self.stratum())
            .field("poll", &self.bytes[POLL_OFFSET])
            .field("precision", &self.bytes[PRECISION_OFFSET])
            .field("root_delay", &self.root_delay_raw())
            .field("root_dispersion", &self.root_dispersion_raw())
            .field("reference_identifier", &self.reference_identifier())
            .field("reference_timestamp", &self.reference_timestamp())
            .field("originate_timestamp", &self.originate_timestamp())
            .field("receive_timestamp", &self.receive_timestamp())
            .field("transmit_timestamp", &self.transmit_timestamp())
            .finish()
    }
}

fn fixed_point_to_duration(raw: u32) -> Duration {
    let seconds = i64::from(raw >> 16);
    #[allow(clippy::cast_possible_truncation)]
    let nanos = (u64::from(raw & 0xFFFF) * NANOS_IN_SEC >> 16) as i64;
    Duration::of_seconds_adjusted(seconds, nanos)
}

/// Builder for outgoing headers. Setters reject out-of-range values
/// immediately.
///
/// # Panics
///
/// Every range violation panics: feeding a builder an out-of-range field is
/// a programming error, not a runtime condition.
#[derive(Debug, Clone)]
pub struct NtpHeaderBuilder {
    bytes: [u8; NtpHeader::SIZE],
}

impl NtpHeaderBuilder {
    #[must_use]
    pub fn leap_indicator(mut self, leap_indicator: u8) -> Self {
        assert!(leap_indicator <= 3, "leap indicator {leap_indicator} outside [0, 3]");
        self.bytes[LI_VN_MODE_OFFSET] = (self.bytes[LI_VN_MODE_OFFSET] & !LI_MASK)
            | (leap_indicator << LI_SHIFT);
        self
    }

    #[must_use]
    pub fn version_number(mut self, version: u8) -> Self {
        assert!(version <= 7, "version number {version} outside [0, 7]");
        self.bytes[LI_VN_MODE_OFFSET] =
            (self.bytes[LI_VN_MODE_OFFSET] & !VERSION_MASK) | (version << VERSION_SHIFT);
        self
    }

    #[must_use]
    pub fn mode(mut self, mode: u8) -> Self {
        assert!(mode <= 7, "mode {mode} outside [0, 7]");
        self.bytes[LI_VN_MODE_OFFSET] = (self.bytes[LI_VN_MODE_OFFSET] & !MODE_MASK) | mode;
        self
    }

    #[must_use]
    pub fn stratum(mut self, stratum: u8) -> Self {
        self.bytes[STRATUM_OFFSET] = stratum;
        self
    }

    #[must_use]
    pub fn poll_interval_exponent(mut self, exponent: u8) -> Self {
        assert!(
            exponent <= MAX_POLL_EXPONENT,
            "poll interval exponent {exponent} outside [0, 17]"
        );
        self.bytes[POLL_OFFSET] = exponent;
        self
    }

    #[must_use]
    pub fn precision_exponent(mut self, exponent: i8) -> Self {
        assert!(exponent < 0, "precision exponent {exponent} must be negative");
        #[allow(clippy::cast_sign_loss)]
        {
            self.bytes[PRECISION_OFFSET] = exponent as u8;
        }
        self
    }

    #[must_use]
    pub fn root_delay_raw(mut self, raw: u32) -> Self {
        self.write_u32(ROOT_DELAY_OFFSET, raw);
        self
    }

    #[must_use]
    pub fn root_dispersion_raw(mut self, raw: u32) -> Self {
        self.write_u32(ROOT_DISPERSION_OFFSET, raw);
        self
    }

    #[must_use]
    pub fn reference_identifier(mut self, identifier: ReferenceIdentifier) -> Self {
        self.bytes[REFERENCE_IDENTIFIER_OFFSET..REFERENCE_IDENTIFIER_OFFSET + 4]
            .copy_from_slice(&identifier.bytes());
        self
    }

    /// Sets the reference identifier from an ASCII code, NUL-padded.
    ///
    /// # Panics
    ///
    /// Panics if `code` is longer than four bytes.
    #[must_use]
    pub fn reference_identifier_ascii(self, code: &str) -> Self {
        assert!(
            code.len() <= 4,
            "reference identifier {code:?} longer than four bytes"
        );
        let mut bytes = [0u8; 4];
        bytes[..code.len()].copy_from_slice(code.as_bytes());
        self.reference_identifier(ReferenceIdentifier(bytes))
    }

    #[must_use]
    pub fn reference_timestamp(mut self, timestamp: Timestamp64) -> Self {
        self.write_u64(REFERENCE_TIMESTAMP_OFFSET, timestamp.to_bits());
        self
    }

    #[must_use]
    pub fn originate_timestamp(mut self, timestamp: Timestamp64) -> Self {
        self.write_u64(ORIGINATE_TIMESTAMP_OFFSET, timestamp.to_bits());
        self
    }

    #[must_use]
    pub fn receive_timestamp(mut self, timestamp: Timestamp64) -> Self {
        self.write_u64(RECEIVE_TIMESTAMP_OFFSET, timestamp.to_bits());
        self
    }

    #[must_use]
    pub fn transmit_timestamp(mut self, timestamp: Timestamp64) -> Self {
        self.write_u64(TRANSMIT_TIMESTAMP_OFFSET, timestamp.to_bits());
        self
    }

    #[must_use]
    pub fn build(self) -> NtpHeader {
        NtpHeader { bytes: self.bytes }
    }

    fn write_u32(&mut self, offset: usize, value: u32) {
        self.bytes[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    fn write_u64(&mut self, offset: usize, value: u64) {
        self.bytes[offset..offset + 8].copy_from_slice(&value.to_be_bytes());
    }
}
