//! Construction of outgoing SNTP client requests.

use log::debug;
use rand::RngCore;

use crate::header::NtpHeader;
use crate::time::InstantSource;
use crate::timestamp::Timestamp64;

/// Client association mode.
pub(crate) const MODE_CLIENT: u8 = 3;
/// Server association mode.
pub(crate) const MODE_SERVER: u8 = 4;

/// How many low-order transmit-timestamp fraction bits are replaced with
/// random bits when client data minimization is enabled.
///
/// The bits above stay intact, so the server still sees a usable originate
/// time while the client's true clock read resolution stays hidden.
pub const CLIENT_DATA_MINIMIZATION_BITS: u32 = 27;

/// Builds the 48-byte client request for each attempt.
///
/// Every field except the transmit timestamp is fixed for a client-mode
/// packet; the transmit timestamp is stamped fresh per call so each attempt
/// carries its own originate time.
#[derive(Debug, Clone, Copy)]
pub struct SntpRequestFactory {
    version: u8,
    data_minimization: bool,
}

impl SntpRequestFactory {
    /// # Panics
    ///
    /// Panics unless `version` is 3 or 4: those are the protocol versions
    /// this client speaks.
    #[must_use]
    pub fn new(version: u8, data_minimization: bool) -> SntpRequestFactory {
        assert!(
            version == 3 || version == 4,
            "client reported version {version} must be 3 or 4"
        );
        SntpRequestFactory {
            version,
            data_minimization,
        }
    }

    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    /// Produces a fresh request stamped with the source's current instant.
    #[must_use]
    pub fn create_request(
        &self,
        instant_source: &dyn InstantSource,
        rng: &mut dyn RngCore,
    ) -> NtpHeader {
        let mut transmit = Timestamp64::from_instant(instant_source.instant());
        if self.data_minimization {
            transmit = transmit.randomize_lowest_bits(rng, CLIENT_DATA_MINIMIZATION_BITS);
        }
        debug!("request transmit timestamp {transmit}");

        NtpHeader::builder()
            .leap_indicator(0)
            .version_number(self.version)
            .mode(MODE_CLIENT)
            .stratum(0)
            .poll_interval_exponent(0)
            .precision_exponent(-1)
            .root_delay_raw(0)
            .root_dispersion_raw(0)
            .reference_timestamp(Timestamp64::ZERO)
            .originate_timestamp(Timestamp64::ZERO)
            .receive_timestamp(Timestamp64::ZERO)
            .transmit_timestamp(transmit)
            .build()
    }
}
