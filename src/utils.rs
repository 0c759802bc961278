//! Helpers for applying a time signal to the host system clock.
//!
//! Currently Unix and Windows based systems are supported.

use std::io;
use std::process::ExitStatus;

use chrono::{Local, TimeZone, Timelike, Utc};
use log::debug;
use thiserror::Error;

use crate::result::SntpTimeSignal;
use crate::time::Instant;

#[cfg(unix)]
use unix::set_clock_command;
#[cfg(windows)]
use windows::set_clock_command;

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

/// Failure to apply an instant to the system clock.
#[derive(Debug, Error)]
pub enum SystemClockError {
    /// The instant has no calendar form the platform tool can accept.
    #[error("instant {0} is not representable as a calendar time")]
    UnrepresentableInstant(Instant),
    /// The clock-set command could not be run at all.
    #[error("unable to run the clock-set command: {0}")]
    Io(#[from] io::Error),
    /// The clock-set command ran and refused, usually for lack of
    /// privileges.
    #[error("clock-set command exited with {0}")]
    CommandFailed(ExitStatus),
}

/// Sets the system clock to the corrected instant a successful query
/// produced.
///
/// The signal's offset applies at the moment its ticks were captured; any
/// time spent between the query and this call widens the error, so call it
/// promptly.
///
/// # Errors
///
/// [`SystemClockError`] if the platform tool cannot be run or rejects the
/// new time.
pub fn update_system_time(signal: &SntpTimeSignal) -> Result<(), SystemClockError> {
    set_system_clock(signal.result_instant())
}

/// Sets the system clock to `instant` via the platform command line tool.
///
/// # Errors
///
/// [`SystemClockError`] if `instant` has no calendar form, the tool cannot
/// be run, or it exits unsuccessfully.
pub fn set_system_clock(instant: Instant) -> Result<(), SystemClockError> {
    let Some(time) = Utc
        .timestamp_opt(instant.epoch_second(), instant.nano())
        .single()
    else {
        return Err(SystemClockError::UnrepresentableInstant(instant));
    };
    let local_time = time.with_timezone(&Local);
    debug!(
        "UTC time: {:02}:{:02}:{:02}",
        time.hour(),
        time.minute(),
        time.second()
    );
    debug!(
        "{} time: {:02}:{:02}:{:02}",
        local_time.offset(),
        local_time.hour(),
        local_time.minute(),
        local_time.second()
    );

    let status = set_clock_command(&local_time).status()?;
    if !status.success() {
        return Err(SystemClockError::CommandFailed(status));
    }
    Ok(())
}
