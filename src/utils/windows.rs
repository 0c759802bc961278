use std::process::Command;

use chrono::{DateTime, Local};

/// The PowerShell invocation that sets the wall clock to the given local
/// time. `Set-Date` accepts an ISO-style timestamp directly, which avoids
/// the locale-dependent day/month ordering of the legacy `date` command.
pub(super) fn set_clock_command(time: &DateTime<Local>) -> Command {
    let mut command = Command::new("powershell");
    command.arg("-NoProfile");
    command.arg("-Command");
    command.arg(format!(
        "Set-Date -Date \"{}\"",
        time.format("%Y-%m-%dT%H:%M:%S")
    ));
    command
}
