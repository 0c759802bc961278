use std::process::Command;

use chrono::{DateTime, Local};

/// The `date(1)` invocation that sets the wall clock to the given local
/// time. An ISO-style timestamp keeps the field order unambiguous under
/// every locale.
pub(super) fn set_clock_command(time: &DateTime<Local>) -> Command {
    let mut command = Command::new("date");
    command.arg("-s");
    command.arg(time.format("%Y-%m-%d %H:%M:%S").to_string());
    command
}
