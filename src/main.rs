//! Binary entrypoint: open a conversation from the terminal.

use std::process::ExitCode;

use gearshare::start_gearshare;

/// Send an optional message and print the conversation.
fn main() -> ExitCode {
    start_gearshare::run()
}
