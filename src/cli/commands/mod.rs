//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Mounts the configured treeish through [`Settings::mount`]
//! 2. Issues the filesystem calls a driver would issue
//! 3. Formats and displays output
//! 4. Releases everything it opened and stops the mount

mod cat;
mod completion;
mod ls;
mod mount;
mod stat;
mod watch;

pub use cat::cat;
pub use completion::completion;
pub use ls::ls;
pub use mount::mount;
pub use stat::stat;
pub use watch::watch;

use crate::cli::args::Command;
use crate::cli::Settings;
use anyhow::Result;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, settings: &Settings) -> Result<()> {
    match command {
        Command::Stat { path, json } => stat::stat(settings, &path, json),
        Command::Ls { path, long } => ls::ls(settings, &path, long),
        Command::Cat {
            path,
            offset,
            length,
        } => cat::cat(settings, &path, offset, length),
        Command::Watch { polls, json } => watch::watch(settings, polls, json),
        Command::Mount { mountpoint } => mount::mount(settings, &mountpoint),
        Command::Completion { shell } => completion::completion(shell),
    }
}
