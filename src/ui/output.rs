//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag.
//! When `--json` is enabled, output is machine-readable JSON.
//! Diagnostics go through `tracing`; this module only prints results.

use std::fmt::Display;

use crate::fs::{FileAttr, FileType};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }

    /// Default log filter directive for this level.
    ///
    /// At the normal level, info events are only shown for commands that
    /// keep running.
    pub fn log_directive(self, long_running: bool) -> &'static str {
        match self {
            Verbosity::Quiet => "gitmod=warn",
            Verbosity::Normal if long_running => "gitmod=info",
            Verbosity::Normal => "gitmod=warn",
            Verbosity::Debug => "gitmod=debug",
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Format permission bits the way `ls -l` does, e.g. `dr-xr-xr-x`.
pub fn format_mode(kind: FileType, perm: u32) -> String {
    let mut out = String::with_capacity(10);
    out.push(match kind {
        FileType::Directory => 'd',
        FileType::RegularFile => '-',
    });
    for shift in [6, 3, 0] {
        let bits = (perm >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

/// One `ls -l` style line for `name`.
pub fn format_long(attr: &FileAttr, name: &str) -> String {
    format!(
        "{} {:>3} {:>5} {:>5} {:>8} {} {}",
        format_mode(attr.kind, attr.perm),
        attr.nlink,
        attr.uid,
        attr.gid,
        attr.size,
        attr.time.as_datetime().format("%Y-%m-%d %H:%M"),
        name
    )
}

/// Format a list of items.
pub fn format_list<T: Display>(items: &[T], prefix: &str) -> String {
    items
        .iter()
        .map(|item| format!("{}{}", prefix, item))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::UtcTimestamp;

    #[test]
    fn verbosity_precedence() {
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, true), Verbosity::Debug);
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
    }

    #[test]
    fn one_shot_commands_log_warnings_only() {
        assert_eq!(Verbosity::Normal.log_directive(false), "gitmod=warn");
        assert_eq!(Verbosity::Normal.log_directive(true), "gitmod=info");
        assert_eq!(Verbosity::Quiet.log_directive(true), "gitmod=warn");
        assert_eq!(Verbosity::Debug.log_directive(false), "gitmod=debug");
    }

    #[test]
    fn mode_strings() {
        assert_eq!(format_mode(FileType::Directory, 0o555), "dr-xr-xr-x");
        assert_eq!(format_mode(FileType::RegularFile, 0o444), "-r--r--r--");
        assert_eq!(format_mode(FileType::RegularFile, 0o755), "-rwxr-xr-x");
    }

    #[test]
    fn long_line_ends_with_name() {
        let attr = FileAttr {
            path: "/README".to_string(),
            kind: FileType::RegularFile,
            perm: 0o444,
            nlink: 1,
            size: 12,
            uid: 1000,
            gid: 100,
            time: UtcTimestamp::from_unix_seconds(0),
            object: "0".repeat(40),
        };
        let line = format_long(&attr, "README");
        assert!(line.starts_with("-r--r--r--"));
        assert!(line.contains("1970-01-01 00:00"));
        assert!(line.ends_with(" README"));
    }

    #[test]
    fn list_prefixing() {
        assert_eq!(format_list(&["a", "b"], "  "), "  a\n  b");
    }
}
