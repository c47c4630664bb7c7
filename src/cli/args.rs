//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--repo <path>`: Repository to serve (default: current directory)
//! - `--treeish <name>`: Branch, tag, revision or tree to track
//! - `--allow-exec` / `-x`: Surface exec bits of executable files
//! - `--fix`: Never re-resolve the reference
//! - `--refresh-delay <ms>`: Delay between polls of the reference
//! - `--kim`: Keep every snapshot in memory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output
//!
//! One-shot commands only log warnings unless `--debug` is given; `watch`
//! and `mount` also log reference tracking at info level.
//!
//! Flags left unset fall back to the config files, then to defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// gitmod - A read-only view of a moving git tree
#[derive(Parser, Debug)]
#[command(name = "gitmod")]
#[command(author, version, about = "gitmod - A read-only view of a moving git tree", long_about = None)]
pub struct Cli {
    /// Path to the git repository
    #[arg(long, global = true, default_value = ".")]
    pub repo: PathBuf,

    /// Treeish to serve: a branch, a revision, a tag or a tree
    /// [default: HEAD]
    #[arg(long, global = true)]
    pub treeish: Option<String>,

    /// Report the exec bit of executable files
    #[arg(short = 'x', long, global = true)]
    pub allow_exec: bool,

    /// Stay on the starting tree instead of following the treeish
    #[arg(long, global = true)]
    pub fix: bool,

    /// Milliseconds between checks of the treeish (0 checks continuously)
    /// [default: 100]
    #[arg(long, global = true, value_name = "MS")]
    pub refresh_delay: Option<u64>,

    /// Keep in memory: walk each tree once and cache every object
    #[arg(long, global = true)]
    pub kim: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

impl Command {
    /// Whether the command keeps serving until stopped.
    pub fn is_long_running(&self) -> bool {
        matches!(self, Command::Watch { .. } | Command::Mount { .. })
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the attributes of a path
    #[command(
        name = "stat",
        after_help = "\
EXAMPLES:
    # Attributes of the root of HEAD
    gitmod stat /

    # A file on another branch, as JSON
    gitmod --treeish develop stat src/main.rs --json"
    )]
    Stat {
        /// Path inside the tree
        path: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List a directory
    #[command(
        name = "ls",
        after_help = "\
EXAMPLES:
    gitmod ls
    gitmod ls src -l
    gitmod --treeish v1.0 ls include"
    )]
    Ls {
        /// Directory inside the tree
        #[arg(default_value = "/")]
        path: String,

        /// Long listing with mode, links, owner, size and time
        #[arg(short, long)]
        long: bool,
    },

    /// Print the contents of a file
    #[command(
        name = "cat",
        after_help = "\
EXAMPLES:
    gitmod cat README.md
    gitmod cat Makefile --offset 100 --length 50"
    )]
    Cat {
        /// File inside the tree
        path: String,

        /// Byte offset to start at
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Maximum number of bytes to print
        #[arg(long)]
        length: Option<usize>,
    },

    /// Follow the treeish and report every tree change
    #[command(
        name = "watch",
        long_about = "Follow the treeish and report every tree change.\n\n\
            Resolves the treeish every --refresh-delay milliseconds. Whenever it \
            points at a different tree, a new snapshot becomes current and the \
            change is printed.",
        after_help = "\
EXAMPLES:
    # Follow main until interrupted
    gitmod --treeish main watch

    # Check ten times, one second apart
    gitmod --refresh-delay 1000 watch --polls 10"
    )]
    Watch {
        /// Stop after this many refresh intervals
        #[arg(long)]
        polls: Option<u64>,

        /// Output as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Mount the tree read-only at a directory
    #[command(
        name = "mount",
        long_about = "Mount the tree read-only at a directory.\n\n\
            Serves the treeish through FUSE until the directory is unmounted \
            (fusermount -u <MOUNTPOINT>). Unless --fix is given, the mount \
            follows the treeish as it moves. Needs a build with the `fuse` \
            feature.",
        after_help = "\
EXAMPLES:
    # Follow main at /mnt/main
    gitmod --treeish main mount /mnt/main

    # A fixed tag, with exec bits
    gitmod --treeish v1.0 --fix -x mount ./v1"
    )]
    Mount {
        /// Existing empty directory to mount at
        mountpoint: PathBuf,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
EXAMPLES:
    # Bash
    gitmod completion bash > ~/.local/share/bash-completion/completions/gitmod

    # Zsh
    gitmod completion zsh > ~/.zfunc/_gitmod

    # Fish
    gitmod completion fish > ~/.config/fish/completions/gitmod.fish

    # PowerShell
    gitmod completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
