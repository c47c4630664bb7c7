//! cli
//!
//! Command-line interface layer for gitmod.
//!
//! # Responsibilities
//!
//! - Parse command-line arguments and global flags
//! - Install the log subscriber
//! - Merge flags over configuration into [`Settings`]
//! - Delegate to command handlers
//!
//! # Architecture
//!
//! The CLI layer is thin. Handlers open a [`GitFs`] through
//! [`Settings::mount`] and drive it exactly as a filesystem driver would.

pub mod args;
pub mod commands;

pub use args::{Cli, Command, Shell};

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::core::config::{Config, MountConfig};
use crate::fs::GitFs;
use crate::git::Git;
use crate::mount::{RepositoryContext, StartOptions};
use crate::ui::output::Verbosity;

/// Everything a command needs, with precedence applied.
#[derive(Debug, Clone)]
pub struct Settings {
    pub repo: PathBuf,
    pub treeish: String,
    pub allow_exec: bool,
    pub fix: bool,
    pub refresh_delay: Duration,
    pub keep_in_memory: bool,
    pub verbosity: Verbosity,
}

impl Settings {
    /// Layer CLI flags over `config`.
    pub fn resolve(cli: &Cli, config: &Config) -> Result<Self> {
        let flags = MountConfig {
            treeish: cli.treeish.clone(),
            refresh_delay_ms: cli.refresh_delay,
            allow_exec: cli.allow_exec.then_some(true),
            fix: cli.fix.then_some(true),
            keep_in_memory: cli.kim.then_some(true),
        };
        flags.validate().context("invalid command-line flag")?;

        let config = config.with_overrides(&flags);

        Ok(Self {
            repo: cli.repo.clone(),
            treeish: config.treeish(),
            allow_exec: config.allow_exec(),
            fix: config.fix(),
            refresh_delay: config.refresh_delay(),
            keep_in_memory: config.keep_in_memory(),
            verbosity: Verbosity::from_flags(cli.quiet, cli.debug),
        })
    }

    /// Start serving the configured treeish.
    pub fn mount(&self) -> Result<GitFs> {
        let git = Git::open(&self.repo)
            .with_context(|| format!("cannot open repository at {}", self.repo.display()))?;
        let (uid, gid) = owner_of(git.git_dir());
        let options = StartOptions {
            keep_in_memory: self.keep_in_memory,
            fixed_reference: self.fix,
            poll_interval: self.refresh_delay,
            uid,
            gid,
        };
        let context = RepositoryContext::with_store(Arc::new(git), &self.treeish, options)
            .with_context(|| format!("cannot serve '{}'", self.treeish))?;
        Ok(GitFs::new(context, self.allow_exec))
    }
}

/// Owner of the repository directory, reported for every object.
#[cfg(unix)]
fn owner_of(path: &std::path::Path) -> (u32, u32) {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata(path)
        .map(|m| (m.uid(), m.gid()))
        .unwrap_or((0, 0))
}

#[cfg(not(unix))]
fn owner_of(_path: &std::path::Path) -> (u32, u32) {
    (0, 0)
}

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins over the verbosity flags.
fn init_tracing(verbosity: Verbosity, long_running: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_directive(long_running)));
    // already installed when run() is driven twice in one process
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(
        Verbosity::from_flags(cli.quiet, cli.debug),
        cli.command.is_long_running(),
    );

    if let Command::Completion { shell } = cli.command {
        return commands::completion(shell);
    }

    let git_dir = Git::open(&cli.repo).ok().map(|git| git.git_dir().to_path_buf());
    let config = Config::load(git_dir.as_deref()).context("failed to load configuration")?;
    debug!(
        global = ?config.global_config_loaded_from(),
        repo = ?config.repo_config_loaded_from(),
        "configuration loaded"
    );
    let settings = Settings::resolve(&cli, &config)?;

    commands::dispatch(cli.command, &settings)
}
