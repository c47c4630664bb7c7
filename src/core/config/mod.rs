//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! gitmod has two configuration scopes:
//! - **Global**: User-level settings
//! - **Repo**: Repository-level overrides
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$GITMOD_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/gitmod/config.toml`
//! 3. `~/.gitmod/config.toml`
//!
//! # Repo Config Location
//!
//! `<git dir>/gitmod/config.toml`, where the git dir is the `.git`
//! directory, or the repository itself when bare.
//!
//! # Example
//!
//! ```no_run
//! use gitmod::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/path/to/repo/.git"))).unwrap();
//! println!("Tracking: {}", config.treeish());
//! println!("Refresh delay: {:?}", config.refresh_delay());
//! ```

pub mod schema;

pub use schema::{MountConfig, MAX_REFRESH_DELAY_MS};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;

/// Default tracked reference.
pub const DEFAULT_TREEISH: &str = "HEAD";

/// Default delay between polls, in milliseconds.
pub const DEFAULT_REFRESH_DELAY_MS: u64 = 100;

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Merged configuration from all file sources.
///
/// Accessors apply precedence and defaults; CLI flags are layered on top
/// by the caller.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: MountConfig,
    /// Repository configuration (if one was found)
    pub repo: Option<MountConfig>,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `git_dir` is provided, also loads the repository file.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be read, parsed or
    /// validated. Missing config files are not an error (defaults are used).
    pub fn load(git_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let global = Self::global_candidates().into_iter().find(|p| p.exists());
        let repo = git_dir.map(Self::repo_config_path).filter(|p| p.exists());
        Self::load_from(global.as_deref(), repo.as_deref())
    }

    /// Load configuration from explicit files.
    ///
    /// # Errors
    ///
    /// As [`Config::load`].
    pub fn load_from(global: Option<&Path>, repo: Option<&Path>) -> Result<Self, ConfigError> {
        let global_config = match global {
            Some(path) => Self::read_config(path)?,
            None => MountConfig::default(),
        };
        let repo_config = repo.map(Self::read_config).transpose()?;

        global_config.validate()?;
        if let Some(ref r) = repo_config {
            r.validate()?;
        }

        Ok(Config {
            global: global_config,
            repo: repo_config,
            global_path: global.map(Path::to_path_buf),
            repo_path: repo.map(Path::to_path_buf),
        })
    }

    /// Configuration from in-memory values, not backed by files.
    pub fn new(global: MountConfig, repo: Option<MountConfig>) -> Self {
        Config {
            global,
            repo,
            global_path: None,
            repo_path: None,
        }
    }

    /// Layer `overrides` (e.g. command-line flags) above every file scope.
    pub fn with_overrides(&self, overrides: &MountConfig) -> Self {
        let repo = match &self.repo {
            Some(repo) => repo.merged_with(overrides),
            None => overrides.clone(),
        };
        Config {
            repo: Some(repo),
            ..self.clone()
        }
    }

    /// Global config locations, in search order.
    pub fn global_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();
        if let Ok(path) = std::env::var("GITMOD_CONFIG") {
            candidates.push(PathBuf::from(path));
        }
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            candidates.push(PathBuf::from(xdg_home).join("gitmod/config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".gitmod/config.toml"));
        }
        candidates
    }

    /// Path of the repository config file below `git_dir`.
    pub fn repo_config_path(git_dir: &Path) -> PathBuf {
        git_dir.join("gitmod/config.toml")
    }

    /// Read and parse a config file.
    fn read_config(path: &Path) -> Result<MountConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn effective(&self) -> MountConfig {
        match &self.repo {
            Some(repo) => self.global.merged_with(repo),
            None => self.global.clone(),
        }
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Reference to track. Defaults to `HEAD`.
    pub fn treeish(&self) -> String {
        self.effective()
            .treeish
            .unwrap_or_else(|| DEFAULT_TREEISH.to_string())
    }

    /// Delay between polls. Defaults to 100ms.
    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(
            self.effective()
                .refresh_delay_ms
                .unwrap_or(DEFAULT_REFRESH_DELAY_MS),
        )
    }

    /// Whether exec bits surface. Defaults to `false`.
    pub fn allow_exec(&self) -> bool {
        self.effective().allow_exec.unwrap_or(false)
    }

    /// Whether the reference is fixed. Defaults to `false`.
    pub fn fix(&self) -> bool {
        self.effective().fix.unwrap_or(false)
    }

    /// Whether snapshots are cached eagerly. Defaults to `false`.
    pub fn keep_in_memory(&self) -> bool {
        self.effective().keep_in_memory.unwrap_or(false)
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded repo config file.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, contents: &str) -> PathBuf {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn defaults_without_files() {
        let config = Config::load_from(None, None).unwrap();
        assert_eq!(config.treeish(), "HEAD");
        assert_eq!(config.refresh_delay(), Duration::from_millis(100));
        assert!(!config.allow_exec());
        assert!(!config.fix());
        assert!(!config.keep_in_memory());
        assert!(config.global_config_loaded_from().is_none());
    }

    #[test]
    fn load_global_file() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "config.toml", "treeish = \"develop\"\nallow_exec = true\n");

        let config = Config::load_from(Some(&path), None).unwrap();
        assert_eq!(config.treeish(), "develop");
        assert!(config.allow_exec());
        assert_eq!(config.global_config_loaded_from(), Some(path.as_path()));
    }

    #[test]
    fn load_repo_config_below_git_dir() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "gitmod/config.toml", "keep_in_memory = true\n");

        let repo = Config::repo_config_path(temp.path());
        let config = Config::load_from(None, Some(&repo)).unwrap();
        assert!(config.keep_in_memory());
        assert_eq!(config.repo_config_loaded_from(), Some(repo.as_path()));
    }

    #[test]
    fn precedence_repo_overrides_global() {
        let temp = TempDir::new().unwrap();
        let global = write(
            temp.path(),
            "global.toml",
            "treeish = \"main\"\nrefresh_delay_ms = 1000\n",
        );
        let repo = write(temp.path(), "repo.toml", "refresh_delay_ms = 10\n");

        let config = Config::load_from(Some(&global), Some(&repo)).unwrap();
        assert_eq!(config.treeish(), "main");
        assert_eq!(config.refresh_delay(), Duration::from_millis(10));
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "config.toml", "treeish = \"main\"\nunknown_field = true\n");
        assert!(matches!(
            Config::load_from(Some(&path), None),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn invalid_value_rejected() {
        let temp = TempDir::new().unwrap();
        let path = write(temp.path(), "config.toml", "treeish = \"\"\n");
        assert!(matches!(
            Config::load_from(None, Some(&path)),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn missing_file_is_read_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.toml");
        assert!(matches!(
            Config::load_from(Some(&path), None),
            Err(ConfigError::ReadError { .. })
        ));
    }

    #[test]
    fn overrides_beat_both_scopes() {
        let config = Config::new(
            MountConfig {
                treeish: Some("main".to_string()),
                fix: Some(false),
                ..Default::default()
            },
            Some(MountConfig {
                fix: Some(false),
                ..Default::default()
            }),
        );
        let merged = config.with_overrides(&MountConfig {
            fix: Some(true),
            ..Default::default()
        });
        assert!(merged.fix());
        assert_eq!(merged.treeish(), "main");
    }

    #[test]
    fn repo_config_path_layout() {
        let path = Config::repo_config_path(Path::new("/repo/.git"));
        assert_eq!(path, PathBuf::from("/repo/.git/gitmod/config.toml"));
    }
}
