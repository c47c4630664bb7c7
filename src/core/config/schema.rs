//! core::config::schema
//!
//! Configuration schema types.
//!
//! Global and repository files share one schema; every field is optional so
//! that a later scope overrides only what it sets.
//!
//! # Validation
//!
//! Config values are validated after parsing: the treeish must not be
//! blank and the refresh delay is capped at one hour.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Longest accepted refresh delay, in milliseconds.
pub const MAX_REFRESH_DELAY_MS: u64 = 60 * 60 * 1000;

/// Mount configuration (either scope).
///
/// # Example
///
/// ```toml
/// treeish = "main"
/// refresh_delay_ms = 500
/// allow_exec = true
/// fix = false
/// keep_in_memory = false
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct MountConfig {
    /// Reference to track (branch, tag, revision or tree).
    pub treeish: Option<String>,

    /// Delay between polls of the reference; 0 polls continuously.
    pub refresh_delay_ms: Option<u64>,

    /// Surface exec bits of executable files.
    pub allow_exec: Option<bool>,

    /// Never re-resolve the reference.
    pub fix: Option<bool>,

    /// Walk and cache every snapshot eagerly.
    pub keep_in_memory: Option<bool>,
}

impl MountConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(treeish) = &self.treeish {
            if treeish.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "treeish must not be empty".to_string(),
                ));
            }
        }
        if let Some(delay) = self.refresh_delay_ms {
            if delay > MAX_REFRESH_DELAY_MS {
                return Err(ConfigError::InvalidValue(format!(
                    "refresh_delay_ms {} exceeds the maximum of {}",
                    delay, MAX_REFRESH_DELAY_MS
                )));
            }
        }
        Ok(())
    }

    /// Overlay `other` onto `self`: fields set in `other` win.
    pub fn merged_with(&self, other: &MountConfig) -> MountConfig {
        MountConfig {
            treeish: other.treeish.clone().or_else(|| self.treeish.clone()),
            refresh_delay_ms: other.refresh_delay_ms.or(self.refresh_delay_ms),
            allow_exec: other.allow_exec.or(self.allow_exec),
            fix: other.fix.or(self.fix),
            keep_in_memory: other.keep_in_memory.or(self.keep_in_memory),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_unset() {
        let config: MountConfig = toml::from_str("").unwrap();
        assert_eq!(config, MountConfig::default());
    }

    #[test]
    fn full_file_parses() {
        let config: MountConfig = toml::from_str(
            r#"
            treeish = "main"
            refresh_delay_ms = 250
            allow_exec = true
            fix = false
            keep_in_memory = true
            "#,
        )
        .unwrap();
        assert_eq!(config.treeish.as_deref(), Some("main"));
        assert_eq!(config.refresh_delay_ms, Some(250));
        assert_eq!(config.keep_in_memory, Some(true));
        config.validate().unwrap();
    }

    #[test]
    fn unknown_field_rejected() {
        assert!(toml::from_str::<MountConfig>("mountpoint = \"/mnt\"").is_err());
    }

    #[test]
    fn blank_treeish_rejected() {
        let config = MountConfig {
            treeish: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn long_delay_rejected() {
        let config = MountConfig {
            refresh_delay_ms: Some(MAX_REFRESH_DELAY_MS + 1),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_delay_accepted() {
        let config = MountConfig {
            refresh_delay_ms: Some(0),
            ..Default::default()
        };
        config.validate().unwrap();
    }

    #[test]
    fn merge_prefers_overlay() {
        let base = MountConfig {
            treeish: Some("main".to_string()),
            refresh_delay_ms: Some(100),
            ..Default::default()
        };
        let overlay = MountConfig {
            refresh_delay_ms: Some(5),
            fix: Some(true),
            ..Default::default()
        };
        let merged = base.merged_with(&overlay);
        assert_eq!(merged.treeish.as_deref(), Some("main"));
        assert_eq!(merged.refresh_delay_ms, Some(5));
        assert_eq!(merged.fix, Some(true));
    }
}
