//! Configuration settings and validation.

use std::path::PathBuf;
use std::time::Duration;

use crate::registry::{DuplicatePolicy, Thresholds};
use crate::watcher::FilterRules;
use crate::{Error, Result};

/// Main configuration for the outbox daemon.
///
/// Populated from CLI flags and `OUTBOX_*` environment variables in
/// `main.rs`; library consumers build it directly.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory to watch.
    pub root: PathBuf,

    /// File base names that are never tracked.
    pub ignored_files: Vec<String>,

    /// File extensions that are never tracked (leading dot optional).
    pub ignored_extensions: Vec<String>,

    /// Directory names whose subtrees are never tracked.
    pub ignored_directories: Vec<String>,

    /// If non-empty, a file name must start with one of these prefixes.
    pub included_file_prefixes: Vec<String>,

    /// If non-empty, a file's parent path must contain one of these segments.
    pub included_directories: Vec<String>,

    /// Minimum seconds between upload attempts for one file.
    pub min_elapsed_for_upload_attempt: f64,

    /// Seconds after discovery before a never-uploaded file counts as failed.
    pub min_elapsed_for_upload_fail: f64,

    /// Seconds a file must reside in its directory before it may be deleted.
    pub min_elapsed_for_delete: f64,

    /// Seconds the size must hold steady before input is considered complete.
    pub min_elapsed_for_input_complete: f64,

    /// Maximum outbound calls granted per rate-limit window.
    pub rate_limit_capacity: usize,

    /// Rate-limit window length in seconds.
    pub rate_limit_period: f64,

    /// Floor on the limiter's wait between admission re-checks, in seconds.
    pub rate_limit_retry_interval: f64,

    /// Seconds between forwarder polls of the registry.
    pub poll_interval: f64,

    /// Seconds between full reconciliation scans.
    pub rescan_interval: f64,

    /// Rename with a timestamp prefix on duplicate-name moves instead of
    /// failing.
    pub rename_on_duplicate: bool,

    /// Remove uploaded files from disk once they become delete-eligible.
    pub delete_after_upload: bool,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log output instead of plain text.
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            ignored_files: Vec::new(),
            ignored_extensions: Vec::new(),
            ignored_directories: Vec::new(),
            included_file_prefixes: Vec::new(),
            included_directories: Vec::new(),
            min_elapsed_for_upload_attempt: 1.0,
            min_elapsed_for_upload_fail: 3.0,
            min_elapsed_for_delete: 0.0,
            min_elapsed_for_input_complete: 1.0,
            rate_limit_capacity: 2,
            rate_limit_period: 5.0,
            rate_limit_retry_interval: 0.01,
            poll_interval: 1.0,
            rescan_interval: 30.0,
            rename_on_duplicate: true,
            delete_after_upload: false,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::config("root cannot be empty"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.rate_limit_capacity == 0 {
            return Err(Error::config("rate_limit_capacity cannot be 0"));
        }

        if self.rate_limit_period <= 0.0 {
            return Err(Error::config("rate_limit_period must be positive"));
        }

        if self.rate_limit_retry_interval <= 0.0 {
            return Err(Error::config("rate_limit_retry_interval must be positive"));
        }

        if self.poll_interval <= 0.0 {
            return Err(Error::config("poll_interval must be positive"));
        }

        if self.rescan_interval <= 0.0 {
            return Err(Error::config("rescan_interval must be positive"));
        }

        for (name, value) in [
            (
                "min_elapsed_for_upload_attempt",
                self.min_elapsed_for_upload_attempt,
            ),
            (
                "min_elapsed_for_upload_fail",
                self.min_elapsed_for_upload_fail,
            ),
            ("min_elapsed_for_delete", self.min_elapsed_for_delete),
            (
                "min_elapsed_for_input_complete",
                self.min_elapsed_for_input_complete,
            ),
        ] {
            if value < 0.0 {
                return Err(Error::config(format!("{name} cannot be negative")));
            }
        }

        Ok(())
    }

    /// Per-file lifecycle thresholds derived from this configuration.
    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            min_upload_attempt_interval: Duration::from_secs_f64(
                self.min_elapsed_for_upload_attempt,
            ),
            min_elapsed_for_upload_fail: Duration::from_secs_f64(self.min_elapsed_for_upload_fail),
            min_elapsed_for_delete: Duration::from_secs_f64(self.min_elapsed_for_delete),
            min_elapsed_for_input_complete: Duration::from_secs_f64(
                self.min_elapsed_for_input_complete,
            ),
        }
    }

    /// Filter rule sets derived from this configuration.
    #[must_use]
    pub fn filter_rules(&self) -> FilterRules {
        FilterRules::new(
            self.ignored_files.clone(),
            self.ignored_extensions.clone(),
            self.ignored_directories.clone(),
            self.included_file_prefixes.clone(),
            self.included_directories.clone(),
        )
    }

    /// Duplicate-name handling policy for moves.
    #[must_use]
    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        if self.rename_on_duplicate {
            DuplicatePolicy::RenameWithTimestamp
        } else {
            DuplicatePolicy::Fail
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.rate_limit_capacity, 2);
        assert!((config.rate_limit_period - 5.0).abs() < f64::EPSILON);
        assert!(!config.log_json);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_root() {
        let config = Config {
            root: PathBuf::new(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("root"));
    }

    #[test]
    fn test_validate_zero_capacity() {
        let config = Config {
            rate_limit_capacity: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("rate_limit_capacity"));
    }

    #[test]
    fn test_validate_nonpositive_period() {
        let config = Config {
            rate_limit_period: 0.0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("rate_limit_period"));
    }

    #[test]
    fn test_validate_negative_threshold() {
        let config = Config {
            min_elapsed_for_delete: -1.0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_elapsed_for_delete"));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = Config {
            log_level: "verbose".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log level"));
    }

    #[test]
    fn test_all_log_levels_valid() {
        for level in ["trace", "debug", "info", "warn", "error"] {
            let config = Config {
                log_level: level.to_string(),
                ..Default::default()
            };
            assert!(config.validate().is_ok(), "Level '{level}' should be valid");
        }
    }

    #[test]
    fn test_thresholds_conversion() {
        let config = Config {
            min_elapsed_for_input_complete: 2.5,
            ..Default::default()
        };
        let thresholds = config.thresholds();
        assert_eq!(
            thresholds.min_elapsed_for_input_complete,
            Duration::from_millis(2500)
        );
        assert_eq!(thresholds.min_elapsed_for_delete, Duration::ZERO);
    }

    #[test]
    fn test_duplicate_policy() {
        let config = Config::default();
        assert_eq!(config.duplicate_policy(), DuplicatePolicy::RenameWithTimestamp);

        let config = Config {
            rename_on_duplicate: false,
            ..Default::default()
        };
        assert_eq!(config.duplicate_policy(), DuplicatePolicy::Fail);
    }
}
