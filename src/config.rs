//! Run configuration
//!
//! Tunables for a backup or restore run. Every field has a default, so a
//! YAML file only needs to name what it changes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// =============================================================================
// Constants
// =============================================================================

/// Region name selecting a local store deployment
pub const LOCAL_REGION: &str = "local";

/// Largest batch the store accepts in one batch-write call
pub const MAX_BATCH_WRITE: usize = 25;

/// Default prefix separator for wildcard patterns
pub const DEFAULT_PREFIX_SEPARATOR: &str = "-";

// =============================================================================
// Deployment Target
// =============================================================================

/// Where the table store runs; picks the retry sleep interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentTarget {
    Local,
    Remote,
}

impl DeploymentTarget {
    pub fn from_region(region: &str) -> Self {
        if region == LOCAL_REGION {
            DeploymentTarget::Local
        } else {
            DeploymentTarget::Remote
        }
    }
}

// =============================================================================
// Exhausted Batch Policy
// =============================================================================

/// What to do when a batch still has unprocessed items after the last attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExhaustedPolicy {
    /// Drop the items, log them and report the table as partially restored
    #[default]
    Report,
    /// Fail the table's worker
    Fail,
}

// =============================================================================
// Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Retry sleep against a local store, in milliseconds
    pub sleep_interval_local_ms: u64,
    /// Retry sleep against a remote store, in milliseconds
    pub sleep_interval_remote_ms: u64,
    /// Spacing between successive worker starts, in milliseconds
    pub start_delay_ms: u64,
    /// Maximum number of table workers running at once
    pub max_concurrency: usize,
    /// Write capacity applied during restore when the original is lower
    pub restore_write_floor: i64,
    /// Items per batch-write call
    pub batch_size: usize,
    /// Batch-write calls per batch before giving up on unprocessed items
    pub batch_max_attempts: u32,
    pub on_exhausted: ExhaustedPolicy,
    /// Optional page-size hint for scans
    pub scan_page_limit: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sleep_interval_local_ms: 1_000,
            sleep_interval_remote_ms: 10_000,
            start_delay_ms: 1_000,
            max_concurrency: 16,
            restore_write_floor: 100,
            batch_size: MAX_BATCH_WRITE,
            batch_max_attempts: 6,
            on_exhausted: ExhaustedPolicy::Report,
            scan_page_limit: None,
        }
    }
}

impl Settings {
    /// Load settings from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        let settings: Settings = serde_yaml::from_str(&raw)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrency == 0 {
            return Err(Error::Configuration("max_concurrency must be at least 1".into()));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_WRITE {
            return Err(Error::Configuration(format!(
                "batch_size must be between 1 and {}",
                MAX_BATCH_WRITE
            )));
        }
        if self.batch_max_attempts == 0 {
            return Err(Error::Configuration(
                "batch_max_attempts must be at least 1".into(),
            ));
        }
        if self.restore_write_floor < 1 {
            return Err(Error::Configuration(
                "restore_write_floor must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Retry sleep interval for a deployment target
    pub fn sleep_interval(&self, target: DeploymentTarget) -> Duration {
        match target {
            DeploymentTarget::Local => Duration::from_millis(self.sleep_interval_local_ms),
            DeploymentTarget::Remote => Duration::from_millis(self.sleep_interval_remote_ms),
        }
    }

    pub fn start_delay(&self) -> Duration {
        Duration::from_millis(self.start_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.batch_size, 25);
        assert_eq!(settings.batch_max_attempts, 6);
        assert_eq!(settings.restore_write_floor, 100);
        assert_eq!(
            settings.sleep_interval(DeploymentTarget::Local),
            Duration::from_secs(1)
        );
        assert_eq!(
            settings.sleep_interval(DeploymentTarget::Remote),
            Duration::from_secs(10)
        );
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_concurrency: 4\non_exhausted: fail").unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.max_concurrency, 4);
        assert_eq!(settings.on_exhausted, ExhaustedPolicy::Fail);
        assert_eq!(settings.batch_size, 25);
    }

    #[test]
    fn test_rejects_oversized_batches() {
        let settings = Settings {
            batch_size: 26,
            ..Default::default()
        };
        assert_matches!(settings.validate(), Err(Error::Configuration(_)));
    }

    #[test]
    fn test_deployment_target() {
        assert_eq!(DeploymentTarget::from_region("local"), DeploymentTarget::Local);
        assert_eq!(
            DeploymentTarget::from_region("eu-west-1"),
            DeploymentTarget::Remote
        );
    }
}
