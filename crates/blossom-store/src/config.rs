//! Storage configuration

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Configuration for the object store and retention sweeper.
///
/// Built once at startup and handed to each component explicitly, so the
/// store and sweeper can be tested with distinct injected configurations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage root directory (one file per digest lives here)
    pub root: PathBuf,
    /// Retention window in seconds, measured from last write
    pub retention_secs: u64,
    /// Sweep interval in seconds
    pub sweep_interval_secs: u64,
    /// Maximum accepted upload size in bytes
    pub max_blob_size: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./blobs"),
            retention_secs: crate::DEFAULT_RETENTION_SECS,
            sweep_interval_secs: crate::DEFAULT_SWEEP_INTERVAL_SECS,
            max_blob_size: crate::DEFAULT_MAX_BLOB_SIZE,
        }
    }
}

impl StorageConfig {
    /// Create a config rooted at `root` with default policies.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Default::default()
        }
    }

    /// Retention window as a Duration
    pub fn retention_window(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    /// Sweep interval as a Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.retention_secs == 0 {
            return Err(StoreError::Config("retention_secs must be > 0".into()));
        }
        if self.sweep_interval_secs == 0 {
            return Err(StoreError::Config("sweep_interval_secs must be > 0".into()));
        }
        if self.max_blob_size == 0 {
            return Err(StoreError::Config("max_blob_size must be > 0".into()));
        }
        Ok(())
    }
}
