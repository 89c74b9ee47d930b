//! Content-addressed blob storage for the blossom server.
//!
//! Blobs are stored one file per SHA-256 digest under a flat storage root.
//! The filesystem is the system of record; nothing else is persisted.

pub mod config;
pub mod digest;
pub mod error;
pub mod store;
pub mod sweeper;

pub use config::StorageConfig;
pub use error::{Result, StoreError};
pub use store::{Blob, ObjectStat, ObjectStore, StagedBlob};
pub use sweeper::{SweepStats, Sweeper};

/// Default retention window: 30 days.
pub const DEFAULT_RETENTION_SECS: u64 = 30 * 24 * 60 * 60;

/// Default sweep interval: 24 hours.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Default maximum accepted upload size: 100 MB.
pub const DEFAULT_MAX_BLOB_SIZE: u64 = 100 * 1024 * 1024;
