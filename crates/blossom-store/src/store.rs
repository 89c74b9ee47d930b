//! Filesystem-backed content-addressed object store.
//!
//! One file per blob, named by the SHA-256 digest of its content, in a flat
//! directory. Writes stream into `tmp/` and are promoted with an atomic
//! rename, so a digest-named path either holds a complete blob or nothing.

use std::path::PathBuf;
use std::time::SystemTime;

use bytes::Bytes;
use dashmap::DashMap;
use futures::{Stream, StreamExt};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::digest::{is_valid_digest, Digester};
use crate::error::{Result, StoreError};

const TMP_DIR: &str = "tmp";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// A committed blob's metadata.
#[derive(Clone, Debug)]
pub struct Blob {
    /// 64 lowercase hex chars, SHA-256 of the content
    pub digest: String,
    /// Size in bytes
    pub size: u64,
    /// Content type captured at upload time (advisory only)
    pub content_type: String,
}

/// Snapshot entry produced by [`ObjectStore::stat_all`].
#[derive(Clone, Debug)]
pub struct ObjectStat {
    pub digest: String,
    pub size: u64,
    pub mtime: SystemTime,
}

/// A fully-streamed upload sitting in the staging directory, not yet
/// visible under a digest-named path.
///
/// Dropping a staged blob without committing it removes the staging file,
/// so an abandoned or failed upload never leaves data behind.
#[derive(Debug)]
pub struct StagedBlob {
    path: PathBuf,
    committed: bool,
    /// Digest computed while streaming
    pub digest: String,
    /// Bytes written
    pub size: u64,
}

impl Drop for StagedBlob {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!("Failed to remove staging file {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Content-addressed store rooted at a single directory.
///
/// The filesystem is the system of record. The content-type map is a
/// non-authoritative accelerator: it only survives for the process
/// lifetime, and `get` falls back to `application/octet-stream` for blobs
/// uploaded before the last restart.
pub struct ObjectStore {
    config: StorageConfig,
    tmp: PathBuf,
    content_types: DashMap<String, String>,
}

impl ObjectStore {
    /// Open (creating if needed) a store rooted at `config.root`.
    ///
    /// Staging files left over from a previous crash are cleared out; they
    /// were never visible as blobs.
    pub fn open(config: StorageConfig) -> Result<Self> {
        config.validate()?;

        let tmp = config.root.join(TMP_DIR);
        std::fs::create_dir_all(&tmp)?;

        for entry in std::fs::read_dir(&tmp)? {
            let entry = entry?;
            if let Err(e) = std::fs::remove_file(entry.path()) {
                warn!("Failed to clear stale staging file {}: {}", entry.path().display(), e);
            }
        }

        debug!("Object store opened at {}", config.root.display());

        Ok(Self {
            config,
            tmp,
            content_types: DashMap::new(),
        })
    }

    /// Final path for a digest, or `None` for anything that is not exactly
    /// 64 lowercase hex chars. Rejecting instead of sanitizing is the
    /// path-traversal defense: a bad key never touches the filesystem.
    fn blob_path(&self, digest: &str) -> Option<PathBuf> {
        if is_valid_digest(digest) {
            Some(self.config.root.join(digest))
        } else {
            None
        }
    }

    /// Stream an upload body into the staging directory, hashing it on the
    /// way through.
    ///
    /// Returns the staged file with its computed digest and size. Stream
    /// errors (including a client disconnecting mid-upload) and oversize
    /// bodies discard the staging file and surface as errors.
    pub async fn stage<S>(&self, stream: S) -> Result<StagedBlob>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Unpin,
    {
        let path = self.tmp.join(Uuid::new_v4().to_string());
        let file = File::create(&path).await?;

        // Treat the staged file as live from here on so every early return
        // below cleans it up via Drop.
        let mut staged = StagedBlob {
            path,
            committed: false,
            digest: String::new(),
            size: 0,
        };

        let (digest, size) = self
            .write_stream(file, stream)
            .await?;

        staged.digest = digest;
        staged.size = size;
        debug!("Staged upload {}: {} bytes", staged.digest, staged.size);
        Ok(staged)
    }

    async fn write_stream<S>(&self, mut file: File, mut stream: S) -> Result<(String, u64)>
    where
        S: Stream<Item = std::io::Result<Bytes>> + Unpin,
    {
        let mut hasher = Digester::new();
        let mut size: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            size += chunk.len() as u64;
            if size > self.config.max_blob_size {
                return Err(StoreError::BlobTooLarge {
                    size,
                    max: self.config.max_blob_size,
                });
            }
            hasher.update(&chunk);
            file.write_all(&chunk).await?;
        }

        file.sync_all().await?;
        Ok((hasher.finalize(), size))
    }

    /// Promote a staged upload to its final digest-named path.
    ///
    /// The rename is atomic: concurrent readers see either the complete
    /// blob or nothing, and a concurrent upload of the same digest simply
    /// wins the rename with identical bytes.
    pub async fn commit(&self, mut staged: StagedBlob, content_type: &str) -> Result<Blob> {
        let final_path = self
            .blob_path(&staged.digest)
            .ok_or_else(|| StoreError::NotFound(staged.digest.clone()))?;

        fs::rename(&staged.path, &final_path).await?;
        staged.committed = true;

        self.content_types
            .insert(staged.digest.clone(), content_type.to_string());

        debug!("Stored blob {}: {} bytes", staged.digest, staged.size);

        Ok(Blob {
            digest: staged.digest.clone(),
            size: staged.size,
            content_type: content_type.to_string(),
        })
    }

    /// Open a blob for reading.
    ///
    /// A digest that fails validation is reported as absent, exactly like a
    /// digest that was never uploaded.
    pub async fn get(&self, digest: &str) -> Result<Option<(File, Blob)>> {
        let path = match self.blob_path(digest) {
            Some(p) => p,
            None => return Ok(None),
        };

        let file = match File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let size = file.metadata().await?.len();
        let content_type = self
            .content_types
            .get(digest)
            .map(|t| t.clone())
            .unwrap_or_else(|| FALLBACK_CONTENT_TYPE.to_string());

        Ok(Some((
            file,
            Blob {
                digest: digest.to_string(),
                size,
                content_type,
            },
        )))
    }

    /// Check whether a blob is present.
    pub async fn exists(&self, digest: &str) -> Result<bool> {
        let path = match self.blob_path(digest) {
            Some(p) => p,
            None => return Ok(false),
        };

        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a blob. Idempotent: deleting an absent digest is `Ok(false)`.
    pub async fn delete(&self, digest: &str) -> Result<bool> {
        let path = match self.blob_path(digest) {
            Some(p) => p,
            None => return Ok(false),
        };

        self.content_types.remove(digest);

        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted blob {}", digest);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Point-in-time snapshot of every stored blob's digest, mtime, and
    /// size. Takes no lock; objects added or removed mid-scan may or may
    /// not appear. The staging directory and foreign files are skipped.
    pub async fn stat_all(&self) -> Result<Vec<ObjectStat>> {
        let mut stats = Vec::new();
        let mut entries = fs::read_dir(&self.config.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let name = match entry.file_name().into_string() {
                Ok(n) => n,
                Err(_) => continue,
            };
            if !is_valid_digest(&name) {
                continue;
            }
            let meta = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    debug!("Skipping unreadable entry {}: {}", name, e);
                    continue;
                }
            };
            let mtime = match meta.modified() {
                Ok(t) => t,
                Err(e) => {
                    debug!("Skipping entry without mtime {}: {}", name, e);
                    continue;
                }
            };
            stats.push(ObjectStat {
                digest: name,
                size: meta.len(),
                mtime,
            });
        }

        Ok(stats)
    }

    /// Configuration this store was opened with.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }
}
