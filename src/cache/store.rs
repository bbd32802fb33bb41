//! On-disk layout of the binary cache

use crate::cache::lock::KeyedLocks;
use crate::error::{ProviderError, ProviderResult};
use chrono::{DateTime, Utc};
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

/// File name of the cached binary inside each build directory
pub const K6_BINARY: &str = "k6";

/// Owner-only read, write and execute
#[cfg(unix)]
const OWNER_ONLY: u32 = 0o700;

/// Format bytes as human-readable size (e.g., "1.5 MB")
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Result of checking the cache for a build
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// A binary exists at the path
    Hit(PathBuf),
    /// Nothing there yet; the path is where the binary belongs
    Miss(PathBuf),
}

/// A complete binary found in the cache
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Build identifier (directory name)
    pub id: String,
    /// Path to the binary
    pub path: PathBuf,
    /// Binary size in bytes
    pub size: u64,
    /// When the binary was written
    pub modified: DateTime<Utc>,
}

impl CacheEntry {
    /// Check if the binary was written more than `days` days ago
    pub fn is_older_than_days(&self, days: u32) -> bool {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(days));
        self.modified < cutoff
    }
}

/// Removes a build directory when dropped, unless committed.
///
/// Dropping covers early returns, errors and cancelled futures alike. Removal
/// failures are logged and otherwise ignored.
///
/// Removal is a blocking `std::fs::remove_dir_all` on the dropping thread,
/// which may be a runtime worker. A build directory only ever holds the
/// binary and its temp file.
#[derive(Debug)]
pub struct DirRollback {
    dir: PathBuf,
    armed: bool,
}

impl DirRollback {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Keep the directory
    pub fn commit(mut self) {
        self.armed = false;
    }
}

impl Drop for DirRollback {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        debug!("Rolling back {}", self.dir.display());
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!("Failed to remove {}: {}", self.dir.display(), e);
            }
        }
    }
}

/// Directory-based cache of k6 binaries keyed by build identifier
#[derive(Debug)]
pub struct BinaryCache {
    root: PathBuf,
    locks: KeyedLocks,
}

impl BinaryCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: KeyedLocks::new(),
        }
    }

    /// Cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the binary for `id`
    pub fn artifact_dir(&self, id: &str) -> ProviderResult<PathBuf> {
        validate_build_id(id)?;
        Ok(self.root.join(id))
    }

    /// Deterministic binary path for `id`
    pub fn binary_path(&self, id: &str) -> ProviderResult<PathBuf> {
        Ok(self.artifact_dir(id)?.join(K6_BINARY))
    }

    /// Check whether a binary for `id` is present.
    ///
    /// Only "not found" counts as a miss; any other stat failure is an error
    /// so an unreadable entry is never overwritten.
    pub async fn lookup(&self, id: &str) -> ProviderResult<Lookup> {
        let path = self.binary_path(id)?;
        match fs::metadata(&path).await {
            Ok(_) => Ok(Lookup::Hit(path)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Lookup::Miss(path)),
            Err(e) => Err(ProviderError::binary(
                format!("checking {}", path.display()),
                e,
            )),
        }
    }

    /// Wait for exclusive in-process access to the entry for `id`
    pub async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        self.locks.lock(id).await
    }

    /// Create the build directory (and parents) with owner-only permissions.
    ///
    /// The returned guard removes the directory unless committed.
    pub async fn create_artifact_dir(&self, id: &str) -> ProviderResult<DirRollback> {
        let dir = self.artifact_dir(id)?;

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        builder.mode(OWNER_ONLY);

        builder
            .create(&dir)
            .await
            .map_err(|e| ProviderError::binary(format!("creating {}", dir.display()), e))?;

        Ok(DirRollback::new(dir))
    }

    /// Open a fresh executable temp file inside `dir` for a download
    pub async fn create_partial(&self, dir: &Path) -> ProviderResult<(PathBuf, fs::File)> {
        let path = dir.join(format!(".{}-{}.partial", K6_BINARY, uuid::Uuid::new_v4()));

        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        options.mode(OWNER_ONLY);

        let file = options
            .open(&path)
            .await
            .map_err(|e| ProviderError::binary(format!("creating {}", path.display()), e))?;

        Ok((path, file))
    }

    /// Move a completed download to its final path
    pub async fn finalize(&self, partial: &Path, id: &str) -> ProviderResult<PathBuf> {
        let path = self.binary_path(id)?;
        fs::rename(partial, &path)
            .await
            .map_err(|e| ProviderError::binary(format!("installing {}", path.display()), e))?;
        Ok(path)
    }

    /// List complete binaries, sorted by build identifier
    pub async fn entries(&self) -> ProviderResult<Vec<CacheEntry>> {
        let mut entries = Vec::new();

        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => {
                return Err(ProviderError::binary(
                    format!("reading {}", self.root.display()),
                    e,
                ))
            }
        };

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| ProviderError::binary("reading cache entry", e))?
        {
            let Some(id) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if validate_build_id(&id).is_err() {
                continue;
            }

            let path = entry.path().join(K6_BINARY);
            let Ok(meta) = fs::metadata(&path).await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }

            let modified = meta
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            entries.push(CacheEntry {
                id,
                path,
                size: meta.len(),
                modified,
            });
        }

        entries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(entries)
    }

    /// Remove the entry for `id`. Returns false if it was not cached.
    pub async fn remove(&self, id: &str) -> ProviderResult<bool> {
        let dir = self.artifact_dir(id)?;
        let _guard = self.lock(id).await;

        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!("Removed cache entry {}", id);
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ProviderError::binary(
                format!("removing {}", dir.display()),
                e,
            )),
        }
    }

    /// Remove every build directory under the root. Returns how many were removed.
    pub async fn clear(&self) -> ProviderResult<usize> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(ProviderError::binary(
                    format!("reading {}", self.root.display()),
                    e,
                ))
            }
        };

        let mut ids = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| ProviderError::binary("reading cache entry", e))?
        {
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            if let (true, Some(id)) = (is_dir, entry.file_name().to_str()) {
                ids.push(id.to_string());
            }
        }

        let mut removed = 0;
        for id in ids {
            if validate_build_id(&id).is_ok() && self.remove(&id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Build identifiers become directory names, so they must be a single,
/// ordinary path component.
fn validate_build_id(id: &str) -> ProviderResult<()> {
    let invalid = id.is_empty()
        || id == "."
        || id == ".."
        || id.contains(['/', '\\', '\0'])
        || id.trim() != id;

    if invalid {
        return Err(ProviderError::InvalidBuildId(id.to_string()));
    }
    Ok(())
}
