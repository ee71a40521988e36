//! Disk Tier Module
//!
//! Durable tier: one JSON file per cache key, named by the SHA-256 of the key.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::Value;
use tokio::fs;
use tracing::{debug, warn};

use super::clock::SharedClock;
use super::entry::Entry;
use super::key::hex_digest;
use crate::error::Result;

/// Metadata field holding the cache key of a persisted entry.
pub const CACHE_KEY_FIELD: &str = "cache_key";

const FILE_EXTENSION: &str = "json";

static NEXT_WRITE: AtomicU64 = AtomicU64::new(0);

// == Disk Store ==
/// File-per-entry persistent store.
///
/// Every public operation absorbs its own I/O and serialization failures:
/// reads degrade to `None`, writes to `false`.
pub struct DiskStore {
    dir: PathBuf,
    clock: SharedClock,
}

impl DiskStore {
    // == Constructor ==
    /// Creates a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>, clock: SharedClock) -> Self {
        Self {
            dir: dir.into(),
            clock,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the entry for `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", hex_digest(key.as_bytes()), FILE_EXTENSION))
    }

    // == Set ==
    /// Persists `entry` under `key`, recording the key in the entry's metadata.
    pub async fn set(&self, key: &str, entry: &Entry) -> bool {
        match self.try_set(key, entry).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Disk tier write failed for {}: {}", key, e);
                false
            }
        }
    }

    async fn try_set(&self, key: &str, entry: &Entry) -> Result<()> {
        let mut entry = entry.clone();
        entry
            .metadata
            .insert(CACHE_KEY_FIELD.to_string(), Value::String(key.to_string()));
        let bytes = serde_json::to_vec(&entry)?;

        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(key);
        // Staging file is unique per write
        let tmp = path.with_extension(format!(
            "{}.{}.tmp",
            std::process::id(),
            NEXT_WRITE.fetch_add(1, Ordering::Relaxed)
        ));
        let staged = match fs::write(&tmp, bytes).await {
            Ok(()) => fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = staged {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    // == Get ==
    /// Loads the entry for `key`. Expired entries are deleted and reported as absent.
    pub async fn get(&self, key: &str) -> Option<Entry> {
        let path = self.path_for(key);
        let entry = match read_entry(&path).await {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                warn!("Disk tier read failed for {}: {}", key, e);
                return None;
            }
        };

        if entry.is_expired(self.clock.now()) {
            debug!("Disk entry for {} expired, removing", key);
            if let Err(e) = fs::remove_file(&path).await {
                warn!("Could not remove expired disk entry {}: {}", path.display(), e);
            }
            return None;
        }
        Some(entry)
    }

    // == Delete ==
    /// Removes the entry for `key`; true if a file was removed.
    pub async fn delete(&self, key: &str) -> bool {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!("Disk tier delete failed for {}: {}", key, e);
                false
            }
        }
    }

    // == Sweep Expired ==
    /// Removes every expired entry. Unreadable files are skipped with a warning.
    ///
    /// Fails only if the directory itself cannot be listed.
    pub async fn sweep_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut removed = 0;
        for path in self.entry_files().await? {
            match read_entry(&path).await {
                Ok(Some(entry)) if entry.is_expired(now) => {
                    match fs::remove_file(&path).await {
                        Ok(()) => removed += 1,
                        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping unreadable cache file {}: {}", path.display(), e),
            }
        }
        Ok(removed)
    }

    // == Entries ==
    /// Every readable entry with the file it lives in.
    pub async fn entries(&self) -> Result<Vec<(PathBuf, Entry)>> {
        let mut out = Vec::new();
        for path in self.entry_files().await? {
            match read_entry(&path).await {
                Ok(Some(entry)) => out.push((path, entry)),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable cache file {}: {}", path.display(), e),
            }
        }
        Ok(out)
    }

    /// Removes one file found through `entries`.
    pub async fn remove_file(&self, path: &Path) -> bool {
        match fs::remove_file(path).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not remove {}: {}", path.display(), e);
                false
            }
        }
    }

    // == Clear All ==
    /// Removes every entry file. Returns the number removed.
    pub async fn clear_all(&self) -> usize {
        let files = match self.entry_files().await {
            Ok(files) => files,
            Err(e) => {
                warn!("Could not list disk tier {}: {}", self.dir.display(), e);
                return 0;
            }
        };
        let mut removed = 0;
        for path in files {
            if self.remove_file(&path).await {
                removed += 1;
            }
        }
        removed
    }

    /// Number of entry files on disk.
    pub async fn len(&self) -> usize {
        self.entry_files().await.map(|f| f.len()).unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>> {
        let mut dir = match fs::read_dir(&self.dir).await {
            Ok(dir) => dir,
            // Nothing written yet
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|x| x.to_str()) == Some(FILE_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

async fn read_entry(path: &Path) -> Result<Option<Entry>> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}
