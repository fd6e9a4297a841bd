//! Cache manager for persisting lookup results to disk
//!
//! Provides a `CacheManager` that keeps every entry of a single JSON cache file
//! in memory, decides freshness against a TTL, and rewrites the file
//! atomically after each mutation.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::clock::{Clock, SystemClock};
use super::entry::{CacheEntry, STALE_SINCE};
use super::error::{CacheError, Result};
use super::size::FileSize;
use crate::config::CacheConfig;

/// In-memory copy of the cache file
#[derive(Debug, Default)]
struct Store {
    entries: BTreeMap<String, CacheEntry>,
    /// Whether memory holds changes the file does not
    dirty: bool,
}

/// Disk-backed key-value cache with a time-to-live
///
/// The whole cache file is loaded when the manager is opened and held in
/// memory. Every mutating operation rewrites the file by writing a temporary
/// file next to it and renaming it into place, so an interrupted write never
/// leaves a truncated cache behind.
///
/// All state sits behind one mutex, which is also held across the file
/// write, so a `CacheManager` can be shared between threads.
#[derive(Debug)]
pub struct CacheManager {
    /// Backing file
    path: PathBuf,
    /// How long an entry stays fresh after validation
    ttl: Duration,
    ttl_secs: i64,
    clock: Box<dyn Clock>,
    store: Mutex<Store>,
}

impl CacheManager {
    /// Opens the cache at `path`, creating an empty cache file if none exists.
    ///
    /// Validity timestamps are whole seconds, so `ttl` is truncated to whole
    /// seconds: a TTL of 1.5s behaves as 1s.
    ///
    /// # Errors
    /// * `CacheError::Load` if the file exists but cannot be read
    /// * `CacheError::Parse` if the file is not a cache document; the file is left untouched
    /// * `CacheError::Write` if a new, empty cache file cannot be created
    pub fn open(path: impl Into<PathBuf>, ttl: Duration) -> Result<Self> {
        Self::open_with_clock(path, ttl, SystemClock)
    }

    /// Opens the cache described by a resolved configuration
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        Self::open(config.path.clone(), config.ttl)
    }

    /// Opens the cache at `path` using `clock` for every timestamp.
    ///
    /// Useful for testing, or for callers that need deterministic time.
    pub fn open_with_clock<C>(path: impl Into<PathBuf>, ttl: Duration, clock: C) -> Result<Self>
    where
        C: Clock + 'static,
    {
        let path = path.into();
        let (entries, existed) = match fs::read_to_string(&path) {
            Ok(content) => {
                let entries: BTreeMap<String, CacheEntry> = serde_json::from_str(&content)
                    .map_err(|source| CacheError::Parse {
                        path: path.clone(),
                        source,
                    })?;
                (entries, true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => (BTreeMap::new(), false),
            Err(source) => return Err(CacheError::Load { path, source }),
        };

        let cache = Self {
            path,
            ttl,
            ttl_secs: i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX),
            clock: Box::new(clock),
            store: Mutex::new(Store {
                entries,
                dirty: false,
            }),
        };

        if existed {
            info!(path = %cache.path.display(), entries = cache.len(), "loaded cache");
        } else {
            cache.write(false)?;
            info!(path = %cache.path.display(), "created empty cache");
        }

        Ok(cache)
    }

    /// Returns the backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the configured time-to-live
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of entries, fresh or not
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// All keys in the cache, in sorted order
    pub fn keys(&self) -> Vec<String> {
        self.lock().entries.keys().cloned().collect()
    }

    /// Whether buffered saves are waiting for a `write`
    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Returns true if `key` is cached and still within its TTL.
    ///
    /// This is the only freshness rule; `get`, `purge` and `count` all go
    /// through it.
    pub fn check(&self, key: &str) -> bool {
        let store = self.lock();
        let now = self.clock.now();
        store
            .entries
            .get(key)
            .is_some_and(|entry| self.is_fresh(entry, now))
    }

    /// Returns the entry for `key` if it is fresh.
    ///
    /// Missing and expired keys both return `None`; either way the caller
    /// has to fetch again.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        let store = self.lock();
        let now = self.clock.now();
        store
            .entries
            .get(key)
            .filter(|entry| self.is_fresh(entry, now))
            .cloned()
    }

    /// Inserts or replaces the entry for `key`.
    ///
    /// The entry is not fresh until a refreshing `write` stamps it. With
    /// `persist` set, that write happens immediately; otherwise the change is
    /// buffered until the next `write`.
    pub fn save(
        &self,
        key: impl Into<String>,
        payload: Map<String, Value>,
        persist: bool,
    ) -> Result<()> {
        let key = key.into();
        let mut store = self.lock();
        debug!(key = %key, persist, "saving cache entry");
        store.entries.insert(key, CacheEntry::pending(payload));
        store.dirty = true;

        if persist {
            self.write_locked(&mut store, true)
        } else {
            Ok(())
        }
    }

    /// Writes the whole cache to disk.
    ///
    /// With `refresh_timestamps` set, every entry is stamped with the current
    /// time first; this is how saved entries become fresh. Without it, only
    /// structural changes are persisted and validity is left alone.
    ///
    /// If the write fails the previous file is kept and the timestamps set by
    /// this call are rolled back.
    pub fn write(&self, refresh_timestamps: bool) -> Result<()> {
        let mut store = self.lock();
        self.write_locked(&mut store, refresh_timestamps)
    }

    /// Removes every entry, or with `invalid_only` just the stale ones.
    ///
    /// Never refreshes timestamps, so surviving entries keep their validity.
    pub fn purge(&self, invalid_only: bool) -> Result<()> {
        let mut store = self.lock();
        let before = store.entries.len();

        if invalid_only {
            let now = self.clock.now();
            store.entries.retain(|_, entry| self.is_fresh(entry, now));
        } else {
            store.entries.clear();
        }

        debug!(invalid_only, removed = before - store.entries.len(), "purged cache");
        store.dirty = true;
        self.write_locked(&mut store, false)
    }

    /// Marks `key` stale without removing it. Missing keys are ignored.
    pub fn invalidate(&self, key: &str) -> Result<()> {
        self.set_validity(Some(key), STALE_SINCE)
    }

    /// Marks every entry stale
    pub fn invalidate_all(&self) -> Result<()> {
        self.set_validity(None, STALE_SINCE)
    }

    /// Marks `key` fresh as of now without touching its payload. Missing keys are ignored.
    pub fn revalidate(&self, key: &str) -> Result<()> {
        self.set_validity(Some(key), self.clock.now())
    }

    /// Marks every entry fresh as of now
    pub fn revalidate_all(&self) -> Result<()> {
        self.set_validity(None, self.clock.now())
    }

    /// Size of the cache file as last written
    pub fn size(&self) -> Result<FileSize> {
        let metadata = fs::metadata(&self.path).map_err(|source| CacheError::Metadata {
            path: self.path.clone(),
            source,
        })?;
        Ok(FileSize(metadata.len()))
    }

    /// Returns `(total, invalid)` entry counts
    pub fn count(&self) -> (usize, usize) {
        let store = self.lock();
        let now = self.clock.now();
        let invalid = store
            .entries
            .values()
            .filter(|entry| !self.is_fresh(entry, now))
            .count();
        (store.entries.len(), invalid)
    }

    fn is_fresh(&self, entry: &CacheEntry, now: i64) -> bool {
        entry.is_fresh(now, self.ttl_secs)
    }

    // The map is consistent between statements, so a panic elsewhere
    // cannot leave it half-updated.
    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets the validity of one entry (`Some(key)`) or all entries (`None`)
    fn set_validity(&self, key: Option<&str>, valid_since: i64) -> Result<()> {
        let mut store = self.lock();

        match key {
            Some(key) => match store.entries.get_mut(key) {
                Some(entry) => entry.valid_since = valid_since,
                None => return Ok(()),
            },
            None => {
                for entry in store.entries.values_mut() {
                    entry.valid_since = valid_since;
                }
            }
        }

        debug!(key = key.unwrap_or("*"), valid_since, "updated cache validity");
        store.dirty = true;
        self.write_locked(&mut store, false)
    }

    fn write_locked(&self, store: &mut Store, refresh_timestamps: bool) -> Result<()> {
        let previous: Vec<i64> = if refresh_timestamps {
            let now = self.clock.now();
            store
                .entries
                .values_mut()
                .map(|entry| std::mem::replace(&mut entry.valid_since, now))
                .collect()
        } else {
            Vec::new()
        };

        match self.replace_file(&store.entries) {
            Ok(()) => {
                store.dirty = false;
                debug!(
                    path = %self.path.display(),
                    entries = store.entries.len(),
                    refresh_timestamps,
                    "wrote cache"
                );
                Ok(())
            }
            Err(e) => {
                for (entry, valid_since) in store.entries.values_mut().zip(previous) {
                    entry.valid_since = valid_since;
                }
                store.dirty = true;
                warn!(path = %self.path.display(), error = %e, "cache write failed");
                Err(e)
            }
        }
    }

    /// Writes `entries` to a temporary file beside the cache and renames it over the cache
    fn replace_file(&self, entries: &BTreeMap<String, CacheEntry>) -> Result<()> {
        let json = to_pretty_json(entries)?;
        let write_err = |source: io::Error| CacheError::Write {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(write_err)?;

        // Dropping the temp file on any early return removes it.
        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        tmp.write_all(&json).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

impl Drop for CacheManager {
    fn drop(&mut self) {
        if self.lock().dirty {
            warn!(path = %self.path.display(), "cache dropped with unwritten changes");
        }
    }
}

/// Encodes the store with four-space indentation
fn to_pretty_json(entries: &BTreeMap<String, CacheEntry>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    entries.serialize(&mut serializer)?;
    Ok(buf)
}
