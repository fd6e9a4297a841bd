use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the cache engine
///
/// None of these mean "the key is not cached"; a missing or stale key is
/// reported as `None` by the read path.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The backing file exists but could not be read
    #[error("Failed to read cache file {}: {source}", .path.display())]
    Load { path: PathBuf, source: io::Error },

    /// The backing file is not a valid cache document
    #[error("Cache file {} is malformed: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Writing or replacing the backing file failed; the previous file is intact
    #[error("Failed to write cache file {}: {source}", .path.display())]
    Write { path: PathBuf, source: io::Error },

    /// The in-memory store could not be encoded
    #[error("Failed to serialize cache: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The backing file could not be inspected
    #[error("Failed to read metadata of cache file {}: {source}", .path.display())]
    Metadata { path: PathBuf, source: io::Error },
}

pub type Result<T> = std::result::Result<T, CacheError>;
