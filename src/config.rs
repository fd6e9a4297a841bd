//! Cache location and lifetime settings
//!
//! The cache never reads configuration on its own; the composition root
//! resolves a `CacheConfig` and hands it over when opening the cache.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use thiserror::Error;

/// File name used for the cache, in the working directory by default
pub const DEFAULT_CACHE_FILE: &str = "cache.json";

/// Default time-to-live: one week
pub const DEFAULT_TTL_SECS: u64 = 604_800;

/// Errors in cache configuration
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A TTL of zero would make every entry stale as soon as it is written
    #[error("TTL must be at least one second")]
    ZeroTtl,

    /// No platform cache directory is available (e.g., no home directory)
    #[error("Could not determine a user cache directory")]
    NoUserCacheDir,
}

/// Where the cache lives and how long its entries stay fresh
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// Backing file
    pub path: PathBuf,
    /// Time-to-live of each entry
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_CACHE_FILE),
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }
}

impl CacheConfig {
    /// Creates a config, rejecting a zero TTL
    pub fn new(path: impl Into<PathBuf>, ttl_secs: u64) -> Result<Self, ConfigError> {
        if ttl_secs == 0 {
            return Err(ConfigError::ZeroTtl);
        }
        Ok(Self {
            path: path.into(),
            ttl: Duration::from_secs(ttl_secs),
        })
    }

    /// Creates a config whose file sits in the XDG-compliant user cache directory
    ///
    /// Uses `~/.cache/quickthes/cache.json` on Linux, or the equivalent path on
    /// other platforms.
    pub fn in_user_cache_dir(ttl_secs: u64) -> Result<Self, ConfigError> {
        let path = user_cache_path().ok_or(ConfigError::NoUserCacheDir)?;
        Self::new(path, ttl_secs)
    }
}

/// Returns the cache file path inside the platform cache directory
pub fn user_cache_path() -> Option<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "quickthes")?;
    Some(project_dirs.cache_dir().join(DEFAULT_CACHE_FILE))
}
