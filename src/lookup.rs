//! Read-through lookups backed by the cache
//!
//! `fetch_or_compute` is how the application looks up a term: serve it from the
//! cache when fresh, otherwise ask the fetcher and remember a non-empty result.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use crate::cache::{CacheError, CacheManager};

/// Outcome of a successful lookup
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Served from a fresh cache entry
    Cached(Map<String, Value>),
    /// Fetched and stored in the cache
    Fetched(Map<String, Value>),
    /// The fetcher had no results for this key; nothing was cached
    NotFound,
}

impl Lookup {
    /// Returns the payload, if there is one
    pub fn payload(&self) -> Option<&Map<String, Value>> {
        match self {
            Lookup::Cached(payload) | Lookup::Fetched(payload) => Some(payload),
            Lookup::NotFound => None,
        }
    }
}

/// Errors that can occur during a lookup
#[derive(Debug, Error)]
pub enum LookupError<E> {
    /// The cache could not store the fetched result
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// The fetcher failed
    #[error("Fetch failed: {0}")]
    Fetch(E),
}

/// Looks `key` up in `cache`, falling back to `fetcher` on a miss.
///
/// Only non-empty results are cached, so a term with no results is fetched
/// again next time.
///
/// There is no single-flight protection: two callers missing the same key at
/// the same time will both call their fetcher, and the last save wins.
pub fn fetch_or_compute<F, E>(
    cache: &CacheManager,
    key: &str,
    fetcher: F,
) -> Result<Lookup, LookupError<E>>
where
    F: FnOnce(&str) -> Result<Map<String, Value>, E>,
{
    if let Some(entry) = cache.get(key) {
        debug!(key, "cache hit");
        return Ok(Lookup::Cached(entry.payload));
    }

    debug!(key, "cache miss, fetching");
    let payload = fetcher(key).map_err(LookupError::Fetch)?;
    if payload.is_empty() {
        return Ok(Lookup::NotFound);
    }

    cache.save(key, payload.clone(), true)?;
    Ok(Lookup::Fetched(payload))
}
