//! Cache module for storing lookup results to disk
//!
//! This module provides a cache manager that persists lookup results to a single
//! JSON file with a configurable TTL (time-to-live). Entries are kept in memory,
//! checked for freshness against the TTL, and written back atomically after
//! every change.

mod clock;
mod entry;
mod error;
mod manager;
mod size;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, STALE_SINCE, VALID_FIELD};
pub use error::{CacheError, Result};
pub use manager::CacheManager;
pub use size::FileSize;
