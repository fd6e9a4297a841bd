//! On-disk shape of a single cache entry
//!
//! Each entry is stored as a JSON object holding the payload fields plus the
//! reserved `valid` field, which carries the validity timestamp.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Name of the reserved field holding the validity timestamp
pub const VALID_FIELD: &str = "valid";

/// Timestamp that is stale for any realistic clock (the epoch origin)
pub const STALE_SINCE: i64 = 0;

/// A single cached lookup result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The cached result, without the reserved `valid` field
    #[serde(flatten)]
    pub payload: Map<String, Value>,
    /// Seconds since the Unix epoch at which the entry was last validated
    #[serde(
        rename = "valid",
        default = "stale_since",
        deserialize_with = "lenient_timestamp"
    )]
    pub valid_since: i64,
}

impl CacheEntry {
    /// Creates an entry that is pending validation.
    ///
    /// A `valid` key inside `payload` is dropped so it cannot shadow the
    /// validity timestamp.
    pub fn pending(mut payload: Map<String, Value>) -> Self {
        payload.remove(VALID_FIELD);
        Self {
            payload,
            valid_since: STALE_SINCE,
        }
    }

    /// Returns true if the entry is within `ttl_secs` of its validity timestamp at `now`
    pub fn is_fresh(&self, now: i64, ttl_secs: i64) -> bool {
        now.saturating_sub(self.valid_since) < ttl_secs
    }
}

fn stale_since() -> i64 {
    STALE_SINCE
}

/// Accepts integer or float timestamps; anything else degrades to stale.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let timestamp = match &value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(STALE_SINCE),
        _ => {
            tracing::warn!(
                value = %value,
                "non-numeric validity timestamp, treating entry as stale"
            );
            STALE_SINCE
        }
    };
    Ok(timestamp)
}
