use crate::value::FlagMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// A cache API used to make custom cache implementations.
///
/// The medium is addressed by a single string key; two clients sharing the
/// same key operate on the same record, so distinct flag shapes must use
/// distinct keys.
pub trait FlagCache: Sync + Send {
    /// Gets the actual value from the cache identified by the given `key`.
    fn read(&self, key: &str) -> Option<String>;

    /// Writes the given `value` to the cache by the given `key`.
    fn write(&self, key: &str, value: &str);
}

/// Cache implementation for headless contexts without a persistence medium.
///
/// All reads report a miss and all writes are dropped, so a remote client
/// degrades to fetch-every-time behavior.
pub struct EmptyFlagCache {}

impl EmptyFlagCache {
    /// Creates a new [`EmptyFlagCache`].
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for EmptyFlagCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagCache for EmptyFlagCache {
    fn read(&self, _: &str) -> Option<String> {
        None
    }
    fn write(&self, _: &str, _: &str) {}
}

/// Error produced when a cached record cannot be interpreted.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The cached payload was not parseable as a record.
    #[error("JSON parsing failed. ({0})")]
    Parse(String),
}

/// The unit persisted to the cache medium: a flag map plus the time it was written.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CachedRecord {
    /// The persisted flag map.
    pub flags: FlagMap,
    /// Persistence time in epoch milliseconds.
    pub timestamp: i64,
}

impl CachedRecord {
    /// Creates a record stamped with the given persistence time.
    pub fn new(flags: FlagMap, time: DateTime<Utc>) -> Self {
        Self {
            flags,
            timestamp: time.timestamp_millis(),
        }
    }

    /// True while the record's age measured at `now` is strictly below `expiration`.
    /// A record exactly `expiration` old is already invalid.
    pub fn is_valid(&self, expiration: Duration, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() - self.timestamp < expiration.as_millis() as i64
    }

    /// Serializes the record into the JSON form stored in the cache medium.
    pub fn serialize(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Parses a record previously produced by [`CachedRecord::serialize`].
    pub fn from_cached_json(json: &str) -> Result<Self, RecordError> {
        serde_json::from_str(json).map_err(|err| RecordError::Parse(err.to_string()))
    }
}
