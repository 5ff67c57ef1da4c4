use std::time::Duration;

/// The version of the crate.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_STORAGE_KEY: &str = "featureFlags";
pub const DEFAULT_CACHE_EXPIRATION: Duration = Duration::from_millis(24 * 60 * 60 * 1000);
