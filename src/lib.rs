//! Client-side feature flag resolution and caching SDK.
//!
//! Flags are resolved from one of three places: the defaults configured at
//! construction, a cached record in a pluggable persistence medium, or a live
//! fetch through an injected asynchronous function. The resolved snapshot is
//! published to any number of consumers and can be overridden per flag for
//! debugging.

#![warn(missing_docs)]

mod builder;
mod cache;
mod client;
mod constants;
mod errors;
mod modes;
mod normalize;
mod panel;
mod resolver;
mod snapshot;
mod value;

pub use builder::{ClientBuilder, FetchError, FetchFuture};
pub use cache::{CachedRecord, EmptyFlagCache, FlagCache, RecordError};
pub use client::Client;
pub use constants::PKG_VERSION;
pub use errors::{ClientError, ErrorKind};
pub use modes::{Provenance, Source};
pub use panel::DebugPanel;
pub use snapshot::{ResolvedSnapshot, Subscription};
pub use value::{FlagMap, Value, ValuePrimitive};
