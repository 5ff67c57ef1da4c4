use crate::builder::{ClientBuilder, Options};
use crate::errors::{ClientError, ErrorKind};
use crate::modes::{Provenance, Source};
use crate::resolver::FlagResolver;
use crate::snapshot::{ResolvedSnapshot, Subscription};
use crate::value::{FlagMap, Value, ValuePrimitive};
use log::warn;
use serde::Serialize;
use std::any::type_name;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// The main component for resolving, caching, and distributing feature flags.
///
/// The type parameter is the shape the injected fetch function resolves with;
/// it defaults to [`FlagMap`].
///
/// # Examples
///
/// ```no_run
/// use flagcache::{Client, FlagMap, Source, Value};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() {
///     let client = Client::builder(Source::Remote)
///         .default_flags([("welcome", false)])
///         .fetcher(|| async {
///             // load the flags from the backend of your choice
///             Ok(FlagMap::from([("welcome".to_owned(), Value::Bool(true))]))
///         })
///         .build()
///         .unwrap();
///
///     client.wait_for_ready(Duration::from_secs(5)).await.unwrap();
///     let is_welcome_enabled = client.get_value("welcome", false);
/// }
/// ```
pub struct Client<F = FlagMap> {
    resolver: FlagResolver<F>,
}

impl<F> std::fmt::Debug for Client<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a new [`ClientBuilder`] whose fetch function resolves with a
    /// [`FlagMap`]. Use [`ClientBuilder::new`] for custom fetched shapes.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flagcache::{Client, Source, Value};
    ///
    /// let client = Client::builder(Source::Local)
    ///     .default_flags([("welcome", Value::Bool(true))])
    ///     .build()
    ///     .unwrap();
    /// ```
    pub fn builder(source: Source) -> ClientBuilder {
        ClientBuilder::new(source)
    }
}

impl<F: Serialize + Send + 'static> Client<F> {
    pub(crate) fn with_options(options: Options<F>) -> Self {
        Self {
            resolver: FlagResolver::new(Arc::new(options)),
        }
    }

    /// Returns the currently published flag map.
    ///
    /// The map is an immutable snapshot: it is replaced wholesale on every
    /// transition and never mutated in place.
    pub fn flags(&self) -> Arc<FlagMap> {
        self.resolver.snapshot().flags
    }

    /// Returns the currently published snapshot together with its provenance.
    pub fn snapshot(&self) -> ResolvedSnapshot {
        self.resolver.snapshot()
    }

    /// Returns the mechanism that produced the current snapshot.
    pub fn provenance(&self) -> Provenance {
        self.resolver.snapshot().provenance
    }

    /// Reads a single flag by its `key`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flagcache::{Client, Source, Value};
    ///
    /// let client = Client::builder(Source::Local)
    ///     .default_flags([("welcome", Value::Bool(true))])
    ///     .build()
    ///     .unwrap();
    ///
    /// assert_eq!(client.get_flag("welcome"), Some(Value::Bool(true)));
    /// assert_eq!(client.get_flag("missing"), None);
    /// ```
    pub fn get_flag(&self, key: &str) -> Option<Value> {
        self.resolver.snapshot().flags.get(key).cloned()
    }

    /// Reads a flag identified by the given `key` as a primitive value.
    ///
    /// Returns `default` if the flag doesn't exist or its value has a
    /// different type than the requested one.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flagcache::{Client, Source, Value};
    ///
    /// let client = Client::builder(Source::Local)
    ///     .default_flags([("welcome", Value::Bool(true))])
    ///     .build()
    ///     .unwrap();
    ///
    /// assert!(client.get_value("welcome", false));
    /// assert_eq!(client.get_value("missing", 5i64), 5);
    /// ```
    pub fn get_value<T: ValuePrimitive>(&self, key: &str, default: T) -> T {
        let Some(value) = self.get_flag(key) else {
            return default;
        };
        match T::from_value(&value) {
            Some(val) => val,
            None => {
                let err = ClientError::new(
                    ErrorKind::ValueTypeMismatch,
                    format!(
                        "The type of the flag '{key}' doesn't match the requested type '{}'. Returning the default value.",
                        type_name::<T>()
                    ),
                );
                warn!(event_id = err.kind.as_u16(); "{}", err);
                default
            }
        }
    }

    /// Replaces the value of a single flag in the in-memory snapshot.
    ///
    /// The override applies immediately and regardless of source or state. It
    /// is never written through to the cache and doesn't change provenance;
    /// a fetch completing later overwrites it.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flagcache::{Client, Source, Value};
    ///
    /// let client = Client::builder(Source::Local)
    ///     .default_flags([("welcome", Value::Bool(false))])
    ///     .build()
    ///     .unwrap();
    ///
    /// client.override_flag("welcome", true);
    /// assert!(client.get_value("welcome", false));
    /// ```
    pub fn override_flag(&self, key: &str, value: impl Into<Value>) {
        self.resolver.override_flag(key, value.into());
    }

    /// Forces a live fetch, even while a valid cached record exists.
    ///
    /// On success the fetched flags are persisted and published with
    /// [`Provenance::Remote`]. On failure the published snapshot keeps its
    /// pre-fetch value.
    ///
    /// # Errors
    ///
    /// This method fails in the following cases:
    /// - The client is configured with [`Source::Local`] or has no fetch
    ///   function; the call is then a warned no-op.
    /// - The fetch function itself fails.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use flagcache::{Client, FlagMap, Source};
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let client = Client::builder(Source::Remote)
    ///         .fetcher(|| async { Ok(FlagMap::new()) })
    ///         .build()
    ///         .unwrap();
    ///
    ///     client.refetch().await.unwrap();
    /// }
    /// ```
    pub async fn refetch(&self) -> Result<(), ClientError> {
        self.resolver.refetch().await
    }

    /// Registers a listener invoked with every newly published snapshot.
    ///
    /// Listeners run synchronously on the publishing thread; they must not
    /// subscribe or unsubscribe from within the callback.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flagcache::{Client, Source, Value};
    ///
    /// let client = Client::builder(Source::Local)
    ///     .default_flags([("welcome", Value::Bool(false))])
    ///     .build()
    ///     .unwrap();
    ///
    /// let subscription = client.subscribe(|snapshot| {
    ///     println!("flags changed: {:?}", snapshot.flags);
    /// });
    ///
    /// client.override_flag("welcome", true);
    /// client.unsubscribe(subscription);
    /// ```
    pub fn subscribe(
        &self,
        listener: impl Fn(&ResolvedSnapshot) + Send + Sync + 'static,
    ) -> Subscription {
        self.resolver.subscribe(Box::new(listener))
    }

    /// Removes a listener previously registered with [`Client::subscribe`].
    pub fn unsubscribe(&self, subscription: Subscription) {
        self.resolver.unsubscribe(subscription)
    }

    /// Asynchronously waits until the initial resolution settles, for a
    /// maximum duration specified in `wait_timeout`.
    ///
    /// The initial resolution settles immediately for local sources, cache
    /// adoptions, and clients without a fetch function; otherwise when the
    /// initial fetch completes, successfully or not.
    ///
    /// # Errors
    ///
    /// This method fails if the initialization takes more time than the
    /// specified `wait_timeout`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use flagcache::{Client, FlagMap, Source};
    /// use std::time::Duration;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let client = Client::builder(Source::Remote)
    ///         .fetcher(|| async { Ok(FlagMap::new()) })
    ///         .build()
    ///         .unwrap();
    ///
    ///     client.wait_for_ready(Duration::from_secs(5)).await.unwrap();
    /// }
    /// ```
    pub async fn wait_for_ready(&self, wait_timeout: Duration) -> Result<(), ClientError> {
        match timeout(wait_timeout, self.resolver.wait_for_init()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                let err = ClientError::new(
                    ErrorKind::InitTimedOut,
                    format!(
                        "Client initialization timed out after {}ms.",
                        wait_timeout.as_millis()
                    ),
                );
                warn!(event_id = err.kind.as_u16(); "{}", err);
                Err(err)
            }
        }
    }
}
