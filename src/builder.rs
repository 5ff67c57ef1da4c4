use crate::cache::EmptyFlagCache;
use crate::constants::{DEFAULT_CACHE_EXPIRATION, DEFAULT_STORAGE_KEY};
use crate::errors::{ClientError, ErrorKind};
use crate::modes::Source;
use crate::normalize::FormatFn;
use crate::value::{FlagMap, Value};
use crate::{Client, FlagCache};
use serde::Serialize;
use std::borrow::Borrow;
use std::error::Error;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Error type an injected fetch function may fail with.
pub type FetchError = Box<dyn Error + Send + Sync>;

/// Future returned by an injected fetch function.
pub type FetchFuture<F> = Pin<Box<dyn Future<Output = Result<F, FetchError>> + Send>>;

pub(crate) type FetcherFn<F> = Box<dyn Fn() -> FetchFuture<F> + Send + Sync>;
pub(crate) type SuccessCallback = Box<dyn Fn() + Send + Sync>;
pub(crate) type ErrorCallback = Box<dyn Fn(&ClientError) + Send + Sync>;

pub struct Options<F> {
    source: Source,
    default_flags: FlagMap,
    storage_key: String,
    cache: Box<dyn FlagCache>,
    cache_expiration: Duration,
    fetcher: Option<FetcherFn<F>>,
    formatter: Option<FormatFn<F>>,
    on_fetch_success: Option<SuccessCallback>,
    on_fetch_error: Option<ErrorCallback>,
}

impl<F> Options<F> {
    pub(crate) fn source(&self) -> Source {
        self.source
    }

    pub(crate) fn default_flags(&self) -> &FlagMap {
        &self.default_flags
    }

    pub(crate) fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub(crate) fn cache(&self) -> &dyn FlagCache {
        self.cache.borrow()
    }

    pub(crate) fn cache_expiration(&self) -> Duration {
        self.cache_expiration
    }

    pub(crate) fn fetcher(&self) -> Option<&FetcherFn<F>> {
        self.fetcher.as_ref()
    }

    pub(crate) fn formatter(&self) -> Option<&FormatFn<F>> {
        self.formatter.as_ref()
    }

    pub(crate) fn on_fetch_success(&self) -> Option<&SuccessCallback> {
        self.on_fetch_success.as_ref()
    }

    pub(crate) fn on_fetch_error(&self) -> Option<&ErrorCallback> {
        self.on_fetch_error.as_ref()
    }
}

/// Builder to create a [`Client`].
///
/// The type parameter is the shape the injected fetch function resolves with;
/// it defaults to [`FlagMap`] and is bridged to the published flag map solely
/// through the formatter.
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
pub struct ClientBuilder<F = FlagMap> {
    source: Source,
    default_flags: FlagMap,
    storage_key: Option<String>,
    cache: Option<Box<dyn FlagCache>>,
    cache_expiration: Option<Duration>,
    fetcher: Option<FetcherFn<F>>,
    formatter: Option<FormatFn<F>>,
    on_fetch_success: Option<SuccessCallback>,
    on_fetch_error: Option<ErrorCallback>,
}

impl<F> ClientBuilder<F> {
    /// Creates a new [`ClientBuilder`] for a custom fetched shape.
    ///
    /// Prefer [`Client::builder`] when the fetch function resolves with a
    /// [`FlagMap`] directly.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flagcache::{ClientBuilder, Source, Value};
    /// use serde::Serialize;
    ///
    /// #[derive(Serialize)]
    /// struct Payload {
    ///     enabled: Vec<String>,
    /// }
    ///
    /// let builder = ClientBuilder::<Payload>::new(Source::Remote)
    ///     .fetcher(|| async { Ok(Payload { enabled: vec!["welcome".to_owned()] }) })
    ///     .formatter(|payload| {
    ///         payload
    ///             .enabled
    ///             .into_iter()
    ///             .map(|key| (key, Value::Bool(true)))
    ///             .collect()
    ///     });
    /// ```
    pub fn new(source: Source) -> Self {
        Self {
            source,
            default_flags: FlagMap::new(),
            storage_key: None,
            cache: None,
            cache_expiration: None,
            fetcher: None,
            formatter: None,
            on_fetch_success: None,
            on_fetch_error: None,
        }
    }

    /// Sets the default flags.
    ///
    /// The defaults define the flag shape: the published map always contains
    /// at least these keys. They also serve as the fallback values before a
    /// fetch completes and as the flag set of a [`Source::Local`] client.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flagcache::{Client, Source};
    ///
    /// let builder = Client::builder(Source::Local)
    ///     .default_flags([("welcome", false), ("search", true)]);
    /// ```
    pub fn default_flags<K, V, I>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        self.default_flags = flags
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self
    }

    /// Sets the key the cached record is stored under.
    /// Default value is `featureFlags`.
    ///
    /// Two differently configured clients sharing the same key corrupt each
    /// other's cache; use distinct keys for distinct flag shapes.
    pub fn storage_key(mut self, storage_key: &str) -> Self {
        self.storage_key = Some(storage_key.to_owned());
        self
    }

    /// Sets a [`FlagCache`] implementation used for caching.
    /// Default is [`EmptyFlagCache`], which degrades the client to
    /// fetch-every-time behavior.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flagcache::{Client, FlagCache, Source};
    ///
    /// let builder = Client::builder(Source::Remote)
    ///     .cache(Box::new(CustomCache {}));
    ///
    /// struct CustomCache {}
    ///
    /// impl FlagCache for CustomCache {
    ///     fn read(&self, key: &str) -> Option<String> {
    ///         // read from the persistence medium
    ///         None
    ///     }
    ///
    ///     fn write(&self, key: &str, value: &str) {
    ///         // write to the persistence medium
    ///     }
    /// }
    /// ```
    pub fn cache(mut self, cache: Box<dyn FlagCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Sets the age at which a cached record is no longer trusted.
    /// Default value is `24` hours.
    ///
    /// The boundary is strict: a record exactly this old is already expired.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use std::time::Duration;
    /// use flagcache::{Client, Source};
    ///
    /// let builder = Client::builder(Source::Remote)
    ///     .cache_expiration(Duration::from_secs(60));
    /// ```
    pub fn cache_expiration(mut self, expiration: Duration) -> Self {
        self.cache_expiration = Some(expiration);
        self
    }

    /// Sets the fetch function used to load flags from the remote source.
    ///
    /// The function is treated as an opaque asynchronous operation; its
    /// result is bridged into a [`FlagMap`] by the formatter, or by the
    /// default boolean coercion when no formatter is configured.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use flagcache::{Client, FlagMap, Source, Value};
    ///
    /// let builder = Client::builder(Source::Remote)
    ///     .fetcher(|| async {
    ///         Ok(FlagMap::from([("welcome".to_owned(), Value::Bool(true))]))
    ///     });
    /// ```
    pub fn fetcher<Fut>(mut self, fetcher: impl Fn() -> Fut + Send + Sync + 'static) -> Self
    where
        Fut: Future<Output = Result<F, FetchError>> + Send + 'static,
    {
        self.fetcher = Some(Box::new(move || -> FetchFuture<F> { Box::pin(fetcher()) }));
        self
    }

    /// Sets the function that converts the fetched payload into a [`FlagMap`].
    ///
    /// Must be pure and synchronous. Its output is trusted as-is, no coercion
    /// is applied on top of it. On a [`Source::Local`] client with the default
    /// fetched shape, the formatter also runs over the default flags.
    pub fn formatter(mut self, formatter: impl Fn(F) -> FlagMap + Send + Sync + 'static) -> Self {
        self.formatter = Some(Box::new(formatter));
        self
    }

    /// Sets a callback invoked after every successful fetch, once the fetched
    /// flags were persisted and published.
    pub fn on_fetch_success(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_fetch_success = Some(Box::new(callback));
        self
    }

    /// Sets a callback invoked when a fetch fails. The failure is otherwise
    /// swallowed; the published snapshot keeps its pre-fetch value.
    pub fn on_fetch_error(
        mut self,
        callback: impl Fn(&ClientError) + Send + Sync + 'static,
    ) -> Self {
        self.on_fetch_error = Some(Box::new(callback));
        self
    }

    /// Creates a [`Client`] from the configuration made on the builder.
    ///
    /// On a [`Source::Remote`] client without a valid cached record this
    /// starts the initial fetch in the background, so it must be called
    /// within a `tokio` runtime.
    ///
    /// # Errors
    ///
    /// This method fails if the configured storage key is empty.
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
    pub fn build(self) -> Result<Client<F>, ClientError>
    where
        F: Serialize + Send + 'static,
    {
        if let Some(storage_key) = &self.storage_key {
            if storage_key.is_empty() {
                return Err(ClientError::new(
                    ErrorKind::InvalidStorageKey,
                    "The storage key cannot be empty.".to_owned(),
                ));
            }
        }
        Ok(Client::with_options(self.build_options()))
    }

    pub(crate) fn build_options(self) -> Options<F> {
        Options {
            source: self.source,
            default_flags: self.default_flags,
            storage_key: self
                .storage_key
                .unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_owned()),
            cache: self.cache.unwrap_or(Box::new(EmptyFlagCache::new())),
            cache_expiration: self.cache_expiration.unwrap_or(DEFAULT_CACHE_EXPIRATION),
            fetcher: self.fetcher,
            formatter: self.formatter,
            on_fetch_success: self.on_fetch_success,
            on_fetch_error: self.on_fetch_error,
        }
    }
}
