use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};

use chrono::Utc;
use log::{debug, error, warn};
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::builder::Options;
use crate::cache::CachedRecord;
use crate::errors::{ClientError, ErrorKind};
use crate::modes::{Provenance, Source};
use crate::normalize::{format_defaults, normalize, with_defaults};
use crate::snapshot::{ResolvedSnapshot, SnapshotHub, Subscription};
use crate::value::{FlagMap, Value};

pub(crate) struct ResolverState {
    hub: SnapshotHub,
    generation: AtomicU64,
    ready: watch::Sender<bool>,
    cancel: CancellationToken,
}

impl ResolverState {
    fn new(initial: ResolvedSnapshot) -> Self {
        let (ready, _) = watch::channel(false);
        Self {
            hub: SnapshotHub::new(initial),
            generation: AtomicU64::new(0),
            ready,
            cancel: CancellationToken::new(),
        }
    }

    fn settle(&self) {
        self.ready.send_replace(true);
    }
}

/// Decides, at construction and on every refetch, which flag set is
/// authoritative, and publishes it through the snapshot hub.
pub(crate) struct FlagResolver<F> {
    state: Arc<ResolverState>,
    options: Arc<Options<F>>,
    close: Once,
}

impl<F: Serialize + Send + 'static> FlagResolver<F> {
    pub fn new(options: Arc<Options<F>>) -> Self {
        let (initial, needs_fetch) = initial_snapshot(&options);
        let resolver = Self {
            state: Arc::new(ResolverState::new(initial)),
            options,
            close: Once::new(),
        };

        if needs_fetch {
            resolver.start_initial_fetch();
        } else {
            resolver.state.settle();
        }

        resolver
    }

    pub fn snapshot(&self) -> ResolvedSnapshot {
        self.state.hub.snapshot()
    }

    /// Merges one entry into a clone of the current map and republishes it
    /// wholesale. Provenance stays as it was and nothing is persisted. An
    /// in-flight fetch keeps running and may later overwrite the entry.
    pub fn override_flag(&self, key: &str, value: Value) {
        let current = self.state.hub.snapshot();
        let mut flags = (*current.flags).clone();
        flags.insert(key.to_owned(), value);
        self.state.hub.publish(flags, current.provenance);
    }

    /// Forces a live fetch, skipping the cache validity check.
    pub async fn refetch(&self) -> Result<(), ClientError> {
        if self.options.source() == Source::Local || self.options.fetcher().is_none() {
            let err = ClientError::new(
                ErrorKind::FetchNotConfigured,
                "Cannot refetch, the client has no fetch function configured.".to_owned(),
            );
            warn!(event_id = err.kind.as_u16(); "{}", err);
            return Err(err);
        }
        fetch_and_publish(&self.state, &self.options).await
    }

    pub fn subscribe(
        &self,
        listener: Box<dyn Fn(&ResolvedSnapshot) + Send + Sync>,
    ) -> Subscription {
        self.state.hub.subscribe(listener)
    }

    pub fn unsubscribe(&self, subscription: Subscription) {
        self.state.hub.unsubscribe(subscription)
    }

    pub async fn wait_for_init(&self) {
        let mut ready = self.state.ready.subscribe();
        _ = ready.wait_for(|settled| *settled).await;
    }

    fn start_initial_fetch(&self) {
        let state = Arc::clone(&self.state);
        let options = Arc::clone(&self.options);

        tokio::spawn(async move {
            _ = fetch_and_publish(&state, &options).await;
            state.settle();
        });
    }
}

impl<F> Drop for FlagResolver<F> {
    fn drop(&mut self) {
        self.close.call_once(|| self.state.cancel.cancel());
    }
}

/// Computes the synchronous initial snapshot and whether a background fetch
/// must follow.
///
/// A remote client adopts a still-valid cached record right away and skips
/// the fetch entirely; without one it publishes the defaults as given (the
/// one path that bypasses normalization, so a snapshot is available before
/// any asynchronous work can run) and fetches if a fetch function exists.
fn initial_snapshot<F: 'static>(options: &Options<F>) -> (ResolvedSnapshot, bool) {
    match options.source() {
        Source::Local => {
            let defaults = options.default_flags();
            let flags = options
                .formatter()
                .and_then(|format| format_defaults(format, defaults))
                .unwrap_or_else(|| normalize(defaults));
            let snapshot = ResolvedSnapshot {
                flags: Arc::new(with_defaults(defaults, flags)),
                provenance: Provenance::Local,
            };
            (snapshot, false)
        }
        Source::Remote => match read_cache(options) {
            Some(flags) => {
                let snapshot = ResolvedSnapshot {
                    flags: Arc::new(flags),
                    provenance: Provenance::Local,
                };
                (snapshot, false)
            }
            None => {
                let snapshot = ResolvedSnapshot {
                    flags: Arc::new(options.default_flags().clone()),
                    provenance: Provenance::Remote,
                };
                (snapshot, options.fetcher().is_some())
            }
        },
    }
}

/// Reads the cached record under the configured storage key. Malformed or
/// expired records count as a miss; a hit is merged over the defaults.
fn read_cache<F>(options: &Options<F>) -> Option<FlagMap> {
    let raw = options.cache().read(options.storage_key())?;
    match CachedRecord::from_cached_json(raw.as_str()) {
        Ok(record) if record.is_valid(options.cache_expiration(), Utc::now()) => {
            Some(with_defaults(options.default_flags(), record.flags))
        }
        Ok(_) => None,
        Err(err) => {
            warn!(event_id = ErrorKind::InvalidCacheRecord.as_u16(); "{err}");
            None
        }
    }
}

/// Runs one fetch cycle: invoke, format-or-normalize, persist, publish,
/// notify. A result whose generation token was superseded by a later fetch is
/// discarded; so is one arriving after the resolver was closed.
async fn fetch_and_publish<F: Serialize>(
    state: &Arc<ResolverState>,
    options: &Arc<Options<F>>,
) -> Result<(), ClientError> {
    let Some(fetcher) = options.fetcher() else {
        return Ok(());
    };
    let issued = state.generation.fetch_add(1, Ordering::SeqCst) + 1;

    match fetcher().await {
        Ok(raw) => {
            let produced = match options.formatter() {
                Some(format) => format(raw),
                None => normalize(&raw),
            };
            let flags = with_defaults(options.default_flags(), produced);

            if state.generation.load(Ordering::SeqCst) != issued {
                debug!("Discarding fetched flags, a newer fetch was issued in the meantime.");
                return Ok(());
            }
            if state.cancel.is_cancelled() {
                debug!("Discarding fetched flags, the client was closed.");
                return Ok(());
            }

            let record = CachedRecord::new(flags.clone(), Utc::now());
            options
                .cache()
                .write(options.storage_key(), record.serialize().as_str());
            state.hub.publish(flags, Provenance::Remote);
            if let Some(on_success) = options.on_fetch_success() {
                on_success();
            }
            Ok(())
        }
        Err(fetch_err) => {
            let err = ClientError::new(
                ErrorKind::FetchFailure,
                format!("Fetching feature flags failed. ({fetch_err})"),
            );
            error!(event_id = err.kind.as_u16(); "{}", err);
            if let Some(on_error) = options.on_fetch_error() {
                on_error(&err);
            }
            Err(err)
        }
    }
}
