#![allow(dead_code)]

use chrono::Utc;
use flagcache::{
    CachedRecord, Client, EmptyFlagCache, ErrorKind, FlagMap, Provenance, Source, Value,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

mod utils;

use utils::{log_record_init, rand_storage_key, RecordingLogger, SharedCache};

fn bool_flags(entries: &[(&str, bool)]) -> FlagMap {
    entries
        .iter()
        .map(|(key, val)| (key.to_string(), Value::Bool(*val)))
        .collect()
}

#[tokio::test]
async fn fetch_publishes_and_persists() {
    let cache = SharedCache::new();
    let storage_key = rand_storage_key();
    let calls = Arc::new(AtomicUsize::new(0));
    let succeeded = Arc::new(AtomicBool::new(false));

    let fetch_calls = Arc::clone(&calls);
    let client = Client::builder(Source::Remote)
        .default_flags([("welcome", false)])
        .storage_key(storage_key.as_str())
        .cache(Box::new(cache.clone()))
        .fetcher(move || {
            fetch_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(bool_flags(&[("welcome", true)])) }
        })
        .on_fetch_success({
            let succeeded = Arc::clone(&succeeded);
            move || succeeded.store(true, Ordering::SeqCst)
        })
        .build()
        .unwrap();

    // the synchronous initial snapshot serves the defaults
    assert_eq!(client.get_flag("welcome"), Some(Value::Bool(false)));
    assert_eq!(client.provenance(), Provenance::Remote);

    client
        .wait_for_ready(Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(client.get_flag("welcome"), Some(Value::Bool(true)));
    assert_eq!(client.provenance(), Provenance::Remote);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(succeeded.load(Ordering::SeqCst));

    let record =
        CachedRecord::from_cached_json(cache.entry(storage_key.as_str()).unwrap().as_str())
            .unwrap();
    assert_eq!(record.flags["welcome"], Value::Bool(true));
}

#[tokio::test]
async fn valid_cache_is_adopted_without_fetch() {
    let cache = SharedCache::new();
    let storage_key = rand_storage_key();
    let record = CachedRecord::new(bool_flags(&[("welcome", true)]), Utc::now());
    cache.put(storage_key.as_str(), record.serialize().as_str());

    let calls = Arc::new(AtomicUsize::new(0));
    let fetch_calls = Arc::clone(&calls);
    let client = Client::builder(Source::Remote)
        .default_flags([("welcome", false), ("banner", false)])
        .storage_key(storage_key.as_str())
        .cache(Box::new(cache.clone()))
        .fetcher(move || {
            fetch_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(bool_flags(&[("welcome", false)])) }
        })
        .build()
        .unwrap();

    client
        .wait_for_ready(Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(client.get_flag("welcome"), Some(Value::Bool(true)));
    // declared keys missing from the record come from the defaults
    assert_eq!(client.get_flag("banner"), Some(Value::Bool(false)));
    assert_eq!(client.provenance(), Provenance::Local);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn expired_cache_triggers_fetch() {
    let cache = SharedCache::new();
    let storage_key = rand_storage_key();
    let expired = CachedRecord {
        flags: bool_flags(&[("welcome", true)]),
        timestamp: Utc::now().timestamp_millis() - 7_200_000,
    };
    cache.put(storage_key.as_str(), expired.serialize().as_str());

    let calls = Arc::new(AtomicUsize::new(0));
    let fetch_calls = Arc::clone(&calls);
    let client = Client::builder(Source::Remote)
        .default_flags([("welcome", false)])
        .storage_key(storage_key.as_str())
        .cache(Box::new(cache.clone()))
        .cache_expiration(Duration::from_secs(3600))
        .fetcher(move || {
            fetch_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(bool_flags(&[("welcome", true)])) }
        })
        .build()
        .unwrap();

    client
        .wait_for_ready(Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.get_flag("welcome"), Some(Value::Bool(true)));
    assert_eq!(client.provenance(), Provenance::Remote);

    // the expired record was replaced with a freshly stamped one
    let record =
        CachedRecord::from_cached_json(cache.entry(storage_key.as_str()).unwrap().as_str())
            .unwrap();
    assert!(record.timestamp > expired.timestamp);
}

#[tokio::test]
async fn malformed_cache_counts_as_miss() {
    let cache = SharedCache::new();
    let storage_key = rand_storage_key();
    cache.put(storage_key.as_str(), "definitely-not-a-record");

    let client = Client::builder(Source::Remote)
        .default_flags([("welcome", false)])
        .storage_key(storage_key.as_str())
        .cache(Box::new(cache.clone()))
        .fetcher(|| async { Ok(bool_flags(&[("welcome", true)])) })
        .build()
        .unwrap();

    client
        .wait_for_ready(Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(client.get_flag("welcome"), Some(Value::Bool(true)));
}

#[tokio::test]
async fn fetched_payload_is_normalized() {
    let client = Client::builder(Source::Remote)
        .default_flags([("welcome", false)])
        .fetcher(|| async {
            Ok(HashMap::from([
                ("welcome".to_owned(), Value::Bool(true)),
                ("limit".to_owned(), Value::Int(10)),
            ]))
        })
        .build()
        .unwrap();

    client
        .wait_for_ready(Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(client.get_flag("welcome"), Some(Value::Bool(true)));
    // without a formatter, non-boolean fetched values degrade to disabled
    assert_eq!(client.get_flag("limit"), Some(Value::Bool(false)));
}

#[tokio::test]
async fn formatter_bridges_fetched_shape() {
    let client = flagcache::ClientBuilder::<Vec<String>>::new(Source::Remote)
        .default_flags([("welcome", false), ("banner", false)])
        .fetcher(|| async { Ok(vec!["welcome".to_owned()]) })
        .formatter(|enabled| {
            enabled
                .into_iter()
                .map(|key| (key, Value::Bool(true)))
                .collect()
        })
        .build()
        .unwrap();

    client
        .wait_for_ready(Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(client.get_flag("welcome"), Some(Value::Bool(true)));
    assert_eq!(client.get_flag("banner"), Some(Value::Bool(false)));
}

#[tokio::test]
async fn failed_fetch_keeps_snapshot_and_reports() {
    let reported = Arc::new(Mutex::new(None));
    let cache = SharedCache::new();
    let storage_key = rand_storage_key();

    let client = Client::builder(Source::Remote)
        .default_flags([("welcome", Value::Int(3))])
        .storage_key(storage_key.as_str())
        .cache(Box::new(cache.clone()))
        .fetcher(|| async { Err("connection refused".into()) })
        .on_fetch_error({
            let reported = Arc::clone(&reported);
            move |err| {
                *reported.lock().unwrap() = Some((err.kind, err.message.clone()));
            }
        })
        .build()
        .unwrap();

    client
        .wait_for_ready(Duration::from_secs(5))
        .await
        .unwrap();

    // the pre-fetch snapshot survives as given, bypassing normalization
    assert_eq!(client.get_flag("welcome"), Some(Value::Int(3)));
    assert!(cache.entry(storage_key.as_str()).is_none());

    let (kind, message) = reported.lock().unwrap().clone().unwrap();
    assert_eq!(kind, ErrorKind::FetchFailure);
    assert!(message.contains("connection refused"));
}

#[tokio::test]
async fn refetch_skips_cache_validity_check() {
    let cache = SharedCache::new();
    let storage_key = rand_storage_key();
    let record = CachedRecord::new(bool_flags(&[("welcome", false)]), Utc::now());
    cache.put(storage_key.as_str(), record.serialize().as_str());

    let calls = Arc::new(AtomicUsize::new(0));
    let fetch_calls = Arc::clone(&calls);
    let client = Client::builder(Source::Remote)
        .default_flags([("welcome", false)])
        .storage_key(storage_key.as_str())
        .cache(Box::new(cache.clone()))
        .fetcher(move || {
            fetch_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(bool_flags(&[("welcome", true)])) }
        })
        .build()
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(client.provenance(), Provenance::Local);

    client.refetch().await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(client.get_flag("welcome"), Some(Value::Bool(true)));
    assert_eq!(client.provenance(), Provenance::Remote);
}

#[tokio::test]
async fn refetch_without_fetcher_is_a_warned_noop() {
    log_record_init();

    let cache = SharedCache::new();
    let storage_key = rand_storage_key();
    let client = Client::builder(Source::Remote)
        .default_flags([("welcome", false)])
        .storage_key(storage_key.as_str())
        .cache(Box::new(cache.clone()))
        .build()
        .unwrap();

    let before = client.flags();
    let err = client.refetch().await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::FetchNotConfigured);
    assert_eq!(*client.flags(), *before);
    assert!(cache.entry(storage_key.as_str()).is_none());
    RecordingLogger::LOGS.with_borrow(|logs| {
        assert!(logs.contains("WARNING [3300]"));
    });
}

#[tokio::test]
async fn refetch_on_local_source_is_rejected() {
    let client = Client::builder(Source::Local)
        .default_flags([("welcome", Value::Bool(true))])
        .build()
        .unwrap();

    let err = client.refetch().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::FetchNotConfigured);
}

#[tokio::test]
async fn hydration_without_fetcher_adopts_valid_cache() {
    let cache = SharedCache::new();
    let storage_key = rand_storage_key();
    let record = CachedRecord::new(bool_flags(&[("welcome", true)]), Utc::now());
    cache.put(storage_key.as_str(), record.serialize().as_str());

    let client = Client::builder(Source::Remote)
        .default_flags([("welcome", false)])
        .storage_key(storage_key.as_str())
        .cache(Box::new(cache.clone()))
        .build()
        .unwrap();

    client
        .wait_for_ready(Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(client.get_flag("welcome"), Some(Value::Bool(true)));
    assert_eq!(client.provenance(), Provenance::Local);
}

#[tokio::test]
async fn empty_cache_medium_degrades_to_fetch_every_time() {
    let calls = Arc::new(AtomicUsize::new(0));
    let fetch_calls = Arc::clone(&calls);
    let client = Client::builder(Source::Remote)
        .default_flags([("welcome", false)])
        .cache(Box::new(EmptyFlagCache::new()))
        .fetcher(move || {
            fetch_calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(bool_flags(&[("welcome", true)])) }
        })
        .build()
        .unwrap();

    client
        .wait_for_ready(Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    client.refetch().await.unwrap();
    client.refetch().await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn later_issued_fetch_wins_over_slow_one() {
    let cache = SharedCache::new();
    let storage_key = rand_storage_key();
    let record = CachedRecord::new(bool_flags(&[("winner", false)]), Utc::now());
    cache.put(storage_key.as_str(), record.serialize().as_str());

    let calls = Arc::new(AtomicUsize::new(0));
    let fetch_calls = Arc::clone(&calls);
    let client = Arc::new(
        Client::builder(Source::Remote)
            .default_flags([("winner", false)])
            .storage_key(storage_key.as_str())
            .cache(Box::new(cache.clone()))
            .fetcher(move || {
                let call = fetch_calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        tokio::time::sleep(Duration::from_millis(300)).await;
                        Ok(bool_flags(&[("winner", false)]))
                    } else {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(bool_flags(&[("winner", true)]))
                    }
                }
            })
            .build()
            .unwrap(),
    );

    let slow_client = Arc::clone(&client);
    let slow = tokio::spawn(async move { slow_client.refetch().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    client.refetch().await.unwrap();

    slow.await.unwrap().unwrap();

    // the slow fetch was issued first, its late result is discarded
    assert_eq!(client.get_flag("winner"), Some(Value::Bool(true)));
}

#[tokio::test]
async fn scenario_full_cache_lifecycle() {
    let cache = SharedCache::new();
    let storage_key = rand_storage_key();
    let calls = Arc::new(AtomicUsize::new(0));

    let build_client = |cache: SharedCache, storage_key: String, calls: Arc<AtomicUsize>| {
        Client::builder(Source::Remote)
            .default_flags([("welcome", false)])
            .storage_key(storage_key.as_str())
            .cache(Box::new(cache))
            .cache_expiration(Duration::from_millis(1000))
            .fetcher(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok(bool_flags(&[("welcome", true)]))
                }
            })
            .build()
            .unwrap()
    };

    let first = build_client(cache.clone(), storage_key.clone(), Arc::clone(&calls));
    assert_eq!(first.get_flag("welcome"), Some(Value::Bool(false)));

    first.wait_for_ready(Duration::from_secs(5)).await.unwrap();
    assert_eq!(first.get_flag("welcome"), Some(Value::Bool(true)));
    assert_eq!(first.provenance(), Provenance::Remote);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // a second instance inside the expiration window adopts the cache
    let second = build_client(cache.clone(), storage_key.clone(), Arc::clone(&calls));
    second.wait_for_ready(Duration::from_secs(5)).await.unwrap();
    assert_eq!(second.get_flag("welcome"), Some(Value::Bool(true)));
    assert_eq!(second.provenance(), Provenance::Local);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // past the expiration window the record is no longer trusted
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let third = build_client(cache.clone(), storage_key.clone(), Arc::clone(&calls));
    third.wait_for_ready(Duration::from_secs(5)).await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(third.provenance(), Provenance::Remote);
}

#[tokio::test]
async fn dropped_client_discards_inflight_fetch() {
    let cache = SharedCache::new();
    let storage_key = rand_storage_key();

    let client = Client::builder(Source::Remote)
        .default_flags([("welcome", false)])
        .storage_key(storage_key.as_str())
        .cache(Box::new(cache.clone()))
        .fetcher(|| async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(bool_flags(&[("welcome", true)]))
        })
        .build()
        .unwrap();

    drop(client);
    tokio::time::sleep(Duration::from_millis(400)).await;

    // the fetch ran to completion but its result went nowhere
    assert!(cache.entry(storage_key.as_str()).is_none());
}

#[tokio::test]
async fn override_survives_until_next_fetch() {
    let client = Client::builder(Source::Remote)
        .default_flags([("welcome", false)])
        .fetcher(|| async { Ok(bool_flags(&[("welcome", false)])) })
        .build()
        .unwrap();

    client
        .wait_for_ready(Duration::from_secs(5))
        .await
        .unwrap();

    client.override_flag("welcome", true);
    assert_eq!(client.get_flag("welcome"), Some(Value::Bool(true)));
    assert_eq!(client.provenance(), Provenance::Remote);

    // a completed fetch replaces the whole map, overrides included
    client.refetch().await.unwrap();
    assert_eq!(client.get_flag("welcome"), Some(Value::Bool(false)));
}
