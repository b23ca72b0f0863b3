//! Integration tests for the tag cache
//!
//! These run against the in-process backend and cover:
//! - Round trips for every payload shape
//! - Multi-key reads and the single-key special case
//! - Tag fan-in and multi-tag invalidation
//! - Default and per-call timeouts
//! - Atomicity of writes and idempotence of invalidation
//! - Error propagation

mod common;

use common::{put_raw, Mode, RecordingStorage};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tag_cache::{
    CacheData, Command, Lookup, MemoryStorage, NonEmpty, SetOptions, Storage, TagCache,
    TagCacheConfig, TagCacheError,
};

fn memory_cache() -> TagCache<MemoryStorage> {
    TagCache::new(MemoryStorage::new(), TagCacheConfig::default()).unwrap()
}

fn keys(names: &[&str]) -> NonEmpty<String> {
    NonEmpty::try_from(names).unwrap()
}

async fn fan_in_setup(cache: &TagCache<MemoryStorage>) {
    let data = json!("data");
    cache
        .set("a", &data, &["tag-1", "tag-2"], SetOptions::default())
        .await
        .unwrap();
    cache
        .set("b", &data, &["tag-2", "tag-3"], SetOptions::default())
        .await
        .unwrap();
    cache
        .set("c", &data, &["tag-3", "tag-4"], SetOptions::default())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_get_and_set() {
    let cache = memory_cache();

    cache
        .set("a", &json!("data"), &["tag-1", "tag-2"], SetOptions::default())
        .await
        .unwrap();

    assert_eq!(cache.get("a").await.unwrap(), Lookup::One(json!("data")));
}

#[tokio::test]
async fn test_round_trip_payload_shapes() {
    let cache = memory_cache();

    let payloads = vec![
        json!("a string"),
        json!(42),
        json!(-1.25),
        json!(true),
        CacheData::Null,
        json!({ "id": "asdf-123" }),
        json!(["1", "2"]),
        json!([{ "id": "asdf-123" }, { "id": "asdf-234" }]),
        json!({ "content": { "title": "Hello", "tags": [1, [2, 3]] } }),
        json!("[\"1\"]"),
    ];

    for (i, payload) in payloads.iter().enumerate() {
        let key = format!("key-{}", i);
        cache
            .set(&key, payload, &["tag-1"], SetOptions::default())
            .await
            .unwrap();

        let lookup = cache.get(key.as_str()).await.unwrap();
        assert_eq!(lookup, Lookup::One(payload.clone()), "payload {}", i);
    }
}

#[tokio::test]
async fn test_string_that_looks_like_array_stays_string() {
    let cache = memory_cache();

    cache
        .set("a", &json!("[\"1\"]"), &["tag-1"], SetOptions::default())
        .await
        .unwrap();

    assert_eq!(cache.get("a").await.unwrap(), Lookup::One(json!("[\"1\"]")));
}

#[tokio::test]
async fn test_get_multiple_items() {
    let cache = memory_cache();

    cache
        .set("a", &json!("data-a"), &["some-tag"], SetOptions::default())
        .await
        .unwrap();
    cache
        .set("b", &json!("data-b"), &["some-tag"], SetOptions::default())
        .await
        .unwrap();

    assert_eq!(
        cache.get(keys(&["a", "b"])).await.unwrap(),
        Lookup::Many(vec![json!("data-a"), json!("data-b")])
    );
}

#[tokio::test]
async fn test_get_multiple_items_with_some_missing() {
    let cache = TagCache::new(RecordingStorage::new(), TagCacheConfig::default()).unwrap();

    cache
        .set("a", &json!("data-a"), &["some-tag"], SetOptions::default())
        .await
        .unwrap();
    cache
        .set("c", &json!("data-c"), &["some-tag"], SetOptions::default())
        .await
        .unwrap();

    assert_eq!(
        cache.get(keys(&["a", "b", "c"])).await.unwrap(),
        Lookup::Many(vec![json!("data-a"), CacheData::Null, json!("data-c")])
    );

    // One bulk read carrying every key, in call order
    assert_eq!(
        cache.storage().bulk_reads(),
        vec![vec![
            "data:a".to_string(),
            "data:b".to_string(),
            "data:c".to_string()
        ]]
    );
}

#[tokio::test]
async fn test_single_key_returns_bare_value() {
    let cache = memory_cache();

    cache
        .set("a", &json!([1, 2]), &["t"], SetOptions::default())
        .await
        .unwrap();

    let lookup = cache.get("a").await.unwrap();
    assert_eq!(lookup.into_value(), Some(json!([1, 2])));

    let missing = cache.get("never-set").await.unwrap();
    assert_eq!(missing, Lookup::One(CacheData::Null));
}

#[tokio::test]
async fn test_unparseable_value_degrades_whole_result() {
    let cache = memory_cache();

    cache
        .set("a", &json!({ "id": 1 }), &["t"], SetOptions::default())
        .await
        .unwrap();
    put_raw(cache.storage(), "b", "not json").await;

    let lookup = cache.get(keys(&["a", "b", "c"])).await.unwrap();
    assert_eq!(
        lookup,
        Lookup::Raw(vec![
            Some("{\"id\":1}".to_string()),
            Some("not json".to_string()),
            None,
        ])
    );

    // Other reads are unaffected
    assert_eq!(cache.get("a").await.unwrap(), Lookup::One(json!({ "id": 1 })));
    assert!(cache.get("b").await.unwrap().is_raw());
}

#[tokio::test]
async fn test_invalidate_item_with_tag() {
    let cache = memory_cache();

    cache
        .set("a", &json!("data"), &["tag-1"], SetOptions::default())
        .await
        .unwrap();
    assert_eq!(cache.get("a").await.unwrap(), Lookup::One(json!("data")));

    let event = cache.invalidate("tag-1").await.unwrap();
    assert_eq!(event.tags, vec!["tag-1".to_string()]);
    assert_eq!(event.keys, vec!["a".to_string()]);

    assert_eq!(cache.get("a").await.unwrap(), Lookup::One(CacheData::Null));
    assert!(cache.storage().is_empty().await);
}

#[tokio::test]
async fn test_invalidate_multiple_items_with_same_tag() {
    let cache = memory_cache();
    fan_in_setup(&cache).await;

    cache.invalidate("tag-2").await.unwrap();

    assert_eq!(cache.get("a").await.unwrap(), Lookup::One(CacheData::Null));
    assert_eq!(cache.get("b").await.unwrap(), Lookup::One(CacheData::Null));
    assert_eq!(cache.get("c").await.unwrap(), Lookup::One(json!("data")));

    // Untouched tags still list their members, including deleted ones
    let mut members = cache.storage().members("tags:tag-3").await.unwrap();
    members.sort();
    assert_eq!(members, vec!["b".to_string(), "c".to_string()]);
    assert!(!cache.storage().contains_key("tags:tag-2").await);
}

#[tokio::test]
async fn test_invalidate_multiple_tags() {
    let cache = memory_cache();
    fan_in_setup(&cache).await;

    let event = cache.invalidate(keys(&["tag-2", "tag-3"])).await.unwrap();
    assert_eq!(event.keys.len(), 4);
    assert_eq!(event.distinct_keys(), 3);

    assert_eq!(
        cache.get(keys(&["a", "b", "c"])).await.unwrap(),
        Lookup::Many(vec![CacheData::Null, CacheData::Null, CacheData::Null])
    );
    assert!(!cache.storage().contains_key("tags:tag-2").await);
    assert!(!cache.storage().contains_key("tags:tag-3").await);
    assert!(cache.storage().contains_key("tags:tag-1").await);
    assert!(cache.storage().contains_key("tags:tag-4").await);
}

#[tokio::test]
async fn test_invalidate_is_idempotent() {
    let cache = memory_cache();

    cache
        .set("a", &json!("data"), &["tag-1"], SetOptions::default())
        .await
        .unwrap();

    cache.invalidate("tag-1").await.unwrap();
    let second = cache.invalidate("tag-1").await.unwrap();

    assert!(second.keys.is_empty());
    assert_eq!(cache.get("a").await.unwrap(), Lookup::One(CacheData::Null));
}

#[tokio::test]
async fn test_invalidate_unknown_tag() {
    let storage = RecordingStorage::new();
    let cache = TagCache::new(storage.clone(), TagCacheConfig::default()).unwrap();

    let event = cache.invalidate("nobody-uses-this").await.unwrap();
    assert!(event.keys.is_empty());

    let batches = storage.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0, Mode::Pipelined);
    assert_eq!(
        batches[0].1.commands(),
        [Command::Delete {
            key: "tags:nobody-uses-this".to_string()
        }]
    );
}

#[tokio::test]
async fn test_invalidate_sends_one_pipeline() {
    let storage = RecordingStorage::new();
    let cache = TagCache::new(storage.clone(), TagCacheConfig::default()).unwrap();

    cache
        .set("a", &json!(1), &["t1", "t2"], SetOptions::default())
        .await
        .unwrap();
    cache
        .set("b", &json!(2), &["t2"], SetOptions::default())
        .await
        .unwrap();

    cache.invalidate(keys(&["t1", "t2"])).await.unwrap();

    assert_eq!(
        storage.member_reads(),
        vec!["tags:t1".to_string(), "tags:t2".to_string()]
    );

    let batches = storage.batches();
    let (mode, batch) = batches.last().unwrap();
    assert_eq!(*mode, Mode::Pipelined);
    assert!(batch
        .commands()
        .iter()
        .all(|c| matches!(c, Command::Delete { .. })));

    let mut deleted: Vec<&str> = batch.commands().iter().map(Command::key).collect();
    deleted.sort();
    assert_eq!(
        deleted,
        vec!["data:a", "data:a", "data:b", "tags:t1", "tags:t2"]
    );
}

#[tokio::test]
async fn test_set_sends_one_atomic_batch() {
    let storage = RecordingStorage::new();
    let cache = TagCache::new(storage.clone(), TagCacheConfig::default()).unwrap();

    cache
        .set("a", &json!("a"), &["t1", "t2"], SetOptions::default())
        .await
        .unwrap();

    let batches = storage.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].0, Mode::Atomic);
    assert_eq!(
        batches[0].1.commands(),
        [
            Command::AddMember {
                set: "tags:t1".to_string(),
                member: "a".to_string()
            },
            Command::AddMember {
                set: "tags:t2".to_string(),
                member: "a".to_string()
            },
            Command::Put {
                key: "data:a".to_string(),
                value: "\"a\"".to_string(),
                expiry: None
            },
        ]
    );
}

#[tokio::test]
async fn test_default_timeout_applied() {
    let storage = RecordingStorage::new();
    let config = TagCacheConfig::builder()
        .default_timeout(Duration::from_millis(500))
        .build();
    let cache = TagCache::new(storage.clone(), config).unwrap();

    cache
        .set("a", &json!("a"), &["a"], SetOptions::default())
        .await
        .unwrap();

    let batches = storage.batches();
    assert_eq!(batches.len(), 1);
    let puts: Vec<&Command> = batches[0]
        .1
        .commands()
        .iter()
        .filter(|c| matches!(c, Command::Put { .. }))
        .collect();
    assert_eq!(
        puts,
        vec![&Command::Put {
            key: "data:a".to_string(),
            value: "\"a\"".to_string(),
            expiry: Some(Duration::from_millis(500)),
        }]
    );
}

#[tokio::test]
async fn test_custom_timeout_overrides_default() {
    let storage = RecordingStorage::new();
    let config = TagCacheConfig::builder()
        .default_timeout(Duration::from_secs(86400))
        .build();
    let cache = TagCache::new(storage.clone(), config).unwrap();

    cache
        .set(
            "a",
            &json!("a"),
            &["a"],
            SetOptions::with_timeout(Duration::from_millis(500)),
        )
        .await
        .unwrap();

    let batches = storage.batches();
    let put = batches[0].1.commands().last().unwrap();
    assert!(matches!(
        put,
        Command::Put { expiry: Some(ttl), .. } if *ttl == Duration::from_millis(500)
    ));
}

#[tokio::test]
async fn test_entries_expire() {
    let config = TagCacheConfig::builder()
        .default_timeout(Duration::from_millis(50))
        .build();
    let cache = TagCache::new(MemoryStorage::new(), config).unwrap();

    cache
        .set("a", &json!("a"), &["a"], SetOptions::default())
        .await
        .unwrap();
    assert_eq!(cache.get("a").await.unwrap(), Lookup::One(json!("a")));

    tokio::time::sleep(Duration::from_millis(100)).await;

    // Expired data reads as missing while the tag still lists the key
    assert_eq!(cache.get("a").await.unwrap(), Lookup::One(CacheData::Null));
    assert_eq!(
        cache.storage().members("tags:a").await.unwrap(),
        vec!["a".to_string()]
    );

    // Invalidating a tag whose members already expired is fine
    let event = cache.invalidate("a").await.unwrap();
    assert_eq!(event.keys, vec!["a".to_string()]);
}

#[tokio::test]
async fn test_no_timeout_means_no_expiry() {
    let cache = memory_cache();

    cache
        .set("a", &json!("a"), &["a"], SetOptions::default())
        .await
        .unwrap();

    assert!(cache.storage().contains_key("data:a").await);
    assert_eq!(cache.storage().time_to_live("data:a").await, None);
}

#[tokio::test]
async fn test_set_overwrites_data_and_accumulates_tags() {
    let cache = memory_cache();

    cache
        .set("a", &json!("first"), &["t1"], SetOptions::default())
        .await
        .unwrap();
    cache
        .set("a", &json!("second"), &["t1", "t2"], SetOptions::default())
        .await
        .unwrap();

    assert_eq!(cache.get("a").await.unwrap(), Lookup::One(json!("second")));
    assert_eq!(
        cache.storage().members("tags:t1").await.unwrap(),
        vec!["a".to_string()]
    );

    cache.invalidate("t2").await.unwrap();
    assert_eq!(cache.get("a").await.unwrap(), Lookup::One(CacheData::Null));
}

#[tokio::test]
async fn test_rejected_set_has_no_effect() {
    let cache = memory_cache();

    // A plain value where a tag set is expected makes the batch fail
    let mut poison = tag_cache::Batch::new();
    poison.put("tags:broken", "x", None);
    cache.storage().execute_atomic(poison).await.unwrap();

    let result = cache
        .set("a", &json!("data"), &["fine", "broken"], SetOptions::default())
        .await;

    assert!(matches!(result, Err(TagCacheError::BatchRejectedError(_))));
    assert!(!cache.storage().contains_key("tags:fine").await);
    assert!(!cache.storage().contains_key("data:a").await);
    assert_eq!(cache.get("a").await.unwrap(), Lookup::One(CacheData::Null));
}

#[tokio::test]
async fn test_connection_errors_propagate() {
    let storage = MemoryStorage::new();
    let cache = TagCache::new(storage.clone(), TagCacheConfig::default()).unwrap();

    cache
        .set("a", &json!("data"), &["t"], SetOptions::default())
        .await
        .unwrap();
    storage.disconnect();

    let get = cache.get("a").await;
    assert!(matches!(get, Err(TagCacheError::ConnectionError(_))));

    let set = cache
        .set("b", &json!("data"), &["t"], SetOptions::default())
        .await;
    assert!(set.unwrap_err().is_connection());

    let invalidate = cache.invalidate("t").await;
    assert!(matches!(invalidate, Err(TagCacheError::ConnectionError(_))));

    // Nothing was deleted by the failed invalidation
    storage.reconnect();
    assert_eq!(cache.get("a").await.unwrap(), Lookup::One(json!("data")));
}

#[tokio::test]
async fn test_resolve_failure_aborts_invalidation() {
    let cache = memory_cache();

    cache
        .set("a", &json!("data"), &["good"], SetOptions::default())
        .await
        .unwrap();
    let mut wrong = tag_cache::Batch::new();
    wrong.put("tags:bad", "not a set", None);
    cache.storage().execute_atomic(wrong).await.unwrap();

    let result = cache.invalidate(keys(&["good", "bad"])).await;
    assert!(matches!(result, Err(TagCacheError::BackendError(_))));

    assert_eq!(cache.get("a").await.unwrap(), Lookup::One(json!("data")));
    assert!(cache.storage().contains_key("tags:good").await);
}

#[tokio::test]
async fn test_empty_key_list_is_rejected() {
    let result = NonEmpty::try_from_iter(Vec::<String>::new(), "key");
    assert!(matches!(result, Err(TagCacheError::EmptyArgumentError("key"))));
}

#[tokio::test]
async fn test_shared_across_tasks() {
    let cache = Arc::new(memory_cache());

    let mut handles = Vec::new();
    for i in 0..8 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            let key = format!("key-{}", i);
            cache
                .set(&key, &json!(i), &["shared"], SetOptions::default())
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let event = cache.invalidate("shared").await.unwrap();
    assert_eq!(event.distinct_keys(), 8);
    assert!(cache.storage().is_empty().await);
}

#[tokio::test]
async fn test_caches_share_one_backend() {
    let storage = Arc::new(MemoryStorage::new());
    let writer = TagCache::new(Arc::clone(&storage), TagCacheConfig::default()).unwrap();
    let reader = TagCache::new(Arc::clone(&storage), TagCacheConfig::default()).unwrap();

    writer
        .set("a", &json!({ "id": "asdf-123" }), &["t"], SetOptions::default())
        .await
        .unwrap();
    assert_eq!(
        reader.get("a").await.unwrap(),
        Lookup::One(json!({ "id": "asdf-123" }))
    );

    reader.invalidate("t").await.unwrap();
    assert_eq!(writer.get("a").await.unwrap(), Lookup::One(CacheData::Null));
}
