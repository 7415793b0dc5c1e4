//! Property-based tests for the cache manager
//!
//! Uses proptest over the in-process backend to check laws that must hold
//! for any key or payload: misses, round trips and pattern deletes.

use proptest::prelude::*;
use recipe_cache::prelude::*;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

// == Helpers ==
fn block_on<F: Future<Output = Result<(), TestCaseError>>>(
    future: F,
) -> Result<(), TestCaseError> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| TestCaseError::fail(e.to_string()))?
        .block_on(future)
}

async fn connected() -> (CacheManager, Arc<MemoryBackend>) {
    let backend = Arc::new(MemoryBackend::new());
    let manager =
        CacheManager::with_backend(CacheConfig::default(), Environment::Test, backend.clone());
    manager.connect().await.expect("memory backend connects");
    (manager, backend)
}

// == Strategies ==
/// Keys in any namespace, including the validated ones
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z0-9:/_-]{1,40}"
}

/// Short lowercase field names; never collide with the pollution keys
fn field_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}"
}

/// Arbitrary JSON without floats, nested a few levels deep
fn json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        any::<u64>().prop_map(Value::from),
        "[ -~]{0,24}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(field_strategy(), inner, 0..6)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

fn object_strategy() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map(field_strategy(), json_strategy(), 0..8)
        .prop_map(|map| map.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Every read of a never-written key misses, and counts exactly one miss
    #[test]
    fn unwritten_keys_miss_once_per_read(keys in prop::collection::vec(key_strategy(), 1..20)) {
        block_on(async {
            let (cache, _) = connected().await;

            for (reads, key) in keys.iter().enumerate() {
                let value: Option<Value> = cache.get(key).await.unwrap();
                prop_assert_eq!(value, None);
                prop_assert_eq!(cache.metrics().misses, reads as u64 + 1);
            }
            prop_assert_eq!(cache.metrics().hits, 0);
            Ok(())
        })?;
    }

    // Any object written under an unvalidated namespace reads back deep-equal
    #[test]
    fn api_objects_round_trip(path in "[a-z0-9/]{1,24}", body in object_strategy()) {
        block_on(async {
            let (cache, _) = connected().await;
            let key = keys::api(&path);
            let value = Value::Object(body);

            prop_assert!(cache.set(&key, &value, 300).await.unwrap());
            let cached: Option<Value> = cache.get(&key).await.unwrap();
            prop_assert_eq!(cached, Some(value));
            prop_assert_eq!(cache.metrics().hits, 1);
            Ok(())
        })?;
    }

    // Valid recipe details with arbitrary extra fields read back deep-equal
    #[test]
    fn recipe_details_round_trip(
        id in any::<u32>(),
        title in "[ -~]{1,40}",
        extra in object_strategy(),
    ) {
        block_on(async {
            let (cache, _) = connected().await;
            let key = keys::recipe_detail(id);
            let mut body = extra;
            body.insert("id".to_string(), Value::from(id));
            body.insert("title".to_string(), Value::String(title));
            let value = Value::Object(body);

            prop_assert!(cache.set_for(TtlPolicy::RecipeDetail, &key, &value).await.unwrap());
            let cached: Option<Value> = cache.get(&key).await.unwrap();
            prop_assert_eq!(cached, Some(value));
            Ok(())
        })?;
    }

    // Pattern deletes remove exactly the matching keys and nothing else
    #[test]
    fn delete_by_pattern_removes_exactly_matches(
        recipe_ids in prop::collection::btree_set(any::<u32>(), 0..40),
        other_ids in prop::collection::btree_set(any::<u32>(), 0..40),
    ) {
        block_on(async {
            let (cache, backend) = connected().await;
            for id in &recipe_ids {
                cache.set(&keys::recipe_detail(id), &serde_json::json!({"id": id, "title": "t"}), 60)
                    .await
                    .unwrap();
            }
            for id in &other_ids {
                cache.set(&keys::recipe_list(id), &serde_json::json!({"recipes": [], "count": 0}), 60)
                    .await
                    .unwrap();
            }
            let others: BTreeSet<String> = cache.scan("recipes:list:*").await.into_iter().collect();

            let deleted = cache.delete_by_pattern("recipe:detail:*").await;
            prop_assert_eq!(deleted, recipe_ids.len() as u64);
            prop_assert!(cache.scan("recipe:detail:*").await.is_empty());

            let remaining: BTreeSet<String> = cache.scan("*").await.into_iter().collect();
            prop_assert_eq!(remaining, others);
            prop_assert_eq!(backend.len(), cache.scan("recipes:list:*").await.len());
            Ok(())
        })?;
    }
}
