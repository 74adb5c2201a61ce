// Copyright 2025 larder Project Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Loading semantics shared by both eviction strategies.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc,
};

use futures::future::join_all;
use larder::{Cache, Strategy};
use rand::{rngs::SmallRng, Rng, SeedableRng};

async fn caches() -> Vec<(&'static str, Cache<String>)> {
    vec![
        (
            "lrc",
            Cache::builder().with_strategy(Strategy::Lrc).build().await.unwrap(),
        ),
        (
            "lru",
            Cache::builder().with_strategy(Strategy::Lru).build().await.unwrap(),
        ),
    ]
}

#[tokio::test]
async fn test_get_caches_values_not_errors() {
    for (name, cache) in caches().await {
        let cold_calls = AtomicU32::new(0);

        let res = cache
            .get("key", || async {
                cold_calls.fetch_add(1, Ordering::SeqCst);
                Ok("result".to_string())
            })
            .await
            .unwrap();
        assert_eq!(res, "result", "{name}");

        let res = cache
            .get("key", || async {
                cold_calls.fetch_add(1, Ordering::SeqCst);
                Ok("result2".to_string())
            })
            .await
            .unwrap();
        assert_eq!(res, "result", "{name}: cache hit");
        assert_eq!(cold_calls.load(Ordering::SeqCst), 1, "{name}");

        for _ in 0..2 {
            cache
                .get("key-2", || async {
                    cold_calls.fetch_add(1, Ordering::SeqCst);
                    Err(anyhow::anyhow!("some error"))
                })
                .await
                .expect_err("loader errors must surface");
        }
        assert_eq!(cold_calls.load(Ordering::SeqCst), 3, "{name}: errors are not cached");

        let stat = cache.stat().await;
        assert_eq!((stat.hits, stat.misses, stat.errors), (1, 1, 2), "{name}");
        assert_eq!(stat.hits + stat.misses + stat.errors, 4, "{name}: every get counted");
        cache.close();
    }
}

#[tokio::test]
async fn test_max_keys_evicts_exactly_one_oldest() {
    for (name, cache) in [
        (
            "lrc",
            Cache::builder()
                .with_strategy(Strategy::Lrc)
                .with_max_keys(5)
                .build()
                .await
                .unwrap(),
        ),
        (
            "lru",
            Cache::builder()
                .with_strategy(Strategy::Lru)
                .with_max_keys(5)
                .build()
                .await
                .unwrap(),
        ),
    ] {
        for i in 0..5 {
            let res = cache
                .get(&format!("key-{i}"), || async { Ok(format!("result-{i}")) })
                .await
                .unwrap();
            assert_eq!(res, format!("result-{i}"), "{name}");
        }

        let res = cache
            .get("key-3", || async { Ok("result-blah".to_string()) })
            .await
            .unwrap();
        assert_eq!(res, "result-3", "{name}: should be cached");

        let res = cache
            .get("key-X", || async { Ok("result-X".to_string()) })
            .await
            .unwrap();
        assert_eq!(res, "result-X", "{name}");

        let keys = cache.keys().await;
        assert_eq!(keys.len(), 5, "{name}: exactly one eviction");
        assert!(!keys.contains(&"key-0".to_string()), "{name}: oldest is gone");
        cache.close();
    }
}

#[tokio::test]
async fn test_max_value_size_admission() {
    let cache: Cache<String> = Cache::builder()
        .with_max_value_size(10)
        .with_weighter(|value: &String| value.len())
        .build()
        .await
        .unwrap();

    // 8 bytes: admitted, the second read is served from the cache
    let res = cache.get("key-Z", || async { Ok("result-Z".to_string()) }).await.unwrap();
    assert_eq!(res, "result-Z");
    let res = cache
        .get("key-Z", || async { Ok("result-Zzzz".to_string()) })
        .await
        .unwrap();
    assert_eq!(res, "result-Z", "got cached value");

    // 10 bytes: returned but not cached, re-reads run the loader again
    for key in ["key-big1", "key-big2"] {
        let res = cache.get(key, || async { Ok("result-big".to_string()) }).await.unwrap();
        assert_eq!(res, "result-big");
        let res = cache.get(key, || async { Ok("result-upd".to_string()) }).await.unwrap();
        assert_eq!(res, "result-upd", "got non-cached value");
    }

    assert_eq!(cache.keys().await, vec!["key-Z"]);
    cache.close();
}

#[tokio::test]
async fn test_max_cache_size_evicts_oldest() {
    let cache: Cache<String> = Cache::builder()
        .with_max_cache_size(20)
        .with_weighter(|value: &String| value.len())
        .build()
        .await
        .unwrap();

    for key in ["key-1", "key-2", "key-3"] {
        cache.get(key, || async { Ok("12345678".to_string()) }).await.unwrap();
    }

    let stat = cache.stat().await;
    assert!(stat.size <= 20, "cap holds, got {}", stat.size);
    assert_eq!(stat.size, 16);
    assert_eq!(cache.keys().await, vec!["key-2", "key-3"], "first key evicted");
    cache.close();
}

#[tokio::test]
async fn test_parallel_gets_hit_cached_entry() {
    let cache: Cache<String> = Cache::builder().build().await.unwrap();
    let cold_calls = Arc::new(AtomicU32::new(0));

    cache.get("key", || async { Ok("value".to_string()) }).await.unwrap();

    let handles = (0..1000)
        .map(|i| {
            let cache = cache.clone();
            let cold_calls = cold_calls.clone();
            tokio::spawn(async move {
                let res = cache
                    .get("key", || async move {
                        cold_calls.fetch_add(1, Ordering::SeqCst);
                        Ok(format!("result-{i}"))
                    })
                    .await
                    .unwrap();
                assert_eq!(res, "value");
            })
        })
        .collect::<Vec<_>>();
    join_all(handles).await;

    assert_eq!(cold_calls.load(Ordering::SeqCst), 0, "loader never runs again");
    assert_eq!(cache.stat().await.hits, 1000);
    cache.close();
}

#[tokio::test]
async fn test_fuzzy_bounded() {
    let cache: Cache<u64> = Cache::builder()
        .with_max_keys(64)
        .with_strategy(Strategy::Lru)
        .build()
        .await
        .unwrap();

    let mut rng = SmallRng::seed_from_u64(42);
    for _ in 0..10_000 {
        let key = rng.gen_range(0..256u64);
        match rng.gen_range(0..3) {
            0 | 1 => {
                let value = cache.get(&key.to_string(), || async move { Ok(key) }).await.unwrap();
                assert_eq!(value, key);
            }
            _ => cache.remove(&key.to_string()).await,
        }
        assert!(cache.keys().await.len() <= 64);
    }

    let stat = cache.stat().await;
    assert!(stat.keys <= 64);
    assert!(stat.hits + stat.misses > 0);
    cache.close();
}
