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

//! Adapter for a cache engine living in another process.
//!
//! The engine itself (its eviction, its sweeping, its key budget) is the
//! remote store's business; this module only defines the interface the core
//! consumes and layers the loading-cache semantics on top of it.

use std::{
    future::Future,
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    config::ValidatedOptions,
    error::{Error, Result},
    stats::{CacheStat, Counters},
    Value,
};

/// The byte-level store interface consumed by [`RemoteCache`]. Implemented
/// by transport clients (redis, memcached, …) outside this crate.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Fetch the bytes stored under `key`, if any.
    async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Store `value` under `key` with the given lifetime.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> anyhow::Result<()>;

    /// Remove one key.
    async fn remove(&self, key: &str) -> anyhow::Result<()>;

    /// Remove everything.
    async fn clear(&self) -> anyhow::Result<()>;

    /// Enumerate current keys.
    async fn keys(&self) -> anyhow::Result<Vec<String>>;
}

/// Byte codec for values crossing the process boundary.
pub trait CacheCodec: Sized {
    /// Encode the value.
    fn encode(&self) -> anyhow::Result<Vec<u8>>;
    /// Decode a value.
    fn decode(bytes: &[u8]) -> anyhow::Result<Self>;
}

impl CacheCodec for Vec<u8> {
    fn encode(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self.clone())
    }

    fn decode(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(bytes.to_vec())
    }
}

impl CacheCodec for String {
    fn encode(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self.as_bytes().to_vec())
    }

    fn decode(bytes: &[u8]) -> anyhow::Result<Self> {
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

type EncodeFn<V> = Box<dyn Fn(&V) -> anyhow::Result<Vec<u8>> + Send + Sync>;
type DecodeFn<V> = Box<dyn Fn(&[u8]) -> anyhow::Result<V> + Send + Sync>;

/// A loading cache backed by an out-of-process store.
///
/// Store and codec failures on the read path count as loader errors in the
/// statistics and surface to the caller; failures while writing a freshly
/// loaded value are logged and the value is returned uncached.
pub struct RemoteCache<V>
where
    V: Value,
{
    inner: Arc<RemoteInner<V>>,
}

impl<V> Clone for RemoteCache<V>
where
    V: Value,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct RemoteInner<V> {
    store: Arc<dyn RemoteStore>,
    counters: Counters,
    ttl: Duration,
    max_key_size: usize,
    max_value_size: usize,
    encode: EncodeFn<V>,
    decode: DecodeFn<V>,
}

impl<V> RemoteCache<V>
where
    V: Value,
{
    pub(crate) fn open(store: Arc<dyn RemoteStore>, opts: ValidatedOptions) -> Self
    where
        V: CacheCodec,
    {
        Self {
            inner: Arc::new(RemoteInner {
                store,
                counters: Counters::default(),
                ttl: opts.ttl,
                max_key_size: opts.max_key_size,
                max_value_size: opts.max_value_size,
                encode: Box::new(|value: &V| value.encode()),
                decode: Box::new(|bytes: &[u8]| V::decode(bytes)),
            }),
        }
    }

    /// Get the stored value for `key`, or run `loader` and store its result.
    pub async fn get<F, Fut>(&self, key: &str, loader: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        match self.inner.store.get(key).await {
            Ok(Some(bytes)) => match (self.inner.decode)(&bytes) {
                Ok(value) => {
                    self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                    return Ok(value);
                }
                Err(err) => {
                    self.inner.counters.errors.fetch_add(1, Ordering::Relaxed);
                    return Err(Error::Remote(err));
                }
            },
            Ok(None) => {}
            Err(err) => {
                self.inner.counters.errors.fetch_add(1, Ordering::Relaxed);
                return Err(Error::Remote(err));
            }
        }

        let value = match loader().await {
            Ok(value) => value,
            Err(err) => {
                self.inner.counters.errors.fetch_add(1, Ordering::Relaxed);
                return Err(Error::Loader(err));
            }
        };
        self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);

        if self.inner.max_key_size > 0 && key.len() > self.inner.max_key_size {
            return Ok(value);
        }
        match (self.inner.encode)(&value) {
            Ok(bytes) => {
                if self.inner.max_value_size > 0 && bytes.len() >= self.inner.max_value_size {
                    return Ok(value);
                }
                if let Err(err) = self.inner.store.set(key, &bytes, self.inner.ttl).await {
                    tracing::warn!(key, error = %err, "failed to store loaded value");
                }
            }
            Err(err) => {
                tracing::warn!(key, error = %err, "failed to encode loaded value");
            }
        }

        Ok(value)
    }

    /// Get the stored value without loading. A store or codec failure reads
    /// as a miss.
    pub async fn peek(&self, key: &str) -> Option<V> {
        let bytes = self.inner.store.get(key).await.ok().flatten()?;
        (self.inner.decode)(&bytes).ok()
    }

    /// Remove one key. Store failures are logged.
    pub async fn remove(&self, key: &str) {
        if let Err(err) = self.inner.store.remove(key).await {
            tracing::warn!(key, error = %err, "failed to remove key");
        }
    }

    /// Remove every key satisfying the predicate.
    pub async fn invalidate_if(&self, pred: impl Fn(&str) -> bool + Send) {
        let keys = match self.inner.store.keys().await {
            Ok(keys) => keys,
            Err(err) => {
                tracing::warn!(error = %err, "failed to enumerate keys");
                return;
            }
        };
        for key in keys.iter().filter(|key| pred(key)) {
            self.remove(key).await;
        }
    }

    /// Drop everything in the store.
    pub async fn purge(&self) {
        if let Err(err) = self.inner.store.clear().await {
            tracing::warn!(error = %err, "failed to clear store");
        }
    }

    /// Snapshot of current keys. Ordering is whatever the store provides.
    pub async fn keys(&self) -> Vec<String> {
        match self.inner.store.keys().await {
            Ok(keys) => keys,
            Err(err) => {
                tracing::warn!(error = %err, "failed to enumerate keys");
                Vec::new()
            }
        }
    }

    /// Snapshot of the cache statistics. The key count is fetched from the
    /// store; the aggregate size is the store's concern and reads as zero.
    pub async fn stat(&self) -> CacheStat {
        self.inner.counters.snapshot(self.keys().await.len(), 0)
    }

    /// Nothing to stop locally; the store client is the caller's to close.
    pub fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use hashbrown::HashMap;
    use parking_lot::Mutex;

    use super::*;
    use crate::config::CacheBuilder;

    #[derive(Default)]
    struct MapStore {
        data: Mutex<HashMap<String, Vec<u8>>>,
        fail_get: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl RemoteStore for MapStore {
        async fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
            if self.fail_get.load(Ordering::SeqCst) {
                anyhow::bail!("store down");
            }
            Ok(self.data.lock().get(key).cloned())
        }

        async fn set(&self, key: &str, value: &[u8], _ttl: Duration) -> anyhow::Result<()> {
            self.data.lock().insert(key.to_string(), value.to_vec());
            Ok(())
        }

        async fn remove(&self, key: &str) -> anyhow::Result<()> {
            self.data.lock().remove(key);
            Ok(())
        }

        async fn clear(&self) -> anyhow::Result<()> {
            self.data.lock().clear();
            Ok(())
        }

        async fn keys(&self) -> anyhow::Result<Vec<String>> {
            Ok(self.data.lock().keys().cloned().collect())
        }
    }

    fn remote(store: Arc<MapStore>) -> RemoteCache<String> {
        RemoteCache::open(store, CacheBuilder::<String>::new().validate().unwrap())
    }

    #[tokio::test]
    async fn test_remote_get_and_hit() {
        let cache = remote(Arc::new(MapStore::default()));
        let cold_calls = AtomicU32::new(0);

        let res = cache
            .get("key", || async {
                cold_calls.fetch_add(1, Ordering::SeqCst);
                Ok("result".to_string())
            })
            .await
            .unwrap();
        assert_eq!(res, "result");

        let res = cache
            .get("key", || async {
                cold_calls.fetch_add(1, Ordering::SeqCst);
                Ok("result2".to_string())
            })
            .await
            .unwrap();
        assert_eq!(res, "result", "served from the store");
        assert_eq!(cold_calls.load(Ordering::SeqCst), 1);

        let stat = cache.stat().await;
        assert_eq!((stat.hits, stat.misses, stat.keys), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_remote_store_failure_counts_as_error() {
        let store = Arc::new(MapStore::default());
        let cache = remote(store.clone());
        store.fail_get.store(true, Ordering::SeqCst);

        let err = cache
            .get("key", || async { Ok("result".to_string()) })
            .await
            .expect_err("store failure must surface");
        assert!(matches!(err, Error::Remote(_)));
        assert_eq!(cache.stat().await.errors, 1);
    }

    #[tokio::test]
    async fn test_remote_purge_and_invalidate() {
        let cache = remote(Arc::new(MapStore::default()));
        for i in 0..4 {
            cache
                .get(&format!("key-{i}"), || async { Ok("v".to_string()) })
                .await
                .unwrap();
        }

        cache.invalidate_if(|key| key.ends_with('1')).await;
        assert_eq!(cache.keys().await.len(), 3);

        cache.purge().await;
        assert!(cache.keys().await.is_empty());
    }
}
