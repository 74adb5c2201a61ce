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

use std::future::Future;

use crate::{
    config::CacheBuilder,
    error::Result,
    memory::MemoryCache,
    nop::NopCache,
    remote::RemoteCache,
    stats::CacheStat,
    Value,
};

/// A loading cache over one of the supported backends.
///
/// `get` either returns the cached value or runs the caller-supplied loader
/// and admits its result:
///
/// ```ignore
/// let cache: Cache<String> = Cache::builder().with_max_keys(100).build().await?;
/// let value = cache
///     .get("answer", || async { Ok(compute_answer().await?) })
///     .await?;
/// ```
pub enum Cache<V>
where
    V: Value,
{
    /// In-process cache with bounded retention.
    Memory(MemoryCache<V>),
    /// Pass-through without retention.
    Nop(NopCache<V>),
    /// Cache engine living in another process.
    Remote(RemoteCache<V>),
}

impl<V> std::fmt::Debug for Cache<V>
where
    V: Value,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Memory(_) => f.write_str("Cache::Memory(..)"),
            Self::Nop(_) => f.write_str("Cache::Nop(..)"),
            Self::Remote(_) => f.write_str("Cache::Remote(..)"),
        }
    }
}

impl<V> Clone for Cache<V>
where
    V: Value,
{
    fn clone(&self) -> Self {
        match self {
            Self::Memory(cache) => Self::Memory(cache.clone()),
            Self::Nop(cache) => Self::Nop(cache.clone()),
            Self::Remote(cache) => Self::Remote(cache.clone()),
        }
    }
}

impl<V> Cache<V>
where
    V: Value,
{
    /// Start building an in-memory cache.
    pub fn builder() -> CacheBuilder<V> {
        CacheBuilder::new()
    }

    /// Create a do-nothing cache.
    pub fn nop() -> Self {
        Self::Nop(NopCache::new())
    }

    /// Get the cached value for `key`, or run `loader` and cache its result.
    ///
    /// Loader errors are propagated verbatim and never cached. The loader
    /// runs without any cache lock held; concurrent misses on one key may
    /// each run their loader, and the last writer's value stays.
    pub async fn get<F, Fut>(&self, key: &str, loader: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        match self {
            Cache::Memory(cache) => cache.get(key, loader).await,
            Cache::Nop(cache) => cache.get(key, loader).await,
            Cache::Remote(cache) => cache.get(key, loader).await,
        }
    }

    /// Get the value for `key` without updating its recency or loading.
    pub async fn peek(&self, key: &str) -> Option<V> {
        match self {
            Cache::Memory(cache) => cache.peek(key),
            Cache::Nop(cache) => cache.peek(key),
            Cache::Remote(cache) => cache.peek(key).await,
        }
    }

    /// Remove one key.
    pub async fn remove(&self, key: &str) {
        match self {
            Cache::Memory(cache) => cache.remove(key),
            Cache::Nop(cache) => cache.remove(key),
            Cache::Remote(cache) => cache.remove(key).await,
        }
    }

    /// Remove every key satisfying the predicate.
    pub async fn invalidate_if(&self, pred: impl Fn(&str) -> bool + Send) {
        match self {
            Cache::Memory(cache) => cache.invalidate_if(pred),
            Cache::Nop(cache) => cache.invalidate_if(pred),
            Cache::Remote(cache) => cache.invalidate_if(pred).await,
        }
    }

    /// Drop everything.
    pub async fn purge(&self) {
        match self {
            Cache::Memory(cache) => cache.purge(),
            Cache::Nop(cache) => cache.purge(),
            Cache::Remote(cache) => cache.purge().await,
        }
    }

    /// Snapshot of current keys. For the memory backend the order is oldest
    /// first; remote stores provide whatever order they have.
    pub async fn keys(&self) -> Vec<String> {
        match self {
            Cache::Memory(cache) => cache.keys(),
            Cache::Nop(cache) => cache.keys(),
            Cache::Remote(cache) => cache.keys().await,
        }
    }

    /// Snapshot of the cache statistics.
    pub async fn stat(&self) -> CacheStat {
        match self {
            Cache::Memory(cache) => cache.stat(),
            Cache::Nop(cache) => cache.stat(),
            Cache::Remote(cache) => cache.stat().await,
        }
    }

    /// Stop background work. Idempotent, never blocks on in-flight
    /// operations.
    pub fn close(&self) {
        match self {
            Cache::Memory(cache) => cache.close(),
            Cache::Nop(cache) => cache.close(),
            Cache::Remote(cache) => cache.close(),
        }
    }
}
