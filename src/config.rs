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

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    bus::EventBus,
    cache::Cache,
    engine::{EvictionListener, NEVER_EXPIRE},
    error::{Error, Result},
    memory::MemoryCache,
    remote::{CacheCodec, RemoteCache, RemoteStore},
    Value,
};

/// Eviction ordering strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// Least-recently-created: eviction picks the oldest entry by insertion
    /// order; reads do not reorder.
    #[default]
    Lrc,
    /// Least-recently-used: a successful read promotes the entry, eviction
    /// picks the least recently accessed one.
    Lru,
}

/// Weight function deriving a byte size from a value. Values without a
/// configured weighter weigh nothing and are exempt from byte-based limits.
pub type Weighter<V> = Arc<dyn Fn(&V) -> usize + Send + Sync>;

pub(crate) const DEFAULT_MAX_KEYS: i64 = 1000;
pub(crate) const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Builder for a [`Cache`].
///
/// All options are optional; count and size options reject negative values
/// at [`build`](CacheBuilder::build) time with a configuration error.
///
/// ```ignore
/// let cache: Cache<String> = Cache::builder()
///     .with_max_keys(500)
///     .with_ttl(Duration::from_secs(60))
///     .with_strategy(Strategy::Lru)
///     .build()
///     .await?;
/// ```
pub struct CacheBuilder<V>
where
    V: Value,
{
    max_keys: i64,
    max_key_size: i64,
    max_value_size: i64,
    max_cache_size: i64,
    ttl: Duration,
    purge_every: Duration,
    strategy: Strategy,
    pub(crate) weighter: Option<Weighter<V>>,
    pub(crate) eviction_listener: Option<EvictionListener<V>>,
    pub(crate) event_bus: Option<Arc<dyn EventBus>>,
}

impl<V> Default for CacheBuilder<V>
where
    V: Value,
{
    fn default() -> Self {
        Self {
            max_keys: DEFAULT_MAX_KEYS,
            max_key_size: 0,
            max_value_size: 0,
            max_cache_size: 0,
            ttl: DEFAULT_TTL,
            purge_every: Duration::ZERO,
            strategy: Strategy::default(),
            weighter: None,
            eviction_listener: None,
            event_bus: None,
        }
    }
}

impl<V> CacheBuilder<V>
where
    V: Value,
{
    /// Create a builder with the defaults: 1000 keys, 5 minute TTL, LRC.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap on the entry count. `0` means unlimited. Defaults to 1000.
    pub fn with_max_keys(mut self, max_keys: i64) -> Self {
        self.max_keys = max_keys;
        self
    }

    /// Largest key byte length admitted, strictly-greater keys are returned
    /// uncached. `0` means unlimited.
    pub fn with_max_key_size(mut self, max_key_size: i64) -> Self {
        self.max_key_size = max_key_size;
        self
    }

    /// Largest value weight admitted. A value weighing `max_value_size` *or
    /// more* is returned uncached (note the asymmetry with the key gate,
    /// which rejects strictly-greater only). `0` means unlimited. Requires a
    /// [`weighter`](CacheBuilder::with_weighter) to have any effect.
    pub fn with_max_value_size(mut self, max_value_size: i64) -> Self {
        self.max_value_size = max_value_size;
        self
    }

    /// Cap on the aggregate weight of cached values; exceeding it evicts
    /// oldest entries until the cap holds. `0` means unlimited. Requires a
    /// [`weighter`](CacheBuilder::with_weighter) to have any effect.
    pub fn with_max_cache_size(mut self, max_cache_size: i64) -> Self {
        self.max_cache_size = max_cache_size;
        self
    }

    /// Per-entry lifetime. `Duration::ZERO` means entries never expire.
    /// Defaults to 5 minutes.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sweep cadence for expired entries. Defaults to half the TTL when a
    /// finite TTL is set.
    pub fn with_purge_every(mut self, purge_every: Duration) -> Self {
        self.purge_every = purge_every;
        self
    }

    /// Eviction ordering strategy. Defaults to [`Strategy::Lrc`].
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Weight function used for byte-based limits and the `size` statistic.
    pub fn with_weighter(mut self, weighter: impl Fn(&V) -> usize + Send + Sync + 'static) -> Self {
        self.weighter = Some(Arc::new(weighter));
        self
    }

    /// Callback invoked for every removal of a live entry: TTL sweep, cap
    /// eviction, explicit removal, and purge. Runs under the engine lock, so
    /// it must not call back into the cache.
    pub fn with_eviction_listener(mut self, listener: impl Fn(&str, &V) + Send + Sync + 'static) -> Self {
        self.eviction_listener = Some(Arc::new(listener));
        self
    }

    /// Event bus for cross-node eviction fan-out. Defaults to the no-op bus.
    pub fn with_event_bus(mut self, event_bus: Arc<dyn EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Build an in-memory cache. Validates the options, subscribes to the
    /// event bus if one is set, and spawns the sweeper task; must run within
    /// a tokio runtime.
    pub async fn build(self) -> Result<Cache<V>> {
        Ok(Cache::Memory(MemoryCache::open(self).await?))
    }

    /// Build a cache backed by an out-of-process store. Key count and sweep
    /// cadence are the store's concern; the TTL and both size gates still
    /// apply here.
    pub async fn build_remote(self, store: Arc<dyn RemoteStore>) -> Result<Cache<V>>
    where
        V: CacheCodec,
    {
        let opts = self.validate()?;
        Ok(Cache::Remote(RemoteCache::open(store, opts)))
    }

    pub(crate) fn validate(&self) -> Result<ValidatedOptions> {
        if self.max_keys < 0 {
            return Err(Error::config("negative max keys"));
        }
        if self.max_key_size < 0 {
            return Err(Error::config("negative max key size"));
        }
        if self.max_value_size < 0 {
            return Err(Error::config("negative max value size"));
        }
        if self.max_cache_size < 0 {
            return Err(Error::config("negative max cache size"));
        }

        let ttl = if self.ttl.is_zero() { NEVER_EXPIRE } else { self.ttl };
        let purge_every = if !self.purge_every.is_zero() {
            self.purge_every
        } else if ttl < NEVER_EXPIRE {
            // the sweep must outpace the TTL for expired entries to become
            // observably absent without a read
            ttl / 2
        } else {
            Duration::ZERO
        };

        Ok(ValidatedOptions {
            max_keys: self.max_keys as usize,
            max_key_size: self.max_key_size as usize,
            max_value_size: self.max_value_size as usize,
            max_cache_size: self.max_cache_size,
            ttl,
            purge_every,
            strategy: self.strategy,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct ValidatedOptions {
    pub max_keys: usize,
    pub max_key_size: usize,
    pub max_value_size: usize,
    pub max_cache_size: i64,
    pub ttl: Duration,
    pub purge_every: Duration,
    pub strategy: Strategy,
}
