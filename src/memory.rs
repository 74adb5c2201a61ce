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

//! The in-memory loading cache.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use tokio::sync::mpsc;

use crate::{
    bus::EventBus,
    config::{CacheBuilder, Weighter},
    engine::{Engine, EngineConfig, EvictionListener},
    error::{Error, Result},
    stats::{CacheStat, Counters},
    Value,
};

/// A loading cache held in process memory.
///
/// `get` resolves a hit or runs the caller-supplied loader and admits the
/// result, subject to the configured key/value/total size gates. Cheap to
/// clone; clones share the same engine and statistics.
pub struct MemoryCache<V>
where
    V: Value,
{
    inner: Arc<MemoryInner<V>>,
}

impl<V> Clone for MemoryCache<V>
where
    V: Value,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct MemoryInner<V>
where
    V: Value,
{
    engine: Arc<Engine<V>>,
    counters: Counters,
    current_size: Arc<AtomicI64>,

    max_key_size: usize,
    max_value_size: usize,
    max_cache_size: i64,
    weighter: Option<Weighter<V>>,

    instance_id: String,
}

impl<V> MemoryCache<V>
where
    V: Value,
{
    pub(crate) async fn open(builder: CacheBuilder<V>) -> Result<Self> {
        let opts = builder.validate()?;

        let current_size = Arc::new(AtomicI64::new(0));
        let instance_id = uuid::Uuid::new_v4().to_string();

        let publisher = builder
            .event_bus
            .as_ref()
            .map(|_| mpsc::unbounded_channel::<String>());
        let (publish_tx, publish_rx) = match publisher {
            Some((tx, rx)) => (Some(tx), Some(rx)),
            None => (None, None),
        };

        // The engine fires this for every removal of a live entry, with its
        // lock held: bookkeeping only, nothing that re-enters the cache.
        let listener: EvictionListener<V> = {
            let user_listener = builder.eviction_listener.clone();
            let weighter = builder.weighter.clone();
            let current_size = current_size.clone();
            let publish_tx = publish_tx.clone();
            Arc::new(move |key, value| {
                if let Some(listener) = &user_listener {
                    listener(key, value);
                }
                if let Some(weighter) = &weighter {
                    current_size.fetch_sub(weighter(value) as i64, Ordering::Relaxed);
                }
                if let Some(tx) = &publish_tx {
                    let _ = tx.send(key.to_string());
                }
            })
        };

        let engine = Engine::new(EngineConfig {
            ttl: opts.ttl,
            purge_every: opts.purge_every,
            max_keys: opts.max_keys,
            strategy: opts.strategy,
            listener: Some(listener),
        });

        if let Some(bus) = &builder.event_bus {
            Self::connect_bus(bus, &engine, &instance_id, publish_rx.expect("publisher channel")).await?;
        }

        tracing::debug!(
            strategy = ?opts.strategy,
            max_keys = opts.max_keys,
            ttl = ?opts.ttl,
            purge_every = ?opts.purge_every,
            "memory cache created"
        );

        Ok(Self {
            inner: Arc::new(MemoryInner {
                engine,
                counters: Counters::default(),
                current_size,
                max_key_size: opts.max_key_size,
                max_value_size: opts.max_value_size,
                max_cache_size: opts.max_cache_size,
                weighter: builder.weighter,
                instance_id,
            }),
        })
    }

    // Wires the eviction fan-out: a worker task drains locally evicted keys
    // to the bus, and the subscription drops keys evicted by other
    // instances. The `from_id` check cuts the echo of our own publishes;
    // removing an absent key fires nothing, which terminates the cascade.
    async fn connect_bus(
        bus: &Arc<dyn EventBus>,
        engine: &Arc<Engine<V>>,
        instance_id: &str,
        mut publish_rx: mpsc::UnboundedReceiver<String>,
    ) -> Result<()> {
        let publisher_bus = bus.clone();
        let from_id = instance_id.to_string();
        tokio::spawn(async move {
            while let Some(key) = publish_rx.recv().await {
                if let Err(err) = publisher_bus.publish(&from_id, &key).await {
                    tracing::warn!(key = %key, error = %err, "failed to publish eviction event");
                }
            }
        });

        let engine = Arc::downgrade(engine);
        let own_id = instance_id.to_string();
        bus.subscribe(Arc::new(move |from_id, key| {
            if from_id == own_id {
                return;
            }
            if let Some(engine) = engine.upgrade() {
                engine.remove(key);
            }
        }))
        .await
        .map_err(Error::Bus)
    }

    /// Get the cached value for `key`, or run `loader` and cache its result.
    ///
    /// The loader runs without the engine lock held, so concurrent misses on
    /// the same key may each run their loader; the last writer's value
    /// stays. Loader errors are propagated verbatim and never cached.
    pub async fn get<F, Fut>(&self, key: &str, loader: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        if let Some(value) = self.inner.engine.get(key) {
            self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(value);
        }

        let value = match loader().await {
            Ok(value) => value,
            Err(err) => {
                self.inner.counters.errors.fetch_add(1, Ordering::Relaxed);
                return Err(Error::Loader(err));
            }
        };
        self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);

        if self.admit(key, &value) {
            let weight = self.weight(&value) as i64;
            self.inner.engine.insert(key.to_string(), value.clone());
            if weight > 0 {
                self.inner.current_size.fetch_add(weight, Ordering::Relaxed);
                if self.inner.max_cache_size > 0 {
                    while self.inner.current_size.load(Ordering::Relaxed) > self.inner.max_cache_size {
                        if !self.inner.engine.remove_oldest() {
                            break;
                        }
                    }
                }
            }
        }

        Ok(value)
    }

    /// Get the value for `key` without updating its recency or loading.
    pub fn peek(&self, key: &str) -> Option<V> {
        self.inner.engine.peek(key)
    }

    /// Remove one key.
    pub fn remove(&self, key: &str) {
        self.inner.engine.remove(key);
    }

    /// Remove every key satisfying the predicate.
    pub fn invalidate_if(&self, pred: impl Fn(&str) -> bool) {
        self.inner.engine.remove_if(pred);
    }

    /// Drop everything.
    pub fn purge(&self) {
        self.inner.engine.purge();
        self.inner.current_size.store(0, Ordering::Relaxed);
    }

    /// Snapshot of current keys, oldest first.
    pub fn keys(&self) -> Vec<String> {
        self.inner.engine.keys()
    }

    /// Snapshot of the cache statistics.
    pub fn stat(&self) -> CacheStat {
        self.inner.counters.snapshot(
            self.inner.engine.len(),
            self.inner.current_size.load(Ordering::Relaxed),
        )
    }

    /// Stop the background sweeper. Idempotent; the cache itself stays
    /// usable, entries just stop being swept.
    pub fn close(&self) {
        self.inner.engine.close();
    }

    /// The process-unique id this instance stamps on published evictions.
    pub fn instance_id(&self) -> &str {
        &self.inner.instance_id
    }

    // Size admission. The key gate rejects strictly-greater lengths, the
    // value gate rejects greater-or-equal weights; the asymmetry is part of
    // the contract.
    fn admit(&self, key: &str, value: &V) -> bool {
        if self.inner.max_key_size > 0 && key.len() > self.inner.max_key_size {
            return false;
        }
        if self.inner.max_value_size > 0 {
            if let Some(weighter) = &self.inner.weighter {
                if weighter(value) >= self.inner.max_value_size {
                    return false;
                }
            }
        }
        true
    }

    fn weight(&self, value: &V) -> usize {
        self.inner.weighter.as_ref().map(|weighter| weighter(value)).unwrap_or(0)
    }
}
