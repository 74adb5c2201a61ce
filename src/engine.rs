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

//! The retention engine.
//!
//! The engine owns every cached entry. It keeps a `key → node` hash map and
//! an intrusive ordering list in lockstep under one mutex: the front of the
//! list is the newest entry, the back the oldest, and in LRU mode a
//! successful read promotes the entry to the front. TTL is enforced lazily
//! on the read path and eagerly by a ticker-driven sweeper task.

use std::{
    ptr::NonNull,
    sync::Arc,
    time::{Duration, Instant},
};

use hashbrown::HashMap;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::{
    config::Strategy,
    dlist::{Adapter, Dlist, DlistLink},
    Value,
};

/// TTL long enough to never trigger in practice. Using a finite sentinel
/// keeps the read path free of "no expiry" special cases.
pub(crate) const NEVER_EXPIRE: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

/// Sweep cadence used when a sweeper is warranted but none was configured.
pub(crate) const DEFAULT_PURGE_EVERY: Duration = Duration::from_secs(5 * 60);

/// Callback invoked under the engine lock for every removal of a live entry.
pub(crate) type EvictionListener<V> = Arc<dyn Fn(&str, &V) + Send + Sync>;

/// A cached entry. Heap-allocated, linked into the ordering list through its
/// embedded link, and referenced from the hash map. Owned by the engine;
/// only touched while the engine mutex is held.
struct Node<V> {
    link: DlistLink,
    key: String,
    value: V,
    expires_at: Instant,
}

struct NodeAdapter<V>(std::marker::PhantomData<V>);

unsafe impl<V> Adapter for NodeAdapter<V> {
    type Item = Node<V>;

    unsafe fn item2link(item: NonNull<Self::Item>) -> NonNull<DlistLink> {
        NonNull::new_unchecked(
            item.as_ptr()
                .cast::<u8>()
                .add(std::mem::offset_of!(Node<V>, link))
                .cast(),
        )
    }

    unsafe fn link2item(link: NonNull<DlistLink>) -> NonNull<Self::Item> {
        NonNull::new_unchecked(
            link.as_ptr()
                .cast::<u8>()
                .sub(std::mem::offset_of!(Node<V>, link))
                .cast(),
        )
    }
}

struct EngineInner<V> {
    map: HashMap<String, NonNull<Node<V>>>,
    order: Dlist<NodeAdapter<V>>,
}

unsafe impl<V: Send> Send for EngineInner<V> {}
unsafe impl<V: Sync> Sync for EngineInner<V> {}

pub(crate) struct EngineConfig<V> {
    pub ttl: Duration,
    pub purge_every: Duration,
    pub max_keys: usize,
    pub strategy: Strategy,
    pub listener: Option<EvictionListener<V>>,
}

/// The retention engine. See the module docs.
pub(crate) struct Engine<V>
where
    V: Value,
{
    ttl: Duration,
    max_keys: usize,
    is_lru: bool,
    listener: Option<EvictionListener<V>>,

    inner: Mutex<EngineInner<V>>,

    // One-shot close signal for the sweeper. Taken on the first `close`,
    // making the second one a no-op.
    done: Mutex<Option<oneshot::Sender<()>>>,
}

impl<V> Engine<V>
where
    V: Value,
{
    /// Create the engine and spawn its sweeper when warranted: a finite TTL
    /// combined with either a key cap or an explicit sweep cadence.
    ///
    /// Must be called within a tokio runtime if the sweeper is warranted.
    pub fn new(config: EngineConfig<V>) -> Arc<Self> {
        let engine = Arc::new(Self {
            ttl: config.ttl,
            max_keys: config.max_keys,
            is_lru: config.strategy == Strategy::Lru,
            listener: config.listener,
            inner: Mutex::new(EngineInner {
                map: HashMap::new(),
                order: Dlist::new(),
            }),
            done: Mutex::new(None),
        });

        if config.ttl < NEVER_EXPIRE && (config.max_keys > 0 || !config.purge_every.is_zero()) {
            let purge_every = if config.purge_every.is_zero() {
                DEFAULT_PURGE_EVERY
            } else {
                config.purge_every
            };
            let (tx, rx) = oneshot::channel();
            *engine.done.lock() = Some(tx);
            Self::spawn_sweeper(&engine, purge_every, rx);
        }

        engine
    }

    fn spawn_sweeper(engine: &Arc<Self>, purge_every: Duration, mut done: oneshot::Receiver<()>) {
        let engine = Arc::downgrade(engine);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + purge_every;
            let mut ticker = tokio::time::interval_at(start, purge_every);
            loop {
                tokio::select! {
                    _ = &mut done => break,
                    _ = ticker.tick() => {
                        let Some(engine) = engine.upgrade() else { break };
                        engine.delete_expired();
                    }
                }
            }
            tracing::trace!("retention sweeper stopped");
        });
    }

    /// Insert or update. An update refreshes the expiry and moves the entry
    /// to the front regardless of strategy. An insert exceeding the key cap
    /// removes the back (oldest) entry.
    pub fn insert(&self, key: String, value: V) {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        if let Some(&ptr) = inner.map.get(key.as_str()) {
            unsafe {
                let node = ptr.as_ptr();
                (*node).value = value;
                (*node).expires_at = now + self.ttl;
                inner.order.move_to_front(ptr);
            }
            return;
        }

        let node = Box::new(Node {
            link: DlistLink::default(),
            key: key.clone(),
            value,
            expires_at: now + self.ttl,
        });
        let ptr = unsafe { NonNull::new_unchecked(Box::into_raw(node)) };
        inner.map.insert(key, ptr);
        unsafe { inner.order.push_front(ptr) };

        if self.max_keys > 0 && inner.map.len() > self.max_keys {
            if let Some(oldest) = inner.order.back() {
                self.remove_node(&mut inner, oldest);
            }
        }
    }

    /// Look up a live entry. Expired entries are not returned, but their
    /// removal is left to the sweeper. In LRU mode a hit promotes the entry.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        let ptr = *inner.map.get(key)?;
        let (value, expired) = {
            let node = unsafe { ptr.as_ref() };
            (node.value.clone(), Instant::now() > node.expires_at)
        };
        if expired {
            return None;
        }
        if self.is_lru {
            unsafe { inner.order.move_to_front(ptr) };
        }
        Some(value)
    }

    /// Like [`Engine::get`], but never reorders.
    pub fn peek(&self, key: &str) -> Option<V> {
        let inner = self.inner.lock();
        let ptr = *inner.map.get(key)?;
        let node = unsafe { ptr.as_ref() };
        if Instant::now() > node.expires_at {
            return None;
        }
        Some(node.value.clone())
    }

    /// Remove one entry, firing the eviction listener.
    pub fn remove(&self, key: &str) {
        let mut inner = self.inner.lock();
        if let Some(&ptr) = inner.map.get(key) {
            self.remove_node(&mut inner, ptr);
        }
    }

    /// Remove every entry whose key satisfies the predicate, firing the
    /// eviction listener per removal.
    pub fn remove_if(&self, pred: impl Fn(&str) -> bool) {
        let mut inner = self.inner.lock();
        let matched: Vec<NonNull<Node<V>>> = inner
            .map
            .iter()
            .filter(|(key, _)| pred(key))
            .map(|(_, &ptr)| ptr)
            .collect();
        for ptr in matched {
            self.remove_node(&mut inner, ptr);
        }
    }

    /// Remove the oldest entry. Reports whether an entry was removed.
    pub fn remove_oldest(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.order.back() {
            Some(ptr) => {
                self.remove_node(&mut inner, ptr);
                true
            }
            None => false,
        }
    }

    /// Remove everything, firing the eviction listener per entry.
    pub fn purge(&self) {
        let mut inner = self.inner.lock();
        let ptrs: Vec<NonNull<Node<V>>> = inner.map.drain().map(|(_, ptr)| ptr).collect();
        unsafe { inner.order.clear() };
        for ptr in ptrs {
            let node = unsafe { Box::from_raw(ptr.as_ptr()) };
            if let Some(listener) = &self.listener {
                listener(&node.key, &node.value);
            }
        }
    }

    /// Remove every expired entry, oldest first.
    ///
    /// Without LRU promotion the list is ordered by expiry (constant TTL, so
    /// insertion order equals expiration order) and the walk stops at the
    /// first live entry.
    pub fn delete_expired(&self) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        let mut expired = Vec::new();
        for ptr in inner.order.iter_back() {
            let node = unsafe { ptr.as_ref() };
            if now > node.expires_at {
                expired.push(ptr);
            } else if !self.is_lru {
                break;
            }
        }
        for ptr in expired {
            self.remove_node(&mut inner, ptr);
        }
    }

    /// Snapshot of current keys, oldest first.
    pub fn keys(&self) -> Vec<String> {
        let inner = self.inner.lock();
        inner
            .order
            .iter_back()
            .map(|ptr| unsafe { ptr.as_ref() }.key.clone())
            .collect()
    }

    /// Number of entries currently held, including expired-but-unswept ones.
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    /// Signal the sweeper to stop. Idempotent, never blocks.
    pub fn close(&self) {
        if let Some(tx) = self.done.lock().take() {
            let _ = tx.send(());
        }
    }

    // Unlinks, unmaps, and frees a node, firing the eviction listener. Has
    // to be called with the engine lock held.
    fn remove_node(&self, inner: &mut EngineInner<V>, ptr: NonNull<Node<V>>) {
        unsafe {
            inner.order.remove(ptr);
            let node = Box::from_raw(ptr.as_ptr());
            inner.map.remove(node.key.as_str());
            if let Some(listener) = &self.listener {
                listener(&node.key, &node.value);
            }
        }
    }
}

impl<V> Drop for Engine<V>
where
    V: Value,
{
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        let ptrs: Vec<NonNull<Node<V>>> = inner.map.drain().map(|(_, ptr)| ptr).collect();
        unsafe { inner.order.clear() };
        for ptr in ptrs {
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
        }
    }
}
