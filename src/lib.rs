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

#![warn(missing_docs)]

//! An in-process loading cache with bounded retention, scoped invalidation,
//! and cross-node eviction fan-out.
//!
//! `get` atomically resolves a hit or runs a caller-supplied async loader
//! and admits the result, subject to simultaneous limits on key count,
//! per-key and per-value byte size, aggregate byte footprint, and TTL.
//! Entries are retained in insertion order (LRC) or recency order (LRU); a
//! ticker-driven sweeper removes expired entries in the background. A
//! [`ScopedCache`] layers structured `(partition, id, scopes)` keys with
//! scope-selective bulk invalidation on top, and an [`EventBus`] fans local
//! evictions out to other nodes.
//!
//! ```ignore
//! use larder::{Cache, CacheKey, FlushRequest, ScopedCache, Strategy};
//!
//! let cache = ScopedCache::new(
//!     Cache::builder()
//!         .with_max_keys(100)
//!         .with_strategy(Strategy::Lru)
//!         .build()
//!         .await?,
//! );
//!
//! let key = CacheKey::new("site").id("posts").scopes(["user-42"]);
//! let posts = cache.get(&key, || async { load_posts().await }).await?;
//!
//! // drop every "site" entry tagged with the user scope
//! cache.flush(FlushRequest::new("site").scopes(["user-42"])).await;
//! ```

mod bus;
mod cache;
mod config;
mod dlist;
mod engine;
mod error;
mod memory;
mod nop;
mod remote;
mod scoped;
mod stats;
mod url;

/// Values a cache can hold.
pub trait Value: Send + Sync + Clone + 'static {}
impl<T: Send + Sync + Clone + 'static> Value for T {}

mod prelude;
pub use prelude::*;
