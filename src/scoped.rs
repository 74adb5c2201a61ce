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

//! Scoped keys and scope-aware bulk invalidation.
//!
//! A [`CacheKey`] carries a partition, an id, and an ordered list of scope
//! tags, serialized as `partition@@id@@scope1$$scope2`. A
//! [`ScopedCache`] wraps any [`Cache`] and flushes every key of a partition
//! that carries one of the requested scopes in a single call.

use std::{fmt, future::Future, str::FromStr};

use crate::{
    cache::Cache,
    error::{Error, Result},
    stats::CacheStat,
    Value,
};

const PART_SEPARATOR: &str = "@@";
const SCOPE_SEPARATOR: &str = "$$";

/// A structured cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheKey {
    partition: String,
    id: String,
    scopes: Vec<String>,
}

impl CacheKey {
    /// Start a key in the given partition.
    pub fn new(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            ..Self::default()
        }
    }

    /// Set the id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the scope tags.
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// The partition of the key.
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// The id of the key.
    pub fn key_id(&self) -> &str {
        &self.id
    }

    /// The scope tags of the key.
    pub fn scope_tags(&self) -> &[String] {
        &self.scopes
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            self.partition,
            PART_SEPARATOR,
            self.id,
            PART_SEPARATOR,
            self.scopes.join(SCOPE_SEPARATOR)
        )
    }
}

impl FromStr for CacheKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(PART_SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(Error::KeyParse(s.to_string()));
        }
        Ok(Self {
            partition: parts[0].to_string(),
            id: parts[1].to_string(),
            scopes: parts[2]
                .split(SCOPE_SEPARATOR)
                .filter(|scope| !scope.is_empty())
                .map(str::to_string)
                .collect(),
        })
    }
}

/// A bulk-invalidation request: a partition plus the scopes to flush. An
/// empty scope list flushes every key in the partition.
#[derive(Debug, Clone, Default)]
pub struct FlushRequest {
    partition: String,
    scopes: Vec<String>,
}

impl FlushRequest {
    /// Flush the given partition.
    pub fn new(partition: impl Into<String>) -> Self {
        Self {
            partition: partition.into(),
            scopes: Vec::new(),
        }
    }

    /// Restrict the flush to keys carrying one of these scopes.
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    // Whether the entry behind `raw` should be flushed. Keys not in the
    // canonical form are some caller's unrelated state and never match.
    fn matches(&self, raw: &str) -> bool {
        let Ok(key) = raw.parse::<CacheKey>() else {
            return false;
        };
        if key.partition != self.partition {
            return false;
        }
        if self.scopes.is_empty() {
            return true;
        }
        self.scopes.iter().any(|scope| key.scopes.contains(scope))
    }
}

/// A cache of byte- or value-payloads addressed by structured keys, with
/// scope-selective bulk invalidation on top of any [`Cache`] backend.
pub struct ScopedCache<V>
where
    V: Value,
{
    cache: Cache<V>,
}

impl<V> Clone for ScopedCache<V>
where
    V: Value,
{
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
        }
    }
}

impl<V> ScopedCache<V>
where
    V: Value,
{
    /// Wrap a cache.
    pub fn new(cache: Cache<V>) -> Self {
        Self { cache }
    }

    /// Get the cached value for `key`, or run `loader` and cache its result.
    pub async fn get<F, Fut>(&self, key: &CacheKey, loader: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        self.cache.get(&key.to_string(), loader).await
    }

    /// Get the value for `key` without updating its recency or loading.
    pub async fn peek(&self, key: &CacheKey) -> Option<V> {
        self.cache.peek(&key.to_string()).await
    }

    /// Remove one key.
    pub async fn remove(&self, key: &CacheKey) {
        self.cache.remove(&key.to_string()).await;
    }

    /// Remove every key matched by the request: same partition, and either
    /// no scopes requested or one of the requested scopes present on the
    /// key. Keys not in the canonical form are left alone.
    pub async fn flush(&self, request: FlushRequest) {
        self.cache.invalidate_if(|raw| request.matches(raw)).await;
    }

    /// Drop everything, across all partitions.
    pub async fn purge(&self) {
        self.cache.purge().await;
    }

    /// Snapshot of current raw keys.
    pub async fn keys(&self) -> Vec<String> {
        self.cache.keys().await
    }

    /// Snapshot of the underlying cache statistics.
    pub async fn stat(&self) -> CacheStat {
        self.cache.stat().await
    }

    /// Stop background work of the underlying cache.
    pub fn close(&self) {
        self.cache.close();
    }
}
