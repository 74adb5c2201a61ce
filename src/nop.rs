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

use std::{future::Future, marker::PhantomData};

use crate::{
    error::{Error, Result},
    stats::CacheStat,
    Value,
};

/// The do-nothing cache: every `get` runs the loader, nothing is retained,
/// statistics stay zero. Useful to switch caching off without touching call
/// sites.
pub struct NopCache<V>
where
    V: Value,
{
    _marker: PhantomData<fn() -> V>,
}

impl<V> Clone for NopCache<V>
where
    V: Value,
{
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<V> Default for NopCache<V>
where
    V: Value,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<V> NopCache<V>
where
    V: Value,
{
    /// Create a do-nothing cache.
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }

    /// Run the loader and return its result without caching.
    pub async fn get<F, Fut>(&self, _key: &str, loader: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<V>>,
    {
        loader().await.map_err(Error::Loader)
    }

    /// Always misses.
    pub fn peek(&self, _key: &str) -> Option<V> {
        None
    }

    /// No-op.
    pub fn remove(&self, _key: &str) {}

    /// No-op.
    pub fn invalidate_if(&self, _pred: impl Fn(&str) -> bool) {}

    /// No-op.
    pub fn purge(&self) {}

    /// Always empty.
    pub fn keys(&self) -> Vec<String> {
        Vec::new()
    }

    /// Always zero.
    pub fn stat(&self) -> CacheStat {
        CacheStat::default()
    }

    /// No-op.
    pub fn close(&self) {}
}
