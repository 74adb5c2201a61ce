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

use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

use serde::{Deserialize, Serialize};

/// Per-cache request counters.
///
/// Updated with relaxed atomics on the request path. A reader may observe a
/// snapshot that is momentarily inconsistent with the map state under
/// contention, but the counters always converge: `hits + misses + errors`
/// equals the number of loading `get` calls issued so far.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub errors: AtomicU64,
}

impl Counters {
    pub fn snapshot(&self, keys: usize, size: i64) -> CacheStat {
        CacheStat {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            keys,
            size,
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStat {
    /// Loading `get` calls answered from the cache.
    pub hits: u64,
    /// Loading `get` calls that ran the loader successfully.
    pub misses: u64,
    /// Number of entries currently held.
    pub keys: usize,
    /// Aggregate weight of held values, in bytes. Zero unless a weighter is
    /// configured.
    pub size: i64,
    /// Loading `get` calls whose loader failed.
    pub errors: u64,
}

impl CacheStat {
    /// Hit ratio over all completed loads, `0.0` before the first one.
    pub fn ratio(&self) -> f64 {
        if self.hits + self.misses == 0 {
            return 0.0;
        }
        self.hits as f64 / (self.hits + self.misses) as f64
    }
}

// The format is stable, tests rely on it.
impl fmt::Display for CacheStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{hits:{}, misses:{}, ratio:{:.2}, keys:{}, size:{}, errors:{}}}",
            self.hits,
            self.misses,
            self.ratio(),
            self.keys,
            self.size,
            self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_string() {
        let s = CacheStat {
            hits: 60,
            misses: 10,
            keys: 100,
            size: 12345,
            errors: 5,
        };
        assert_eq!(s.to_string(), "{hits:60, misses:10, ratio:0.86, keys:100, size:12345, errors:5}");
    }

    #[test]
    fn test_stat_string_empty() {
        let s = CacheStat::default();
        assert_eq!(s.to_string(), "{hits:0, misses:0, ratio:0.00, keys:0, size:0, errors:0}");
    }

    #[test]
    fn test_counters_snapshot() {
        let counters = Counters::default();
        counters.hits.fetch_add(3, Ordering::Relaxed);
        counters.errors.fetch_add(1, Ordering::Relaxed);
        let stat = counters.snapshot(2, 64);
        assert_eq!(
            stat,
            CacheStat {
                hits: 3,
                misses: 0,
                keys: 2,
                size: 64,
                errors: 1
            }
        );
    }
}
