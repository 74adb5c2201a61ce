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

pub use crate::{
    bus::{EventBus, EvictionHandler, NopEventBus},
    cache::Cache,
    config::{CacheBuilder, Strategy, Weighter},
    error::{Error, MultipleError, Result},
    memory::MemoryCache,
    nop::NopCache,
    remote::{CacheCodec, RemoteCache, RemoteStore},
    scoped::{CacheKey, FlushRequest, ScopedCache},
    stats::CacheStat,
};
