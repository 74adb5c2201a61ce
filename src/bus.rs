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

//! Cross-node eviction fan-out.
//!
//! Every cache instance carries a process-unique id and publishes
//! `(instance id, key)` for each local eviction. Subscribers drop the key
//! locally unless the message carries their own id. The fan-out is advisory:
//! delivery order and timing are whatever the transport provides.

use std::sync::Arc;

use async_trait::async_trait;

/// Callback handed to [`EventBus::subscribe`], invoked as
/// `handler(from_id, key)` for every inbound eviction message.
pub type EvictionHandler = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// A pub/sub transport for eviction messages. The transport is expected to
/// run handlers on its own task so that delivery never blocks a cache
/// holding its engine lock.
#[async_trait]
pub trait EventBus: Send + Sync + 'static {
    /// Publish an eviction of `key` originated by the cache instance
    /// `from_id`.
    async fn publish(&self, from_id: &str, key: &str) -> anyhow::Result<()>;

    /// Register a handler for inbound eviction messages.
    async fn subscribe(&self, handler: EvictionHandler) -> anyhow::Result<()>;

    /// Release transport resources. Safe to call more than once.
    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The default do-nothing bus: publishes vanish, subscriptions never fire.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopEventBus;

#[async_trait]
impl EventBus for NopEventBus {
    async fn publish(&self, _from_id: &str, _key: &str) -> anyhow::Result<()> {
        Ok(())
    }

    async fn subscribe(&self, _handler: EvictionHandler) -> anyhow::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_nop_bus() {
        let bus = NopEventBus;
        bus.publish("", "").await.unwrap();
        bus.subscribe(Arc::new(|_, _| {})).await.unwrap();
        bus.close().await.unwrap();
    }
}
