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

#![allow(dead_code)]

use std::{
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use larder::{EventBus, EvictionHandler};

/// An in-process pub/sub delivering every published message to every
/// subscribed handler, including the publisher's own.
#[derive(Default)]
pub struct MockBus {
    handlers: Mutex<Vec<EvictionHandler>>,
    published: Mutex<Vec<(String, String)>>,
}

impl MockBus {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Keys published so far, in publish order.
    pub fn published_keys(&self) -> Vec<String> {
        self.published.lock().unwrap().iter().map(|(_, key)| key.clone()).collect()
    }
}

#[async_trait]
impl EventBus for MockBus {
    async fn publish(&self, from_id: &str, key: &str) -> anyhow::Result<()> {
        self.published
            .lock()
            .unwrap()
            .push((from_id.to_string(), key.to_string()));
        let handlers = self.handlers.lock().unwrap().clone();
        for handler in handlers {
            handler(from_id, key);
        }
        Ok(())
    }

    async fn subscribe(&self, handler: EvictionHandler) -> anyhow::Result<()> {
        self.handlers.lock().unwrap().push(handler);
        Ok(())
    }
}

/// Poll `cond` until it holds or a second passes. Returns whether it held.
pub async fn eventually<F, Fut>(mut cond: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..200 {
        if cond().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    false
}
