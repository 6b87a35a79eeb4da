// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{Thread, ThreadStore};
use crate::error::StoreError;
use crate::state::FlatMap;

/// Process-local thread store; clones share the same threads
#[derive(Clone)]
pub struct InMemoryThreadStore {
    threads: Arc<RwLock<HashMap<String, FlatMap>>>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self {
            threads: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of threads created or updated so far
    pub async fn len(&self) -> usize {
        self.threads.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.threads.read().await.is_empty()
    }
}

impl Default for InMemoryThreadStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn create(&self, metadata: FlatMap) -> Result<Thread, StoreError> {
        let id = format!("thread_{}", uuid::Uuid::new_v4().simple());
        let mut threads = self.threads.write().await;
        threads.insert(id.clone(), metadata.clone());
        Ok(Thread { id, metadata })
    }

    async fn fetch(&self, thread_id: &str) -> Result<FlatMap, StoreError> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).cloned().unwrap_or_default())
    }

    async fn update(&self, thread_id: &str, metadata: FlatMap) -> Result<FlatMap, StoreError> {
        let mut threads = self.threads.write().await;
        threads.insert(thread_id.to_string(), metadata.clone());
        Ok(metadata)
    }
}
