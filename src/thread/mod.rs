// SPDX-License-Identifier: MIT

//! Thread stores - where flat state maps are persisted
//!
//! Implementations live in their own submodules:
//! - [memory] - process-local map
//! - [file] - one JSON file per thread
//! - [openai] - OpenAI-compatible threads API

pub mod file;
pub mod memory;
pub mod openai;

pub use file::FileThreadStore;
pub use memory::InMemoryThreadStore;
pub use openai::OpenAIThreadStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{StoreBackend, StoreConfig};
use crate::error::{StateError, StoreError};
use crate::state::FlatMap;

/// A conversation thread and its metadata snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    #[serde(default)]
    pub metadata: FlatMap,
}

/// Storage for thread metadata
#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Create a new thread with initial metadata
    async fn create(&self, metadata: FlatMap) -> Result<Thread, StoreError>;

    /// Fetch a thread's metadata; unknown threads yield an empty map
    async fn fetch(&self, thread_id: &str) -> Result<FlatMap, StoreError>;

    /// Replace a thread's metadata and return what the store now holds
    async fn update(&self, thread_id: &str, metadata: FlatMap) -> Result<FlatMap, StoreError>;
}

/// Open the store selected by the configuration
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn ThreadStore>, StateError> {
    let store: Arc<dyn ThreadStore> = match config.backend {
        StoreBackend::OpenAI => Arc::new(OpenAIThreadStore::from_config(config)?),
        StoreBackend::File => Arc::new(FileThreadStore::new(config.directory.clone())),
        StoreBackend::Memory => Arc::new(InMemoryThreadStore::new()),
    };
    log::info!("Opened {:?} thread store", config.backend);
    Ok(store)
}
