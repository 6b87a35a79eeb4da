// SPDX-License-Identifier: MIT

//! File-backed thread store
//!
//! Each thread is a `<id>.json` file holding the serialized `Thread`.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::{Thread, ThreadStore};
use crate::error::StoreError;
use crate::state::FlatMap;

/// Thread store rooted at a directory
pub struct FileThreadStore {
    root: PathBuf,
}

impl FileThreadStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn thread_path(&self, thread_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !thread_id.is_empty()
            && thread_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::Config(format!(
                "invalid thread id: '{}'",
                thread_id
            )));
        }
        Ok(self.root.join(format!("{}.json", thread_id)))
    }

    async fn write_thread(&self, thread: &Thread) -> Result<(), StoreError> {
        let path = self.thread_path(&thread.id)?;
        fs::create_dir_all(&self.root).await?;

        // Write then rename so readers never see a half-written file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(thread)?).await?;
        if let Err(e) = fs::rename(&tmp, &path).await {
            if let Err(cleanup) = fs::remove_file(&tmp).await {
                log::warn!("Failed to remove {}: {}", tmp.display(), cleanup);
            }
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl ThreadStore for FileThreadStore {
    async fn create(&self, metadata: FlatMap) -> Result<Thread, StoreError> {
        let thread = Thread {
            id: format!("thread_{}", uuid::Uuid::new_v4().simple()),
            metadata,
        };
        self.write_thread(&thread).await?;
        log::debug!("Created thread file for {}", thread.id);
        Ok(thread)
    }

    async fn fetch(&self, thread_id: &str) -> Result<FlatMap, StoreError> {
        let path = self.thread_path(thread_id)?;
        match fs::read(&path).await {
            Ok(bytes) => {
                let thread: Thread = serde_json::from_slice(&bytes)?;
                Ok(thread.metadata)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(FlatMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn update(&self, thread_id: &str, metadata: FlatMap) -> Result<FlatMap, StoreError> {
        let thread = Thread {
            id: thread_id.to_string(),
            metadata,
        };
        self.write_thread(&thread).await?;
        Ok(thread.metadata)
    }
}
