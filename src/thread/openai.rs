// SPDX-License-Identifier: MIT

//! OpenAI threads API store

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{Thread, ThreadStore};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::state::FlatMap;

const PROVIDER: &str = "openai";

/// Thread store backed by `{base_url}/threads`.
///
/// The service limits metadata size and key count; those limits surface as
/// API errors from `update`.
pub struct OpenAIThreadStore {
    client: Client,
    api_key: String,
    base_url: String,
}

/// Thread object as returned by the API
#[derive(Debug, Deserialize)]
struct ThreadObject {
    id: String,
    #[serde(default)]
    metadata: Option<FlatMap>,
}

impl From<ThreadObject> for Thread {
    fn from(obj: ThreadObject) -> Self {
        Thread {
            id: obj.id,
            metadata: obj.metadata.unwrap_or_default(),
        }
    }
}

impl OpenAIThreadStore {
    pub fn new(api_key: String, base_url: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a store from configuration; the API key is read from the
    /// environment variable named by `api_key_env`.
    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        let api_key = config.api_key()?;
        let mut builder = Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn threads_url(&self) -> String {
        format!("{}/threads", self.base_url)
    }

    fn thread_url(&self, thread_id: &str) -> String {
        format!("{}/threads/{}", self.base_url, thread_id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", "assistants=v2")
            .header("Content-Type", "application/json")
    }

    /// Parse a thread object from a response body
    fn parse_thread(body: &str) -> Result<Thread, StoreError> {
        let obj: ThreadObject = serde_json::from_str(body)?;
        Ok(obj.into())
    }

    async fn send(&self, request: RequestBuilder) -> Result<Thread, StoreError> {
        let resp = self.authorize(request).send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(StoreError::api(PROVIDER, format!("{}: {}", status, text)));
        }

        log::debug!("OpenAI thread response: {}", text);
        Self::parse_thread(&text)
    }
}

#[async_trait]
impl ThreadStore for OpenAIThreadStore {
    async fn create(&self, metadata: FlatMap) -> Result<Thread, StoreError> {
        let request = self
            .client
            .post(self.threads_url())
            .json(&json!({ "metadata": metadata }));
        let thread = self.send(request).await?;
        log::info!("Created thread {}", thread.id);
        Ok(thread)
    }

    async fn fetch(&self, thread_id: &str) -> Result<FlatMap, StoreError> {
        let resp = self
            .authorize(self.client.get(self.thread_url(thread_id)))
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            log::info!("Thread {} not found, treating as empty", thread_id);
            return Ok(FlatMap::new());
        }

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(StoreError::api(PROVIDER, format!("{}: {}", status, text)));
        }

        Ok(Self::parse_thread(&text)?.metadata)
    }

    async fn update(&self, thread_id: &str, metadata: FlatMap) -> Result<FlatMap, StoreError> {
        let request = self
            .client
            .post(self.thread_url(thread_id))
            .json(&json!({ "metadata": metadata }));
        Ok(self.send(request).await?.metadata)
    }
}
