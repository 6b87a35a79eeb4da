// SPDX-License-Identifier: MIT

//! Thread store configuration
//!
//! Loaded from a YAML file or from environment variables:
//!
//! ```yaml
//! backend: file          # openai | file | memory
//! directory: .threadstate
//! base_url: https://api.openai.com/v1
//! api_key_env: OPENAI_API_KEY
//! timeout_secs: 30
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{StateError, StoreError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_DIRECTORY: &str = ".threadstate";

/// Which thread store implementation to open
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// OpenAI-compatible threads API
    #[default]
    OpenAI,
    /// One JSON file per thread
    File,
    /// Process-local map, lost on exit
    Memory,
}

impl FromStr for StoreBackend {
    type Err = StateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "file" => Ok(Self::File),
            "memory" => Ok(Self::Memory),
            other => Err(StateError::config(format!("unknown store backend: {}", other))),
        }
    }
}

/// Store settings
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Root directory of the file backend
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// HTTP request timeout
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_directory() -> PathBuf {
    PathBuf::from(DEFAULT_DIRECTORY)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            directory: default_directory(),
            timeout_secs: None,
        }
    }
}

impl StoreConfig {
    /// Build from `THREADSTATE_BACKEND`, `THREADSTATE_DIR` and `OPENAI_BASE_URL`
    pub fn from_env() -> Result<Self, StateError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars<F>(lookup: F) -> Result<Self, StateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(backend) = lookup("THREADSTATE_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Some(dir) = lookup("THREADSTATE_DIR") {
            config.directory = PathBuf::from(dir);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            config.base_url = url;
        }
        Ok(config)
    }

    /// Load from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        let content = fs::read_to_string(path)?;
        Self::parse_yaml(&content)
    }

    /// Parse from a YAML string
    pub fn parse_yaml(content: &str) -> Result<Self, StateError> {
        let config: StoreConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String, StoreError> {
        env::var(&self.api_key_env)
            .map_err(|_| StoreError::Config(format!("{} must be set", self.api_key_env)))
    }
}
