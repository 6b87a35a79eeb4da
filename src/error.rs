// SPDX-License-Identifier: MIT

//! Typed error handling for threadstate-rs
//!
//! `StateError` is what callers of the codec and the lifecycle hooks see.
//! Shape and store failures keep their own enums so they can be matched
//! without string inspection.

use thiserror::Error;

/// Top-level error type for threadstate-rs
#[derive(Debug, Error)]
pub enum StateError {
    /// Missing thread id, invalid state schema, bad store configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A field is declared with a shape the codec cannot represent
    #[error("Unsupported shape for field '{field}': {source}")]
    Shape {
        field: String,
        #[source]
        source: ShapeError,
    },

    /// The declared schema disagrees with the Rust type it describes
    #[error("Schema error in model '{model}': {message}")]
    Schema { model: String, message: String },

    /// Failures reported by the thread store, passed through untouched
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The unit of work failed; nothing was persisted
    #[error("Unit of work failed: {0}")]
    Work(String),

    /// JSON serialization/deserialization errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Shape classification errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ShapeError {
    /// Lists may only hold structured models
    #[error("list elements must be structured models, found {0}")]
    UnsupportedListElement(String),

    /// Literal declared without any tag
    #[error("literal field declares no tags")]
    EmptyLiteral,

    /// Literal tag equal to the null or empty-list marker
    #[error("literal tag '{0}' collides with a reserved marker")]
    ReservedTag(String),

    /// Serialized value does not have the kind its shape requires
    #[error("expected {expected}, found {found}")]
    ValueMismatch { expected: String, found: String },
}

/// Thread store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Non-success response from a remote thread service
    #[error("API error from {provider}: {message}")]
    Api { provider: String, message: String },

    /// Store misconfiguration (missing API key, bad directory)
    #[error("Store configuration error: {0}")]
    Config(String),

    /// HTTP request errors
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// JSON errors while reading or writing thread payloads
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// I/O errors from file-backed stores
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StateError {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a shape error for a field
    pub fn shape(field: impl Into<String>, source: ShapeError) -> Self {
        Self::Shape {
            field: field.into(),
            source,
        }
    }

    /// Create a schema error
    pub fn schema(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            model: model.into(),
            message: message.into(),
        }
    }
}

impl StoreError {
    /// Create an API error
    pub fn api(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            message: message.into(),
        }
    }
}
