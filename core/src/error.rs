//! Error types for the request accumulator and dispatcher.
//!
//! # Design
//! Configuration problems surface synchronously from the setter or build step
//! that detects them. Transport failures keep the collaborator's error as the
//! `source` so callers can downcast to the concrete transport error.

use std::path::PathBuf;

use thiserror::Error;

use crate::http::HttpMethod;

/// Boxed error produced by a [`Transport`](crate::Transport) implementation.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by `ApiBase` and `RequestSpec`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// A configuration value is structurally invalid.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// `set_query_params` was called before `build_request_spec`.
    #[error("request spec has not been built; call build_request_spec first")]
    SpecNotBuilt,

    /// The verb name is not one of GET, POST, PUT, DELETE.
    #[error("unsupported http method: {0}")]
    UnknownMethod(String),

    /// A multipart file field could not be read at dispatch time.
    #[error("failed to read multipart file {path:?}: {source}")]
    MultiPartFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transport failed before producing a response.
    #[error("http transport error for {method} {url}: {source}")]
    Transport {
        method: HttpMethod,
        url: String,
        #[source]
        source: TransportError,
    },

    /// A `TargetConfig` document could not be parsed.
    #[error("invalid target config: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

impl ApiError {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        ApiError::Configuration(message.into())
    }
}
