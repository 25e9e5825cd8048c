//! Target service configuration loaded from JSON.
//!
//! Headers are written as `[name, value]` pairs so repeated names survive:
//!
//! ```json
//! {
//!   "base_uri": "http://localhost",
//!   "port": 8080,
//!   "base_path": "/api",
//!   "headers": [["Accept", "application/json"]],
//!   "content_type": "application/json"
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::types::{ContentType, Cookie};

/// Everything needed to seed an `ApiBase` for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    pub base_uri: String,
    pub port: u16,
    pub base_path: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<ContentType>,
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Log request and response at `warn` when a call returns 4xx/5xx.
    #[serde(default = "default_log_on_failure")]
    pub log_on_failure: bool,
}

fn default_log_on_failure() -> bool {
    true
}

impl TargetConfig {
    pub fn from_json(raw: &str) -> Result<Self, ApiError> {
        Ok(serde_json::from_str(raw)?)
    }
}
