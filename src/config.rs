//! Layer configuration via TOML
//!
//! One file tunes both the transaction runner and the queues built on it:
//!
//! ```toml
//! [retry]
//! max_retries = 64
//! base_delay_ms = 1
//! max_delay_ms = 100
//!
//! [queue]
//! high_contention = false
//! slot_window = 64
//! compaction_batch = 64
//! ```
//!
//! Missing sections and keys fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use strata_core::{StrataError, StrataResult};
use strata_engine::RetryConfig;
use strata_primitives::QueueConfig;

/// Configuration for the runner and queue layers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Conflict retry policy
    pub retry: RetryConfig,
    /// Queue tuning
    pub queue: QueueConfig,
}

impl LayerConfig {
    /// Parse and validate a TOML document
    ///
    /// # Errors
    ///
    /// Returns `StrataError::InvalidInput` if the document does not parse or
    /// the queue tuning is invalid.
    pub fn from_toml_str(content: &str) -> StrataResult<Self> {
        let config: LayerConfig = toml::from_str(content).map_err(|e| {
            StrataError::invalid_input(format!("Failed to parse layer config: {}", e))
        })?;
        config.queue.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> StrataResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StrataError::internal(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| {
            StrataError::invalid_input(format!("config file '{}': {}", path.display(), e))
        })
    }

    /// Serialize to TOML
    ///
    /// # Errors
    ///
    /// Returns `StrataError::Serialization` if encoding fails.
    pub fn to_toml_string(&self) -> StrataResult<String> {
        toml::to_string(self).map_err(|e| StrataError::serialization(e.to_string()))
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Strata layer configuration

[retry]
# Attempts after the first before a conflict is returned to the caller
max_retries = 64
# Exponential backoff: base_delay_ms * 2^attempt, capped at max_delay_ms
base_delay_ms = 1
max_delay_ms = 100

[queue]
# Randomized pending slots instead of a single contended tail key
high_contention = false
# Slots a high-contention push chooses from
slot_window = 64
# Pending entries a pop moves into canonical order at once
compaction_batch = 64
"#
    }
}
