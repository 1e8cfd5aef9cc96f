//! Queue configuration

use serde::{Deserialize, Serialize};
use strata_core::{StrataError, StrataResult};

/// Default number of randomized slots per pending ticket
pub const DEFAULT_SLOT_WINDOW: u32 = 64;

/// Default number of pending entries canonicalized per compaction
pub const DEFAULT_COMPACTION_BATCH: usize = 64;

/// Tuning for a [`Queue`](super::Queue)
///
/// The mode is fixed for the lifetime of a queue instance. Every instance
/// sharing a subspace should use the same mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Place pushes in randomized pending slots instead of behind one tail key
    pub high_contention: bool,
    /// Number of slots a push chooses from; larger windows collide less but
    /// leave more entries for compaction
    pub slot_window: u32,
    /// Maximum pending entries a pop canonicalizes at once
    pub compaction_batch: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            high_contention: false,
            slot_window: DEFAULT_SLOT_WINDOW,
            compaction_batch: DEFAULT_COMPACTION_BATCH,
        }
    }
}

impl QueueConfig {
    /// Simple mode with default tuning
    pub fn new() -> Self {
        Self::default()
    }

    /// High-contention mode with default tuning
    pub fn high_contention() -> Self {
        Self::default().with_high_contention(true)
    }

    /// Enable or disable high-contention mode
    pub fn with_high_contention(mut self, enabled: bool) -> Self {
        self.high_contention = enabled;
        self
    }

    /// Set the randomized slot window
    pub fn with_slot_window(mut self, slot_window: u32) -> Self {
        self.slot_window = slot_window;
        self
    }

    /// Set the compaction batch size
    pub fn with_compaction_batch(mut self, compaction_batch: usize) -> Self {
        self.compaction_batch = compaction_batch;
        self
    }

    /// Check the tuning values
    ///
    /// # Errors
    /// Returns `StrataError::InvalidInput` if the window or batch is zero.
    pub fn validate(&self) -> StrataResult<()> {
        if self.slot_window == 0 {
            return Err(StrataError::invalid_input("slot_window must be at least 1"));
        }
        if self.compaction_batch == 0 {
            return Err(StrataError::invalid_input(
                "compaction_batch must be at least 1",
            ));
        }
        Ok(())
    }
}
