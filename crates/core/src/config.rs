//! Rewind configuration, fixed at construction time.

use serde::{Deserialize, Serialize};

use crate::codec::MAX_COMPRESSION_LEVEL;
use crate::error::{Result, RewindError};

/// Captures between forced full anchors.
pub const DEFAULT_ANCHOR_INTERVAL: u32 = 30;
/// Retained records. At one capture per second this is 5 minutes of rewind.
pub const DEFAULT_CAPACITY: usize = 300;
/// Deflate level for stored payloads. Fast; deltas are mostly zeroes anyway.
pub const DEFAULT_COMPRESSION_LEVEL: u8 = 1;

/// History shape and compression settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewindConfig {
    /// Maximum number of retained records.
    pub capacity: usize,
    /// Every `anchor_interval`-th capture is stored in full.
    pub anchor_interval: u32,
    /// Deflate level, 0..=10.
    pub compression_level: u8,
}

impl Default for RewindConfig {
    fn default() -> Self {
        RewindConfig {
            capacity: DEFAULT_CAPACITY,
            anchor_interval: DEFAULT_ANCHOR_INTERVAL,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl RewindConfig {
    pub fn new(capacity: usize, anchor_interval: u32) -> Self {
        RewindConfig { capacity, anchor_interval, ..Default::default() }
    }

    pub fn with_compression_level(mut self, level: u8) -> Self {
        self.compression_level = level;
        self
    }

    /// Reject shapes that could orphan deltas or cannot be honoured.
    ///
    /// The capacity must cover at least one full anchor interval so the most
    /// recent anchor is always inside the retained window.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(RewindError::InvalidConfig("capacity must be at least 1".into()));
        }
        if self.anchor_interval == 0 {
            return Err(RewindError::InvalidConfig("anchor interval must be at least 1".into()));
        }
        if (self.capacity as u64) < u64::from(self.anchor_interval) {
            return Err(RewindError::InvalidConfig(format!(
                "capacity {} is smaller than anchor interval {}",
                self.capacity, self.anchor_interval
            )));
        }
        if self.compression_level > MAX_COMPRESSION_LEVEL {
            return Err(RewindError::InvalidConfig(format!(
                "compression level {} exceeds {}",
                self.compression_level, MAX_COMPRESSION_LEVEL
            )));
        }
        Ok(())
    }
}
