//! Error type shared by every part of the rewind engine.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RewindError>;

/// Failures surfaced by capture, restore and history access.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewindError {
    /// Requested index/position is not in the retained window `first..first+len`.
    #[error("history entry {requested} out of range (retained {first}..{})", first + *len as u64)]
    OutOfRange { requested: u64, first: u64, len: usize },

    /// A delta record has no reachable anchor. Internal consistency failure.
    #[error("no anchor found for delta at position {position}")]
    NoAnchorFound { position: u64 },

    /// Stored state was written by an incompatible serializer format.
    #[error("state format mismatch: stored v{stored}, current v{current}")]
    FormatMismatch { stored: u32, current: u32 },

    /// Rejected configuration at construction time.
    #[error("invalid rewind config: {0}")]
    InvalidConfig(String),

    /// A record was appended at the wrong logical position.
    #[error("record position {actual} does not follow history (expected {expected})")]
    PositionMismatch { expected: u64, actual: u64 },

    /// Decompressed payload length disagrees with the recorded length.
    #[error("corrupt snapshot at position {position}: expected {expected} bytes, got {actual}")]
    Corrupt { position: u64, expected: usize, actual: usize },

    #[error("serialize error: {0}")]
    Serialize(String),

    #[error("deserialize error: {0}")]
    Deserialize(String),

    #[error("decompress error: {0}")]
    Decompress(String),
}

impl RewindError {
    /// Whether the host can reasonably carry on (clamp the request, skip the rewind).
    ///
    /// `NoAnchorFound` and `Corrupt` mean the history itself is broken.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, RewindError::NoAnchorFound { .. } | RewindError::Corrupt { .. })
    }
}
