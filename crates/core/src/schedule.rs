//! Anchor scheduling: which captures are stored in full.
//!
//! Every `anchor_interval`-th capture (counting from 0) is a full anchor,
//! everything in between is a delta against that anchor. With the default
//! interval of 30 and one capture per frame, a restore never needs more than
//! two decompressions.

/// Storage kind of a capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    /// Full state.
    Anchor,
    /// XOR difference against the nearest preceding anchor.
    Delta,
}

/// Classify the capture at logical `position`.
///
/// Position 0 (first capture into an empty history) is always an anchor.
/// An interval of 0 is treated as 1.
pub fn classify(position: u64, anchor_interval: u32) -> SnapshotKind {
    let interval = u64::from(anchor_interval.max(1));
    if position % interval == 0 {
        SnapshotKind::Anchor
    } else {
        SnapshotKind::Delta
    }
}

/// Position of the anchor that the capture at `position` is encoded against.
pub fn anchor_position(position: u64, anchor_interval: u32) -> u64 {
    let interval = u64::from(anchor_interval.max(1));
    position - position % interval
}
