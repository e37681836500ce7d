//! A single stored entry in the rewind history.

use crate::schedule::SnapshotKind;

/// Proof that an anchor exists in a history at a given position.
///
/// Only [`History`](crate::History) hands these out, so a delta record can
/// never be built without pointing at a real anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorRef {
    position: u64,
}

impl AnchorRef {
    pub(crate) fn new(position: u64) -> Self {
        AnchorRef { position }
    }

    /// Logical position of the anchor.
    pub fn position(&self) -> u64 {
        self.position
    }
}

/// Compressed payload, tagged full or differential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// Compressed full state.
    Anchor(Vec<u8>),
    /// Compressed XOR delta against `anchor`.
    Delta { anchor: AnchorRef, data: Vec<u8> },
}

/// One capture. Immutable once written, apart from the elapsed-units counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRecord {
    position: u64,
    format_version: u32,
    /// Uncompressed payload length, checked on decompression.
    raw_len: usize,
    payload: Payload,
    /// Frames (or ticks) elapsed since this record was captured.
    pub(crate) elapsed_units: u32,
}

impl SnapshotRecord {
    pub(crate) fn anchor(position: u64, format_version: u32, raw_len: usize, compressed: Vec<u8>) -> Self {
        SnapshotRecord {
            position,
            format_version,
            raw_len,
            payload: Payload::Anchor(compressed),
            elapsed_units: 0,
        }
    }

    pub(crate) fn delta(
        position: u64,
        anchor: AnchorRef,
        format_version: u32,
        raw_len: usize,
        compressed: Vec<u8>,
    ) -> Self {
        SnapshotRecord {
            position,
            format_version,
            raw_len,
            payload: Payload::Delta { anchor, data: compressed },
            elapsed_units: 0,
        }
    }

    pub fn position(&self) -> u64 { self.position }

    pub fn format_version(&self) -> u32 { self.format_version }

    pub fn raw_len(&self) -> usize { self.raw_len }

    pub fn elapsed_units(&self) -> u32 { self.elapsed_units }

    pub fn payload(&self) -> &Payload { &self.payload }

    pub fn kind(&self) -> SnapshotKind {
        match self.payload {
            Payload::Anchor(_) => SnapshotKind::Anchor,
            Payload::Delta { .. } => SnapshotKind::Delta,
        }
    }

    pub fn is_anchor(&self) -> bool {
        matches!(self.payload, Payload::Anchor(_))
    }

    /// Anchor this record depends on; `None` for an anchor.
    pub fn anchor_ref(&self) -> Option<AnchorRef> {
        match self.payload {
            Payload::Anchor(_) => None,
            Payload::Delta { anchor, .. } => Some(anchor),
        }
    }

    /// The compressed bytes, whichever kind this is.
    pub fn compressed(&self) -> &[u8] {
        match &self.payload {
            Payload::Anchor(data) | Payload::Delta { data, .. } => data,
        }
    }
}
