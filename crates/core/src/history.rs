//! Bounded, time-ordered store of snapshot records.
//!
//! Records live in a flat `VecDeque`, oldest first. Index `i` addresses the
//! `i`-th retained record; every record also carries a logical position
//! (captures since the history was created or cleared), which keeps counting
//! across evictions:
//!
//! ```text
//!            evicted          retained window (capacity 5)
//!   pinned ┌────┬────┐  ┌────┬────┬────┬────┬────┐
//!    [A0]  │ A0 │ D1 │  │ D2 │ A3 │ D4 │ D5 │ A6 │   ← append
//!          └────┴────┘  └────┴────┴────┴────┴────┘
//!                index:   0    1    2    3    4
//! ```
//!
//! Eviction pops the head. When the popped record is an anchor that the new
//! head delta still needs, it moves to the pinned slot (outside the capacity
//! count) until the head is an anchor again.

use std::collections::VecDeque;

use tracing::{debug, error};

use crate::error::{Result, RewindError};
use crate::record::{AnchorRef, SnapshotRecord};

/// Aggregate numbers for a history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub records: usize,
    pub anchors: usize,
    pub deltas: usize,
    /// Sum of uncompressed payload sizes.
    pub raw_bytes: usize,
    /// Sum of stored (compressed) payload sizes, pinned anchor included.
    pub compressed_bytes: usize,
    /// Total elapsed units across retained records.
    pub elapsed_units: u64,
    pub pinned_anchor: bool,
}

impl HistoryStats {
    /// Stored bytes per raw byte (0.0 when empty).
    pub fn compression_ratio(&self) -> f64 {
        if self.raw_bytes == 0 {
            0.0
        } else {
            self.compressed_bytes as f64 / self.raw_bytes as f64
        }
    }
}

/// Rewind history with fixed capacity.
#[derive(Debug, Clone)]
pub struct History {
    records: VecDeque<SnapshotRecord>,
    capacity: usize,
    /// Evicted anchor still referenced by the deltas at the head.
    pinned: Option<SnapshotRecord>,
    /// Position the next appended record must carry.
    next_position: u64,
}

impl History {
    /// Create an empty history holding at most `capacity` records (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        History {
            records: VecDeque::with_capacity(capacity),
            capacity,
            pinned: None,
            next_position: 0,
        }
    }

    /// Append a record at the tail, evicting from the head while over capacity.
    ///
    /// The record must carry [`next_position`](Self::next_position) and, if it
    /// is a delta, reference an anchor this history can still resolve.
    pub fn append(&mut self, record: SnapshotRecord) -> Result<()> {
        if record.position() != self.next_position {
            return Err(RewindError::PositionMismatch {
                expected: self.next_position,
                actual: record.position(),
            });
        }
        if let Some(anchor) = record.anchor_ref() {
            if self.resolve(anchor).is_none() {
                error!(position = record.position(), anchor = anchor.position(), "delta references unknown anchor");
                return Err(RewindError::NoAnchorFound { position: record.position() });
            }
        }
        self.records.push_back(record);
        self.next_position += 1;
        while self.records.len() > self.capacity {
            self.evict_head();
        }
        Ok(())
    }

    fn evict_head(&mut self) {
        let Some(old) = self.records.pop_front() else { return };
        let head_needs_anchor = self.records.front().map_or(false, |head| !head.is_anchor());
        if !head_needs_anchor {
            self.pinned = None;
        } else if old.is_anchor() {
            debug!(position = old.position(), "pinning evicted anchor");
            self.pinned = Some(old);
            return;
        }
        debug!(position = old.position(), kind = ?old.kind(), "evicted");
    }

    /// Record at `index` (0 = oldest retained).
    pub fn at(&self, index: usize) -> Result<&SnapshotRecord> {
        self.records.get(index).ok_or(RewindError::OutOfRange {
            requested: index as u64,
            first: 0,
            len: self.records.len(),
        })
    }

    /// Index of the record with logical `position`.
    pub fn index_of(&self, position: u64) -> Result<usize> {
        let first = self.oldest_position();
        let len = self.records.len();
        if position < first || position - first >= len as u64 {
            return Err(RewindError::OutOfRange { requested: position, first, len });
        }
        Ok((position - first) as usize)
    }

    /// Record with logical `position`.
    pub fn get(&self, position: u64) -> Result<&SnapshotRecord> {
        self.index_of(position).and_then(|i| self.at(i))
    }

    /// Scan backward from `index` (inclusive) to the first anchor in the window.
    pub fn find_preceding_anchor(&self, index: usize) -> Result<usize> {
        let start = self.at(index)?;
        (0..=index)
            .rev()
            .find(|&i| self.records[i].is_anchor())
            .ok_or(RewindError::NoAnchorFound { position: start.position() })
    }

    /// The anchor record `index` is reconstructed from (itself for an anchor).
    ///
    /// Deltas look back through the window first and fall back to the pinned
    /// anchor once their own anchor has been evicted.
    pub fn anchor_for(&self, index: usize) -> Result<&SnapshotRecord> {
        let record = self.at(index)?;
        let Some(wanted) = record.anchor_ref() else { return Ok(record) };

        let in_window = index
            .checked_sub(1)
            .and_then(|i| self.find_preceding_anchor(i).ok())
            .map(|i| &self.records[i]);
        in_window
            .or(self.pinned.as_ref())
            .filter(|anchor| anchor.position() == wanted.position())
            .ok_or_else(|| {
                error!(position = record.position(), anchor = wanted.position(), "anchor chain broken");
                RewindError::NoAnchorFound { position: record.position() }
            })
    }

    /// Most recent anchor, as evidence for encoding a new delta.
    pub fn latest_anchor(&self) -> Option<AnchorRef> {
        self.records
            .iter()
            .rev()
            .find(|r| r.is_anchor())
            .or(self.pinned.as_ref())
            .map(|r| AnchorRef::new(r.position()))
    }

    fn resolve(&self, anchor: AnchorRef) -> Option<&SnapshotRecord> {
        match self.get(anchor.position()) {
            Ok(r) if r.is_anchor() => Some(r),
            _ => self.pinned.as_ref().filter(|p| p.position() == anchor.position()),
        }
    }

    /// Add `units` to the newest record's elapsed counter.
    pub fn advance(&mut self, units: u32) {
        if let Some(r) = self.records.back_mut() {
            r.elapsed_units = r.elapsed_units.saturating_add(units);
        }
    }

    /// Drop every record newer than `position`. Returns how many were dropped.
    ///
    /// The next append continues at `position + 1`.
    pub fn truncate_after(&mut self, position: u64) -> Result<usize> {
        let index = self.index_of(position)?;
        let dropped = self.records.len() - (index + 1);
        self.records.truncate(index + 1);
        self.next_position = position + 1;
        if dropped > 0 {
            debug!(position, dropped, "truncated history");
        }
        Ok(dropped)
    }

    /// Remove everything and restart positions at 0.
    pub fn clear(&mut self) {
        self.records.clear();
        self.pinned = None;
        self.next_position = 0;
    }

    /// Number of retained records.
    pub fn size(&self) -> usize { self.records.len() }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    pub fn capacity(&self) -> usize { self.capacity }

    pub fn next_position(&self) -> u64 { self.next_position }

    /// Position of the oldest retained record (`next_position` when empty).
    pub fn oldest_position(&self) -> u64 {
        self.records.front().map_or(self.next_position, |r| r.position())
    }

    /// Position of the newest record, if any.
    pub fn newest_position(&self) -> Option<u64> {
        self.records.back().map(|r| r.position())
    }

    /// Whether an evicted anchor is currently pinned.
    pub fn has_pinned_anchor(&self) -> bool { self.pinned.is_some() }

    /// Retained records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &SnapshotRecord> + '_ {
        self.records.iter()
    }

    pub fn stats(&self) -> HistoryStats {
        let mut stats = HistoryStats {
            records: self.records.len(),
            pinned_anchor: self.pinned.is_some(),
            ..HistoryStats::default()
        };
        for r in &self.records {
            if r.is_anchor() { stats.anchors += 1 } else { stats.deltas += 1 }
            stats.raw_bytes += r.raw_len();
            stats.compressed_bytes += r.compressed().len();
            stats.elapsed_units += u64::from(r.elapsed_units());
        }
        if let Some(p) = &self.pinned {
            stats.compressed_bytes += p.compressed().len();
        }
        stats
    }

    /// Estimated memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        let held = self.records.len() + usize::from(self.pinned.is_some());
        held * std::mem::size_of::<SnapshotRecord>() + self.stats().compressed_bytes
    }
}
