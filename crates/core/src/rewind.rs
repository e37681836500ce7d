//! Capture/restore facade driving the rewind history.
//!
//! ## Capture
//!
//! ```text
//! live state ──serialize──▶ payload ──classify(position)──┐
//!                                                         ├─ Anchor: payload
//!                                                         └─ Delta:  payload ^ latest anchor
//!                        ──compress──▶ SnapshotRecord ──append──▶ History (evicts oldest)
//! ```
//!
//! ## Restore
//!
//! ```text
//! History[position] ──decompress (+ anchor, merge)──▶ payload ──deserialize──▶ live state
//! ```
//!
//! A capture only appends once serialization, diffing and compression have
//! all succeeded; a restore only touches the live state in its final
//! deserialize step.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, warn};

use crate::codec::{Compressor, Deflate, StateSerializer};
use crate::config::RewindConfig;
use crate::delta;
use crate::error::{Result, RewindError};
use crate::history::{History, HistoryStats};
use crate::reconstruct::{self, decompress_record};
use crate::record::SnapshotRecord;
use crate::schedule::{anchor_position, classify, SnapshotKind};

/// What a capture stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHandle {
    pub position: u64,
    pub kind: SnapshotKind,
    /// Uncompressed payload bytes.
    pub raw_len: usize,
    /// Stored bytes after compression.
    pub compressed_len: usize,
}

/// History numbers plus facade-level counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewindStats {
    pub history: HistoryStats,
    /// Captures and restores whose delta and anchor differed in length.
    pub length_mismatches: u64,
}

/// Owns a history and the collaborators used to fill and read it.
pub struct RewindManager<S, Z = Deflate> {
    serializer: S,
    compressor: Z,
    config: RewindConfig,
    history: History,
    length_mismatches: AtomicU64,
}

impl<S: StateSerializer> RewindManager<S, Deflate> {
    /// Manager compressing with deflate.
    pub fn with_deflate(config: RewindConfig, serializer: S) -> Result<Self> {
        Self::new(config, serializer, Deflate)
    }
}

impl<S: StateSerializer, Z: Compressor> RewindManager<S, Z> {
    pub fn new(config: RewindConfig, serializer: S, compressor: Z) -> Result<Self> {
        config.validate()?;
        Ok(RewindManager {
            serializer,
            compressor,
            history: History::new(config.capacity),
            config,
            length_mismatches: AtomicU64::new(0),
        })
    }

    /// Serialize `state` and append it at the next history position.
    pub fn capture(&mut self, state: &S::State) -> Result<RecordHandle> {
        let payload = self.serializer.serialize(state)?;
        let position = self.history.next_position();
        let kind = classify(position, self.config.anchor_interval);
        let level = self.config.compression_level;
        let format_version = self.serializer.format_version();
        let raw_len = payload.len();

        let record = match kind {
            SnapshotKind::Anchor => {
                let compressed = self.compressor.compress(&payload, level);
                SnapshotRecord::anchor(position, format_version, raw_len, compressed)
            }
            SnapshotKind::Delta => {
                let anchor_ref = self
                    .history
                    .latest_anchor()
                    .ok_or(RewindError::NoAnchorFound { position })?;
                let last = self.history.len().checked_sub(1).ok_or(RewindError::NoAnchorFound { position })?;
                let anchor = self.history.anchor_for(last)?;
                debug_assert_eq!(anchor.position(), anchor_ref.position());
                debug_assert_eq!(anchor_ref.position(), anchor_position(position, self.config.anchor_interval));
                let anchor_payload = decompress_record(anchor, &self.compressor)?;
                if let Some(m) = delta::check_lengths(&payload, &anchor_payload) {
                    self.note_mismatch(position, anchor.position(), m);
                }
                let diff = delta::diff(&payload, &anchor_payload);
                debug!(position, anchor = anchor_ref.position(), changed = delta::changed_bytes(&diff), "delta encoded");
                let compressed = self.compressor.compress(&diff, level);
                SnapshotRecord::delta(position, anchor_ref, format_version, raw_len, compressed)
            }
        };

        let handle = RecordHandle { position, kind, raw_len, compressed_len: record.compressed().len() };
        self.history.append(record)?;
        debug!(position, ?kind, raw_len, compressed_len = handle.compressed_len, "captured");
        Ok(handle)
    }

    /// Load the state captured at `position` into `state`.
    pub fn restore(&self, state: &mut S::State, position: u64) -> Result<()> {
        let index = self.history.index_of(position)?;
        let rebuilt = reconstruct::reconstruct_detailed(&self.history, index, &self.compressor)?;
        if rebuilt.length_mismatch.is_some() {
            self.length_mismatches.fetch_add(1, Ordering::Relaxed);
        }
        self.serializer
            .deserialize(state, &rebuilt.payload, rebuilt.format_version)
            .map_err(|e| {
                warn!(position, error = %e, "restore rejected");
                e
            })
    }

    /// Restore `position`, then drop every newer record so capturing resumes from there.
    pub fn rewind_to(&mut self, state: &mut S::State, position: u64) -> Result<()> {
        self.restore(state, position)?;
        self.history.truncate_after(position)?;
        Ok(())
    }

    /// Restore the newest capture. Returns its position.
    pub fn restore_latest(&self, state: &mut S::State) -> Result<u64> {
        let position = self.history.newest_position().ok_or(RewindError::OutOfRange {
            requested: 0,
            first: self.history.oldest_position(),
            len: 0,
        })?;
        self.restore(state, position)?;
        Ok(position)
    }

    /// Raw serializer output captured at `position`, without deserializing it.
    pub fn state_data(&self, position: u64) -> Result<Vec<u8>> {
        let index = self.history.index_of(position)?;
        reconstruct::reconstruct(&self.history, index, &self.compressor)
    }

    /// Count `units` of elapsed time against the newest capture.
    pub fn advance(&mut self, units: u32) {
        self.history.advance(units);
    }

    /// Drop all history (machine reset / power cycle).
    pub fn clear_history(&mut self) {
        self.history.clear();
        debug!("history cleared");
    }

    pub fn history_size(&self) -> usize {
        self.history.size()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn config(&self) -> &RewindConfig {
        &self.config
    }

    pub fn serializer(&self) -> &S {
        &self.serializer
    }

    pub fn length_mismatches(&self) -> u64 {
        self.length_mismatches.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> RewindStats {
        RewindStats { history: self.history.stats(), length_mismatches: self.length_mismatches() }
    }

    fn note_mismatch(&self, position: u64, anchor: u64, m: delta::LengthMismatch) {
        warn!(position, anchor, %m, "delta/anchor length mismatch");
        self.length_mismatches.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::BincodeSerializer;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
    struct Machine {
        pc: u16,
        frame: u32,
        ram: Vec<u8>,
    }

    impl Machine {
        fn new() -> Self {
            Machine { pc: 0, frame: 0, ram: vec![0; 512] }
        }

        /// One frame of deterministic activity touching a few RAM bytes.
        fn step(&mut self) {
            self.frame += 1;
            self.pc = self.pc.wrapping_add(0x31);
            let i = (self.frame as usize * 37) % self.ram.len();
            self.ram[i] = self.ram[i].wrapping_add(self.frame as u8);
            self.ram[0] = self.frame as u8;
        }
    }

    fn manager(capacity: usize, interval: u32) -> RewindManager<BincodeSerializer<Machine>> {
        RewindManager::with_deflate(RewindConfig::new(capacity, interval), BincodeSerializer::new(1)).unwrap()
    }

    /// Serializer that can be told to fail, for atomicity checks.
    struct Flaky {
        fail: bool,
    }

    impl StateSerializer for Flaky {
        type State = Vec<u8>;
        fn format_version(&self) -> u32 { 1 }
        fn serialize(&self, state: &Vec<u8>) -> Result<Vec<u8>> {
            if self.fail {
                Err(RewindError::Serialize("device busy".into()))
            } else {
                Ok(state.clone())
            }
        }
        fn deserialize(&self, state: &mut Vec<u8>, data: &[u8], _version: u32) -> Result<()> {
            *state = data.to_vec();
            Ok(())
        }
    }

    #[test]
    fn test_rejects_invalid_config() {
        let r = RewindManager::with_deflate(RewindConfig::new(2, 3), BincodeSerializer::<Machine>::new(1));
        assert!(matches!(r, Err(RewindError::InvalidConfig(_))));
    }

    #[test]
    fn test_capture_restore_round_trip() {
        let mut rm = manager(10, 3);
        let mut m = Machine::new();
        for _ in 0..5 {
            m.step();
            let h = rm.capture(&m).unwrap();
            let mut out = Machine::new();
            rm.restore(&mut out, h.position).unwrap();
            assert_eq!(out, m);
            assert_eq!(rm.state_data(h.position).unwrap(), bincode::serialize(&m).unwrap());
        }
    }

    #[test]
    fn test_cadence_interval_3() {
        let mut rm = manager(10, 3);
        let mut m = Machine::new();
        let mut kinds = Vec::new();
        for _ in 0..7 {
            m.step();
            kinds.push(rm.capture(&m).unwrap().kind);
        }
        use SnapshotKind::*;
        assert_eq!(kinds, vec![Anchor, Delta, Delta, Anchor, Delta, Delta, Anchor]);
    }

    #[test]
    fn test_eviction_scenario_capacity_5_interval_3() {
        let mut rm = manager(5, 3);
        let mut m = Machine::new();
        let mut states = Vec::new();
        for _ in 0..7 {
            m.step();
            states.push(m.clone());
            rm.capture(&m).unwrap();
            assert!(rm.history_size() <= 5);
        }
        assert_eq!(rm.history_size(), 5);
        let positions: Vec<u64> = rm.history().iter().map(|r| r.position()).collect();
        assert_eq!(positions, vec![2, 3, 4, 5, 6]);
        for p in 2..7u64 {
            assert_eq!(rm.history().get(p).unwrap().kind(), classify(p, 3));
            let mut out = Machine::new();
            rm.restore(&mut out, p).unwrap();
            assert_eq!(out, states[p as usize], "position {}", p);
        }
        let mut out = Machine::new();
        assert!(matches!(rm.restore(&mut out, 1), Err(RewindError::OutOfRange { .. })));
        assert_eq!(out, Machine::new());
    }

    #[test]
    fn test_long_run_every_retained_position_restores() {
        let mut rm = manager(45, 30);
        let mut m = Machine::new();
        let mut states = Vec::new();
        for _ in 0..200 {
            m.step();
            states.push(m.clone());
            rm.capture(&m).unwrap();
        }
        let first = rm.history().oldest_position();
        assert_eq!(first, 155);
        for p in first..200 {
            let mut out = Machine::new();
            rm.restore(&mut out, p).unwrap();
            assert_eq!(out, states[p as usize]);
        }
    }

    #[test]
    fn test_deltas_compress_smaller_than_anchors() {
        let mut rm = manager(10, 5);
        let mut m = Machine::new();
        m.ram.iter_mut().enumerate().for_each(|(i, b)| *b = (i * 7) as u8);
        let anchor = rm.capture(&m).unwrap();
        m.step();
        let delta = rm.capture(&m).unwrap();
        assert_eq!(delta.kind, SnapshotKind::Delta);
        assert!(delta.compressed_len < anchor.compressed_len);
    }

    #[test]
    fn test_format_mismatch_leaves_state() {
        let mut old = manager(5, 3);
        let mut m = Machine::new();
        m.step();
        old.capture(&m).unwrap();

        // Same history read by a newer build.
        let newer = RewindManager {
            serializer: BincodeSerializer::<Machine>::new(2),
            compressor: Deflate,
            config: old.config,
            history: old.history().clone(),
            length_mismatches: AtomicU64::new(0),
        };
        let mut live = Machine::new();
        live.pc = 0xBEEF;
        let before = live.clone();
        assert_eq!(
            newer.restore(&mut live, 0),
            Err(RewindError::FormatMismatch { stored: 1, current: 2 })
        );
        assert_eq!(live, before);
    }

    #[test]
    fn test_failed_capture_leaves_history() {
        let mut rm = RewindManager::with_deflate(RewindConfig::new(4, 2), Flaky { fail: false }).unwrap();
        rm.capture(&vec![1, 2, 3]).unwrap();
        rm.serializer = Flaky { fail: true };
        assert!(matches!(rm.capture(&vec![4, 5, 6]), Err(RewindError::Serialize(_))));
        assert_eq!(rm.history_size(), 1);
        assert_eq!(rm.history().next_position(), 1);
    }

    #[test]
    fn test_length_mismatch_counted() {
        let mut rm = RewindManager::with_deflate(RewindConfig::new(4, 4), Flaky { fail: false }).unwrap();
        rm.capture(&vec![1; 8]).unwrap();
        let grown = vec![2; 12];
        let h = rm.capture(&grown).unwrap();
        assert_eq!(rm.length_mismatches(), 1);
        let mut out = Vec::new();
        rm.restore(&mut out, h.position).unwrap();
        assert_eq!(out, grown);
        assert_eq!(rm.stats().length_mismatches, 2);
    }

    #[test]
    fn test_rewind_to_discards_future() {
        let mut rm = manager(10, 3);
        let mut m = Machine::new();
        let mut states = Vec::new();
        for _ in 0..6 {
            m.step();
            states.push(m.clone());
            rm.capture(&m).unwrap();
        }
        let mut live = Machine::new();
        rm.rewind_to(&mut live, 2).unwrap();
        assert_eq!(live, states[2]);
        assert_eq!(rm.history_size(), 3);

        // Diverge from the rewound point.
        live.step();
        live.ram[100] = 0xAA;
        let h = rm.capture(&live).unwrap();
        assert_eq!(h.position, 3);
        assert_eq!(h.kind, SnapshotKind::Anchor);
        let mut out = Machine::new();
        rm.restore(&mut out, 3).unwrap();
        assert_eq!(out, live);
    }

    #[test]
    fn test_restore_latest_and_clear() {
        let mut rm = manager(5, 3);
        let mut live = Machine::new();
        assert!(rm.restore_latest(&mut live).is_err());
        live.step();
        rm.capture(&live).unwrap();
        live.step();
        rm.capture(&live).unwrap();
        let mut out = Machine::new();
        assert_eq!(rm.restore_latest(&mut out).unwrap(), 1);
        assert_eq!(out, live);

        rm.clear_history();
        assert_eq!(rm.history_size(), 0);
        assert_eq!(rm.capture(&live).unwrap().kind, SnapshotKind::Anchor);
    }

    #[test]
    fn test_advance_tracks_elapsed_units() {
        let mut rm = manager(5, 3);
        let m = Machine::new();
        rm.capture(&m).unwrap();
        for _ in 0..60 {
            rm.advance(1);
        }
        rm.capture(&m).unwrap();
        rm.advance(10);
        let stats = rm.stats().history;
        assert_eq!(stats.elapsed_units, 70);
        assert_eq!(rm.history().at(0).unwrap().elapsed_units(), 60);
        assert_eq!(rm.history().at(1).unwrap().elapsed_units(), 10);
    }

    #[test]
    fn test_independent_managers() {
        let mut a = manager(5, 3);
        let mut b = manager(5, 3);
        let mut m = Machine::new();
        a.capture(&m).unwrap();
        m.step();
        a.capture(&m).unwrap();
        b.capture(&m).unwrap();
        assert_eq!(a.history_size(), 2);
        assert_eq!(b.history_size(), 1);
        let mut out = Machine::new();
        b.restore(&mut out, 0).unwrap();
        assert_eq!(out, m);
    }
}
