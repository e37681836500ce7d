//! Rebuild the raw state image stored at any history index.
//!
//! An anchor decompresses straight to the state. A delta decompresses to
//! `state ^ anchor`, so one more decompression (its anchor) and a merge
//! recover the state. Deltas are always encoded against their anchor, never
//! against the previous record, so the cost is two decompressions no matter
//! how far the delta sits from its anchor.

use tracing::warn;

use crate::codec::Compressor;
use crate::delta::{self, LengthMismatch};
use crate::error::{Result, RewindError};
use crate::history::History;
use crate::record::SnapshotRecord;

/// A rebuilt payload plus what it took to build it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconstruction {
    /// Raw serializer output captured at that point.
    pub payload: Vec<u8>,
    /// Serializer format version the payload was captured under.
    pub format_version: u32,
    /// Anchor the payload was rebuilt from (its own position for anchors).
    pub anchor_position: u64,
    /// Set when the delta and its anchor differ in length.
    pub length_mismatch: Option<LengthMismatch>,
}

/// Rebuild the raw payload at `index`.
pub fn reconstruct<Z>(history: &History, index: usize, compressor: &Z) -> Result<Vec<u8>>
where
    Z: Compressor + ?Sized,
{
    reconstruct_detailed(history, index, compressor).map(|r| r.payload)
}

/// Like [`reconstruct`], also reporting the anchor used and any length drift.
pub fn reconstruct_detailed<Z>(history: &History, index: usize, compressor: &Z) -> Result<Reconstruction>
where
    Z: Compressor + ?Sized,
{
    let record = history.at(index)?;
    let mut buffer = decompress_record(record, compressor)?;

    let anchor = history.anchor_for(index)?;
    let mut length_mismatch = None;
    if !record.is_anchor() {
        let anchor_buffer = decompress_record(anchor, compressor)?;
        length_mismatch = delta::check_lengths(&buffer, &anchor_buffer);
        if let Some(m) = length_mismatch {
            warn!(position = record.position(), anchor = anchor.position(), %m, "delta/anchor length mismatch");
        }
        delta::xor_in_place(&mut buffer, &anchor_buffer);
    }

    Ok(Reconstruction {
        payload: buffer,
        format_version: record.format_version(),
        anchor_position: anchor.position(),
        length_mismatch,
    })
}

/// Decompress a record's payload and check it against the recorded length.
pub(crate) fn decompress_record<Z>(record: &SnapshotRecord, compressor: &Z) -> Result<Vec<u8>>
where
    Z: Compressor + ?Sized,
{
    let data = compressor.decompress(record.compressed())?;
    if data.len() != record.raw_len() {
        return Err(RewindError::Corrupt {
            position: record.position(),
            expected: record.raw_len(),
            actual: data.len(),
        });
    }
    Ok(data)
}
