//! XOR delta codec between a snapshot payload and its anchor.
//!
//! Byte `i` of a delta is `payload[i] ^ anchor[i]` over the overlapping
//! prefix; payload bytes past the end of the anchor are stored verbatim
//! (XOR with nothing). Because XOR is its own inverse, [`merge`] is the
//! same operation as [`diff`]:
//!
//! ```text
//! merge(diff(state, anchor), anchor) == state
//! ```
//!
//! Consecutive emulator frames usually differ in a handful of RAM bytes, so
//! the delta is mostly zeroes and deflates to almost nothing.

use std::fmt;

/// Advisory: payload and anchor lengths differ.
///
/// Only the overlapping prefix is XORed. This is tolerated because a state
/// buffer can legitimately grow or shrink between builds sharing a save
/// format, but it is worth logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LengthMismatch {
    pub payload_len: usize,
    pub anchor_len: usize,
}

impl fmt::Display for LengthMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "payload {} bytes vs anchor {} bytes", self.payload_len, self.anchor_len)
    }
}

/// Encode `payload` relative to `anchor`. Output length is `payload.len()`.
pub fn diff(payload: &[u8], anchor: &[u8]) -> Vec<u8> {
    let mut out = payload.to_vec();
    xor_in_place(&mut out, anchor);
    out
}

/// Decode a delta produced by [`diff`] against the same anchor.
#[inline]
pub fn merge(delta: &[u8], anchor: &[u8]) -> Vec<u8> {
    diff(delta, anchor)
}

/// XOR `anchor` into `buf` over the overlapping prefix.
pub fn xor_in_place(buf: &mut [u8], anchor: &[u8]) {
    for (b, a) in buf.iter_mut().zip(anchor) {
        *b ^= *a;
    }
}

/// Report a length mismatch between a payload and its anchor, if any.
pub fn check_lengths(payload: &[u8], anchor: &[u8]) -> Option<LengthMismatch> {
    if payload.len() == anchor.len() {
        None
    } else {
        Some(LengthMismatch { payload_len: payload.len(), anchor_len: anchor.len() })
    }
}

/// Number of bytes that differ from the anchor (non-zero delta bytes).
pub fn changed_bytes(delta: &[u8]) -> usize {
    delta.iter().filter(|&&b| b != 0).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_identical_state_is_all_zero() {
        let state = vec![0x12, 0x34, 0x56, 0x78];
        let d = diff(&state, &state);
        assert_eq!(d, vec![0; 4]);
        assert_eq!(changed_bytes(&d), 0);
    }

    #[test]
    fn test_single_byte_change() {
        let anchor = vec![0xAA; 16];
        let mut state = anchor.clone();
        state[5] = 0xAB;
        let d = diff(&state, &anchor);
        assert_eq!(changed_bytes(&d), 1);
        assert_eq!(d[5], 0x01);
        assert_eq!(merge(&d, &anchor), state);
    }

    #[test]
    fn test_payload_longer_than_anchor() {
        let anchor = vec![0xFF, 0xFF];
        let state = vec![0x0F, 0xF0, 0x11, 0x22];
        let d = diff(&state, &anchor);
        assert_eq!(d, vec![0xF0, 0x0F, 0x11, 0x22]);
        assert_eq!(merge(&d, &anchor), state);
        assert_eq!(
            check_lengths(&state, &anchor),
            Some(LengthMismatch { payload_len: 4, anchor_len: 2 })
        );
    }

    #[test]
    fn test_payload_shorter_than_anchor() {
        let anchor = vec![1, 2, 3, 4, 5];
        let state = vec![1, 2];
        let d = diff(&state, &anchor);
        assert_eq!(d.len(), 2);
        assert_eq!(merge(&d, &anchor), state);
    }

    #[test]
    fn test_empty_buffers() {
        assert!(diff(&[], &[1, 2, 3]).is_empty());
        assert_eq!(diff(&[7], &[]), vec![7]);
        assert_eq!(check_lengths(&[], &[]), None);
    }

    proptest! {
        #[test]
        fn prop_merge_inverts_diff(
            a in proptest::collection::vec(any::<u8>(), 0..512),
            b in proptest::collection::vec(any::<u8>(), 0..512),
        ) {
            let d = diff(&a, &b);
            prop_assert_eq!(d.len(), a.len());
            prop_assert_eq!(merge(&d, &b), a.clone());
            // Suffix beyond the anchor is stored untouched.
            if a.len() > b.len() {
                prop_assert_eq!(&d[b.len()..], &a[b.len()..]);
            }
        }
    }
}
