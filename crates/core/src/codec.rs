//! Pluggable machine-state serializer and payload compressor.
//!
//! The engine treats both as black boxes: the serializer turns live state
//! into a versioned byte image and back, the compressor shrinks stored
//! payloads. Stock implementations are provided for the common case:
//!
//! - [`BincodeSerializer`] — any `serde` state, encoded with bincode
//! - [`Deflate`] — raw deflate via `miniz_oxide`

use std::marker::PhantomData;

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{Result, RewindError};

/// Highest deflate level accepted by [`Deflate`].
pub const MAX_COMPRESSION_LEVEL: u8 = 10;

/// Converts live machine state to and from a byte image.
///
/// `serialize` must be deterministic for identical state. `deserialize` must
/// leave `state` untouched when it fails.
pub trait StateSerializer {
    type State;

    /// Version tag written alongside every captured payload.
    fn format_version(&self) -> u32;

    fn serialize(&self, state: &Self::State) -> Result<Vec<u8>>;

    /// Load `data`, captured under `format_version`, into `state`.
    fn deserialize(&self, state: &mut Self::State, data: &[u8], format_version: u32) -> Result<()>;
}

/// Lossless byte compression.
pub trait Compressor {
    fn compress(&self, data: &[u8], level: u8) -> Vec<u8>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

// ─── bincode ────────────────────────────────────────────────────────────────

/// Serializer for any serde state, tagged with a fixed format version.
///
/// Bump the version whenever the state struct changes shape; payloads from
/// another version are rejected with [`RewindError::FormatMismatch`].
pub struct BincodeSerializer<T> {
    version: u32,
    _state: PhantomData<fn() -> T>,
}

impl<T> BincodeSerializer<T> {
    pub fn new(version: u32) -> Self {
        BincodeSerializer { version, _state: PhantomData }
    }
}

impl<T> Clone for BincodeSerializer<T> {
    fn clone(&self) -> Self {
        BincodeSerializer::new(self.version)
    }
}

impl<T> std::fmt::Debug for BincodeSerializer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BincodeSerializer").field("version", &self.version).finish()
    }
}

impl<T: Serialize + DeserializeOwned> StateSerializer for BincodeSerializer<T> {
    type State = T;

    fn format_version(&self) -> u32 {
        self.version
    }

    fn serialize(&self, state: &T) -> Result<Vec<u8>> {
        bincode::serialize(state).map_err(|e| RewindError::Serialize(e.to_string()))
    }

    fn deserialize(&self, state: &mut T, data: &[u8], format_version: u32) -> Result<()> {
        if format_version != self.version {
            return Err(RewindError::FormatMismatch { stored: format_version, current: self.version });
        }
        // Decode fully before touching the live state.
        let loaded: T = bincode::deserialize(data).map_err(|e| RewindError::Deserialize(e.to_string()))?;
        *state = loaded;
        Ok(())
    }
}

// ─── deflate ────────────────────────────────────────────────────────────────

/// Raw deflate (no zlib header) via `miniz_oxide`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deflate;

impl Compressor for Deflate {
    fn compress(&self, data: &[u8], level: u8) -> Vec<u8> {
        miniz_oxide::deflate::compress_to_vec(data, level.min(MAX_COMPRESSION_LEVEL))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        miniz_oxide::inflate::decompress_to_vec(data)
            .map_err(|e| RewindError::Decompress(format!("{:?}", e.status)))
    }
}
