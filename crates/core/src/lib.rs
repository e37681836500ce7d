//! # rewind-core
//!
//! Incremental snapshot history for emulator rewind.
//!
//! The host captures machine state periodically; every capture is stored as
//! either a full **anchor** or an XOR **delta** against the most recent
//! anchor, deflate-compressed, in a bounded history. Any retained capture can
//! be rebuilt with at most two decompressions and loaded back into the live
//! machine.
//!
//! ## Architecture
//!
//! - [`RewindManager`] — Capture/restore facade owning a [`History`]
//! - [`History`] — Bounded record store; evicts oldest first, pins anchors still in use
//! - [`SnapshotRecord`] — Tagged anchor/delta payload with position and elapsed units
//! - [`schedule`] — Anchor cadence ([`classify`])
//! - [`delta`] — XOR diff/merge between a payload and its anchor
//! - [`reconstruct`] — Rebuild the raw payload stored at a history index
//! - [`codec`] — [`StateSerializer`] / [`Compressor`] traits with bincode and deflate implementations
//! - [`RewindConfig`] — Capacity, anchor interval, compression level
//!
//! ## Example
//!
//! ```
//! use rewind_core::{BincodeSerializer, RewindConfig, RewindManager};
//!
//! #[derive(serde::Serialize, serde::Deserialize, Clone, PartialEq, Debug)]
//! struct Machine { pc: u16, ram: Vec<u8> }
//!
//! let mut rewind = RewindManager::with_deflate(
//!     RewindConfig::new(60, 10),
//!     BincodeSerializer::<Machine>::new(1),
//! ).unwrap();
//!
//! let mut live = Machine { pc: 0, ram: vec![0; 256] };
//! let first = rewind.capture(&live).unwrap();
//! live.pc = 2;
//! live.ram[3] = 9;
//! rewind.capture(&live).unwrap();
//!
//! rewind.restore(&mut live, first.position).unwrap();
//! assert_eq!(live.pc, 0);
//! ```
//!
//! The engine does no locking. Hosts that browse history from another
//! thread wrap the manager in a mutex or pause emulation meanwhile.

pub mod codec;
pub mod config;
pub mod delta;
pub mod error;
pub mod history;
pub mod reconstruct;
pub mod record;
pub mod rewind;
pub mod schedule;

pub use codec::{BincodeSerializer, Compressor, Deflate, StateSerializer};
pub use config::RewindConfig;
pub use error::{Result, RewindError};
pub use history::{History, HistoryStats};
pub use record::{AnchorRef, Payload, SnapshotRecord};
pub use rewind::{RecordHandle, RewindManager, RewindStats};
pub use schedule::{classify, SnapshotKind};
