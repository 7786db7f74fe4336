//! # SSTable segment producer
//!
//! Turns one flushed [`memtable::Memtable`] generation into an immutable,
//! on-disk segment: a sequence of zlib-compressed frames plus an in-memory
//! sparse block index and a per-segment [`bloom::Bloom`] filter.
//!
//! ## Segment file layout
//!
//! ```text
//! [FRAME] [FRAME] ... [FRAME]
//! ```
//!
//! where each frame is:
//!
//! ```text
//! offset  size  field
//! 0       4     magic = 0x4C534D31 ("LSM1"), little-endian
//! 4       4     uncompressed length (u32 LE)
//! 8       4     compressed length (u32 LE)
//! 12      clen  zlib deflate stream at default level
//! ```
//!
//! Decompressing and concatenating every frame's payload, in file order,
//! yields a stream of fixed-shape records in ascending key order:
//!
//! ```text
//! [key: i64, native byte order][length: i32, native byte order][payload: max(0, length) bytes]
//! ```
//!
//! `length == -1` marks a tombstone (no payload). This crate produces
//! segments; reading them back is out of scope here.
//!
//! Segments live at `segments/segment_{id}.log`; the next segment id is
//! persisted at `segments/segment_count` as a single little-endian `u64`.

mod format;
mod writer;

pub use format::{
    CounterError, FrameError, SSTable, SegmentCounterStore, BLOCK_SIZE, FRAME_MAGIC, KEY_SIZE,
};
pub use writer::{flush_memtable, FlushFailure, FlushOutcome};
