//! On-disk frame format, the in-memory SSTable descriptor, and the
//! segment-id counter store.
//!
//! ## Compressed frame (one per staging-buffer generation)
//!
//! ```text
//! offset  size  field
//! 0       4     magic = 0x4C534D31 ("LSM1"), little-endian
//! 4       4     uncompressed length (u32 LE)
//! 8       4     compressed length (u32 LE)
//! 12      clen  zlib deflate stream at default level
//! ```
//!
//! A segment file is a concatenation of frames with no inter-frame padding.
//! Frame boundaries carry no semantic meaning; a single record never crosses
//! one, since records are appended to the staging buffer atomically.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Magic identifying a compressed frame header (ASCII "LSM1").
pub const FRAME_MAGIC: u32 = 0x4C53_4D31;

/// Size of one uncompressed staging buffer generation, and the block size
/// used to decide sparse-index boundaries.
pub const MT_BUF_CAP: usize = memtable::MT_BUF_CAP;

/// Sparse index boundary, in uncompressed record-stream bytes.
pub const BLOCK_SIZE: usize = 1 << 16;

/// Width in bytes of a serialized key (`i64`).
pub const KEY_SIZE: usize = 8;

/// Errors raised while reading or validating a frame.
///
/// Writing a frame can only fail on I/O, which is surfaced as
/// [`anyhow::Error`] at the writer's call sites; this enum exists for the
/// frame reader, where callers may want to distinguish a corrupt stream
/// from a plain I/O failure.
#[derive(Debug, Error)]
pub enum FrameError {
    /// An underlying I/O error while reading the header or payload.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The 4-byte magic did not match [`FRAME_MAGIC`].
    #[error("bad frame magic: {0:#x}")]
    BadMagic(u32),

    /// The decompressed payload length did not match the header's
    /// `ulen` field.
    #[error("decompressed length mismatch: header said {expected}, got {actual}")]
    LengthMismatch { expected: u32, actual: u32 },
}

/// Compresses `payload` with zlib at the default level and writes a
/// complete frame (header + compressed bytes) to `w`. Returns the total
/// number of bytes written to `w` (header plus compressed payload), so
/// callers can track actual on-disk segment size.
pub fn write_frame<W: Write>(w: &mut W, payload: &[u8]) -> io::Result<u64> {
    let mut encoder = ZlibEncoder::new(Vec::with_capacity(payload.len()), Compression::default());
    encoder.write_all(payload)?;
    let compressed = encoder.finish()?;

    w.write_u32::<LittleEndian>(FRAME_MAGIC)?;
    w.write_u32::<LittleEndian>(payload.len() as u32)?;
    w.write_u32::<LittleEndian>(compressed.len() as u32)?;
    w.write_all(&compressed)?;
    Ok(12 + compressed.len() as u64)
}

/// Reads one frame from `r` and returns its decompressed payload, or `None`
/// at a clean end-of-stream (no bytes left before the magic field).
pub fn read_frame<R: Read>(r: &mut R) -> Result<Option<Vec<u8>>, FrameError> {
    let magic = match r.read_u32::<LittleEndian>() {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if magic != FRAME_MAGIC {
        return Err(FrameError::BadMagic(magic));
    }

    let ulen = r.read_u32::<LittleEndian>()?;
    let clen = r.read_u32::<LittleEndian>()?;

    let mut compressed = vec![0u8; clen as usize];
    r.read_exact(&mut compressed)?;

    let mut decoder = ZlibDecoder::new(&compressed[..]);
    let mut payload = Vec::with_capacity(ulen as usize);
    decoder.read_to_end(&mut payload)?;

    if payload.len() as u32 != ulen {
        return Err(FrameError::LengthMismatch {
            expected: ulen,
            actual: payload.len() as u32,
        });
    }

    Ok(Some(payload))
}

/// In-memory sparse block index for one segment: one `(key, file_offset)`
/// entry per [`BLOCK_SIZE`] boundary of the uncompressed record stream,
/// pointing at the first record starting at or after that boundary.
#[derive(Debug, Default, Clone)]
pub struct SSTable {
    keys: Vec<i64>,
    offsets: Vec<u64>,
}

impl SSTable {
    /// Creates a descriptor with parallel arrays pre-reserved (not
    /// pre-sized -- the exact entry count depends on traversal) to the
    /// expected block count.
    #[must_use]
    pub fn with_expected_blocks(expected_blocks: usize) -> Self {
        Self {
            keys: Vec::with_capacity(expected_blocks),
            offsets: Vec::with_capacity(expected_blocks),
        }
    }

    /// Number of `(key, offset)` entries recorded so far.
    #[must_use]
    pub fn length(&self) -> usize {
        self.keys.len()
    }

    /// Appends one sparse-index entry. Entries must be pushed in ascending
    /// `offset` order by the flush pipeline; this is not re-validated here.
    pub fn push(&mut self, key: i64, offset: u64) {
        self.keys.push(key);
        self.offsets.push(offset);
    }

    /// Borrows the parallel `(key, offset)` arrays.
    #[must_use]
    pub fn entries(&self) -> (&[i64], &[u64]) {
        (&self.keys, &self.offsets)
    }
}

/// Errors from the segment-id counter store.
#[derive(Debug, Error)]
pub enum CounterError {
    /// An I/O error while writing the counter file. Reading a missing or
    /// short file is *not* an error -- see [`SegmentCounterStore::load`].
    #[error("io error persisting segment counter: {0}")]
    Io(#[from] io::Error),
}

/// Persists the monotone next-segment-id counter as a single 8-byte
/// little-endian `u64` at a well-known path.
pub struct SegmentCounterStore;

impl SegmentCounterStore {
    /// Loads the counter from `path`. A missing file, a zero-size file, or
    /// a short read all yield `0` -- this is the documented "fresh store"
    /// behavior, not an error.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> u64 {
        let mut file = match std::fs::File::open(path) {
            Ok(f) => f,
            Err(_) => return 0,
        };
        match file.read_u64::<LittleEndian>() {
            Ok(n) => n,
            Err(_) => 0,
        }
    }

    /// Writes `next_id` to `path`: open for write, write 8 bytes, flush,
    /// close. Replaces the file's prior contents.
    pub fn store<P: AsRef<std::path::Path>>(path: P, next_id: u64) -> Result<(), CounterError> {
        let mut file = std::fs::File::create(path)?;
        file.write_u64::<LittleEndian>(next_id)?;
        file.flush()?;
        Ok(())
    }
}
