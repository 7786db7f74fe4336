///! # Bloom Filter
///!
///! A space-efficient probabilistic data structure for set membership testing
///! over signed 64-bit keys.
///!
///! A bloom filter can tell you with certainty that a key is **not** in the
///! set (no false negatives), but may occasionally report that a key **is**
///! in the set when it isn't (false positives).
///!
///! ## Usage
///!
///! Each flushed segment is allocated one bloom filter sized to the number
///! of live keys in the memtable at flush time. During a point lookup the
///! engine would check the bloom filter first -- if it says "not present",
///! the segment can be skipped entirely without touching the sparse index
///! or the file (the read path itself is out of scope for this crate).
///!
///! ## Example
///!
///! ```rust
///! use bloom::Bloom;
///!
///! let mut b = Bloom::new(1000);
///! b.put(42);
///! assert!(b.has(42));
///! ```
use std::io::{self, Read, Write};

/// Number of independent probe positions per key, fixed per the wire format.
pub const BLOOM_K: u32 = 6;

/// A bloom filter backed by a flat bit vector with [`BLOOM_K`] probes per key.
///
/// Uses double hashing: `h(i) = h1 + i * h2 (mod nbits)`, where `h1` and `h2`
/// are derived from the key via the SplitMix64 finalizer with two different
/// seeds. This keeps the filter purely arithmetic -- no per-key allocation,
/// no table lookups -- and matches the layout of the original C
/// implementation bit for bit, so segments produced by either are
/// cross-compatible.
pub struct Bloom {
    bits: Vec<u8>,
    nbytes: usize,
    k: u32,
}

impl Bloom {
    /// Creates a new, empty bloom filter sized for `expected_items` keys.
    ///
    /// `nbytes = expected_items * size_of::<i64>()`, matching the sizing
    /// rule used at flush time: one filter byte per key-sized unit of
    /// expected cardinality. `k` is fixed at [`BLOOM_K`].
    ///
    /// # Panics
    ///
    /// Panics if `expected_items` is 0 (a zero-sized filter has no valid
    /// bit positions to probe).
    #[must_use]
    pub fn new(expected_items: usize) -> Self {
        assert!(expected_items > 0, "expected_items must be > 0");
        let nbytes = expected_items * std::mem::size_of::<i64>();
        Self::with_nbytes(nbytes.max(8), BLOOM_K)
    }

    /// Creates a bloom filter with an explicit byte-size and probe count.
    ///
    /// This is the low-level constructor used when the caller has already
    /// computed `nbytes` (e.g. `length * size_of::<i64>()` at flush time, per
    /// the flush pipeline's sizing rule).
    #[must_use]
    pub fn with_nbytes(nbytes: usize, k: u32) -> Self {
        assert!(nbytes > 0, "nbytes must be > 0");
        assert!(k > 0, "k must be > 0");
        Self {
            bits: vec![0u8; nbytes],
            nbytes,
            k,
        }
    }

    fn from_raw(bits: Vec<u8>, nbytes: usize, k: u32) -> Self {
        Self { bits, nbytes, k }
    }

    /// Inserts `key` into the filter. Never fails.
    pub fn put(&mut self, key: i64) {
        let (h1, h2) = Self::hash_pair(key);
        for i in 0..self.k {
            let bit_idx = self.bit_index(h1, h2, i);
            self.set_bit(bit_idx);
        }
    }

    /// Returns `true` if `key` **might** be present, `false` if it is
    /// **definitely absent**.
    ///
    /// Returns on the first missing bit; only returns `true` if all `k`
    /// probed bits are set.
    #[must_use]
    pub fn has(&self, key: i64) -> bool {
        let (h1, h2) = Self::hash_pair(key);
        for i in 0..self.k {
            let bit_idx = self.bit_index(h1, h2, i);
            if !self.get_bit(bit_idx) {
                return false;
            }
        }
        true
    }

    /// Returns the number of bytes backing the filter.
    #[must_use]
    pub fn nbytes(&self) -> usize {
        self.nbytes
    }

    /// Returns the number of hash probes per key.
    #[must_use]
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Returns the size of the serialized filter in bytes.
    ///
    /// Layout: `nbytes(u64) + k(u32) + bits`.
    #[must_use]
    pub fn serialized_size(&self) -> usize {
        8 + 4 + self.bits.len()
    }

    /// Serializes the filter to a writer.
    ///
    /// Wire format (all little-endian): `[nbytes: u64][k: u32][bits: bytes]`.
    ///
    /// This is not used by the flush pipeline itself (the segment file
    /// format has no bloom section -- the filter lives only in the facade's
    /// in-memory per-segment table) but gives a future read path a way to
    /// persist and reload it without re-deriving it from the segment file.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&(self.nbytes as u64).to_le_bytes())?;
        w.write_all(&self.k.to_le_bytes())?;
        w.write_all(&self.bits)?;
        Ok(())
    }

    /// Deserializes a filter from a reader, the inverse of [`write_to`](Self::write_to).
    pub fn read_from<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut buf8 = [0u8; 8];
        let mut buf4 = [0u8; 4];

        r.read_exact(&mut buf8)?;
        let nbytes = u64::from_le_bytes(buf8) as usize;

        r.read_exact(&mut buf4)?;
        let k = u32::from_le_bytes(buf4);

        const MAX_BLOOM_BYTES: usize = 128 * 1024 * 1024;
        if nbytes > MAX_BLOOM_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bloom filter too large: {} bytes", nbytes),
            ));
        }

        let mut bits = vec![0u8; nbytes];
        r.read_exact(&mut bits)?;

        Ok(Self::from_raw(bits, nbytes, k))
    }

    // ---- Internal helpers ----

    fn hash_pair(key: i64) -> (u64, u64) {
        let x = key as u64;
        let h1 = splitmix64(x);
        let h2 = splitmix64(x ^ 0xD6E8_FEB8_6659_FD93);
        (h1, h2)
    }

    fn bit_index(&self, h1: u64, h2: u64, i: u32) -> u64 {
        let nbits = (self.nbytes as u64) * 8;
        h1.wrapping_add((i as u64).wrapping_mul(h2)) % nbits
    }

    fn set_bit(&mut self, idx: u64) {
        let byte_idx = (idx / 8) as usize;
        let bit_offset = (idx % 8) as u8;
        self.bits[byte_idx] |= 1 << bit_offset;
    }

    fn get_bit(&self, idx: u64) -> bool {
        let byte_idx = (idx / 8) as usize;
        let bit_offset = (idx % 8) as u8;
        (self.bits[byte_idx] >> bit_offset) & 1 == 1
    }
}

impl std::fmt::Debug for Bloom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bloom")
            .field("nbytes", &self.nbytes)
            .field("k", &self.k)
            .finish()
    }
}

/// SplitMix64 finalizer, used as the base mixing function for both probes.
///
/// Constants and shifts are fixed by the wire format; any reimplementation
/// must preserve them exactly for cross-process segment compatibility.
fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}
