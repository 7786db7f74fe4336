//! # Engine - Facade
//!
//! The single entry point bundling the write-facing [`memtable::Memtable`]
//! with the per-segment read-side artifacts flush produces: one
//! [`bloom::Bloom`] filter and one [`sstable::SSTable`] sparse index per
//! flushed segment, plus the persisted segment-id registry.
//!
//! ## Write path
//!
//! ```text
//! Facade::put/get/delete
//!          |
//!          v
//!      Memtable
//!          |
//!          v
//!       RbTree
//! ```
//!
//! ## Flush path
//!
//! ```text
//! Facade::flush
//!     |
//!     v
//! sstable::flush_memtable  ->  segments/segment_{id}.log
//!     |
//!     v
//! retain Bloom + SSTable descriptor, advance + persist next_segment_id
//! ```
//!
//! There is no read path, compaction, or write-ahead log here — those are
//! out of scope for this core. The caller decides when to call `flush`,
//! typically by polling [`Facade::total_size`] against its own threshold.

use anyhow::{Context, Result};
use bloom::Bloom;
pub use rbtree::ValueBytes;
use sstable::{flush_memtable, FlushFailure, SSTable, SegmentCounterStore};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Segment ids are refused once advancing past them would reach this bound,
/// rather than wrapping back to a reused id.
pub const SEGMENT_ID_WRAP: u64 = 1 << 63;

/// Bundles the memtable with the per-segment Bloom filters and SSTable
/// descriptors produced by flush, plus the segment-id registry.
pub struct Facade {
    mem: memtable::Memtable,
    segments_dir: PathBuf,
    counter_path: PathBuf,
    next_segment_id: u64,
    blooms: HashMap<u64, Bloom>,
    sstables: HashMap<u64, SSTable>,
}

impl std::fmt::Debug for Facade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Facade")
            .field("segments_dir", &self.segments_dir)
            .field("next_segment_id", &self.next_segment_id)
            .field("memtable_len", &self.mem.len())
            .field("memtable_total_size", &self.mem.total_size())
            .field("segments_retained", &self.sstables.len())
            .finish()
    }
}

impl Facade {
    /// Initializes the facade: loads the segment counter from
    /// `counter_path` (yielding `0` on a missing, empty, or short file —
    /// see [`SegmentCounterStore::load`]) and constructs a fresh memtable
    /// with the given arena `capacity` and value-ownership mode.
    #[must_use]
    pub fn init<P1: AsRef<Path>, P2: AsRef<Path>>(
        segments_dir: P1,
        counter_path: P2,
        capacity: usize,
        owns_values: bool,
    ) -> Self {
        let segments_dir = segments_dir.as_ref().to_path_buf();
        let counter_path = counter_path.as_ref().to_path_buf();
        let next_segment_id = SegmentCounterStore::load(&counter_path);
        Self {
            mem: memtable::Memtable::with_capacity(capacity, owns_values),
            segments_dir,
            counter_path,
            next_segment_id,
            blooms: HashMap::new(),
            sstables: HashMap::new(),
        }
    }

    /// Inserts or overwrites `key` with `value`. Returns `false` only when
    /// the arena has no headroom left. See [`memtable::Memtable::put`].
    pub fn put(&mut self, key: i64, value: ValueBytes) -> bool {
        self.mem.put(key, value)
    }

    /// Returns the value for `key`, or `None` if absent or tombstoned.
    #[must_use]
    pub fn get(&self, key: i64) -> Option<&ValueBytes> {
        self.mem.get(key)
    }

    /// Logically deletes `key`. Returns `false` if absent or already
    /// tombstoned. See [`memtable::Memtable::delete`].
    pub fn delete(&mut self, key: i64) -> bool {
        self.mem.delete(key)
    }

    /// Approximate write volume of the current memtable generation
    /// (`sizeof(key) + value.len()` per successful `put`, accumulated). The
    /// caller uses this to decide when to call [`Self::flush`]; this core
    /// has no opinion on the threshold.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.mem.total_size()
    }

    /// Number of live entries (including tombstones) in the memtable.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mem.len()
    }

    /// `true` if the memtable holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }

    /// The id that will be assigned to the next flush.
    #[must_use]
    pub fn next_segment_id(&self) -> u64 {
        self.next_segment_id
    }

    /// The Bloom filter retained for `segment_id`, if this facade instance
    /// has flushed a segment with that id.
    #[must_use]
    pub fn bloom(&self, segment_id: u64) -> Option<&Bloom> {
        self.blooms.get(&segment_id)
    }

    /// The sparse block index retained for `segment_id`, if this facade
    /// instance has flushed a segment with that id.
    #[must_use]
    pub fn sstable(&self, segment_id: u64) -> Option<&SSTable> {
        self.sstables.get(&segment_id)
    }

    /// Flushes the current memtable generation to a new segment file.
    ///
    /// Returns `Ok(None)` without touching the filesystem or the counter if
    /// the memtable is empty. On success, returns the id of the segment
    /// written and retains its Bloom filter and sparse index.
    ///
    /// Matching the original engine's flush routine, the memtable itself is
    /// **not** reset after a successful flush: clearing the tree between
    /// generations is left to the caller (via [`memtable::Memtable::clear`]
    /// through whatever policy decides a generation boundary), since this
    /// core has no opinion on when that should happen.
    ///
    /// An open failure (segment directory or file creation) leaves the
    /// counter untouched, so the same id is retried on the next flush
    /// attempt. A failure after the file was created still advances the
    /// in-memory counter, guaranteeing a fresh id on retry, even though the
    /// on-disk counter file may lag by one if persisting it also fails.
    pub fn flush(&mut self) -> Result<Option<u64>> {
        let id = self.next_segment_id;
        let outcome = match flush_memtable(&mut self.mem, &self.segments_dir, id) {
            Ok(None) => return Ok(None),
            Ok(Some(outcome)) => outcome,
            Err(FlushFailure::Open(e)) => {
                return Err(e).context("flush aborted: segment counter left unchanged");
            }
            Err(FlushFailure::PostOpen(e)) => {
                self.advance_counter(id);
                return Err(e).context(
                    "flush failed after the segment file was created; counter still advanced",
                );
            }
        };

        self.blooms.insert(id, outcome.bloom);
        self.sstables.insert(id, outcome.sstable);
        self.advance_counter(id);

        Ok(Some(id))
    }

    /// Clears the memtable, discarding every entry. Exposed so the caller
    /// can decide its own generation-boundary policy after a flush.
    pub fn clear_memtable(&mut self) {
        self.mem.clear();
    }

    /// Advances `next_segment_id` past `flushed_id` and persists it,
    /// logging rather than failing on a persistence error — the in-memory
    /// counter must move forward regardless.
    fn advance_counter(&mut self, flushed_id: u64) {
        let next = match flushed_id.checked_add(1).filter(|n| *n < SEGMENT_ID_WRAP) {
            Some(next) => next,
            None => {
                log::warn!(
                    "segment id {} would advance past the wrap guard; next_segment_id left unchanged",
                    flushed_id
                );
                return;
            }
        };
        self.next_segment_id = next;
        if let Err(e) = SegmentCounterStore::store(&self.counter_path, next) {
            log::warn!(
                "failed to persist segment counter {} after flushing segment {}: {}",
                next,
                flushed_id,
                e
            );
        }
    }
}
