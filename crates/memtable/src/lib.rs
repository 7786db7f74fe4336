//! # Memtable
//!
//! An in-memory, sorted, mutable write buffer for the storage engine's
//! write path.
//!
//! The memtable is the first point of contact for every write operation. It
//! wraps an index-addressed [`rbtree::RbTree`] and adds:
//!
//! - an approximate `total_size` counter (key bytes + value bytes) used to
//!   decide when the caller should flush, and
//! - a fixed-size staging buffer, used exclusively by the flush pipeline to
//!   accumulate record bytes before each compressed frame is sealed.
//!
//! ## Example
//! ```rust
//! use memtable::Memtable;
//! use rbtree::ValueBytes;
//!
//! let mut m = Memtable::with_capacity(128, true);
//! assert!(m.put(1, ValueBytes::Owned(b"hello".to_vec())));
//! assert_eq!(m.get(1).unwrap().as_slice(), b"hello");
//!
//! assert!(m.delete(1));
//! assert!(m.get(1).is_none());
//! ```

use rbtree::{InOrder, RbTree, ValueBytes};

/// Capacity of the flush-scratch staging buffer: 64 KiB.
pub const MT_BUF_CAP: usize = 1 << 16;

/// A write-facing wrapper over an [`RbTree`], plus a flush-scratch buffer.
pub struct Memtable {
    tree: RbTree,
    total_size: usize,
    buf: Vec<u8>,
    buf_len: usize,
}

impl Memtable {
    /// Creates a memtable whose tree arena holds up to `capacity` nodes
    /// (including the reserved sentinel), with the given value-ownership
    /// mode.
    #[must_use]
    pub fn with_capacity(capacity: usize, owns_values: bool) -> Self {
        Self {
            tree: RbTree::with_capacity(capacity, owns_values),
            total_size: 0,
            buf: vec![0u8; MT_BUF_CAP],
            buf_len: 0,
        }
    }

    /// Inserts or overwrites `key` with `value`.
    ///
    /// Refuses the insert -- without mutating anything -- once the arena
    /// has one free slot left (`next_free >= capacity - 1`), reserving that
    /// last slot as headroom rather than letting the tree run the arena
    /// down to exactly full. On success, `sizeof(key) + value.len()` is
    /// added to [`total_size`](Self::total_size).
    pub fn put(&mut self, key: i64, value: ValueBytes) -> bool {
        if self.tree.next_free() >= self.tree.capacity().saturating_sub(1) {
            return false;
        }
        let added = std::mem::size_of::<i64>() + value.len();
        if self.tree.put(key, value) {
            self.total_size += added;
            true
        } else {
            false
        }
    }

    /// Returns the value for `key` if present and not tombstoned.
    #[must_use]
    pub fn get(&self, key: i64) -> Option<&ValueBytes> {
        self.tree.get(key)
    }

    /// Logically deletes `key`. See [`RbTree::delete`].
    pub fn delete(&mut self, key: i64) -> bool {
        self.tree.delete(key)
    }

    /// Number of physically allocated nodes (tombstoned or not).
    #[must_use]
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Approximate byte size of all keys and values inserted so far
    /// (`sizeof(key) + value.len()` per successful `put`). Used by the
    /// caller to decide when to flush.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    /// Borrows the underlying tree, e.g. for the flush pipeline's
    /// in-order traversal.
    #[must_use]
    pub fn tree(&self) -> &RbTree {
        &self.tree
    }

    /// Iterates live and tombstoned entries in ascending key order.
    #[must_use]
    pub fn in_order(&self) -> InOrder<'_> {
        self.tree.in_order()
    }

    /// Restores the memtable to an empty state, resetting both the tree
    /// and `total_size`. The staging buffer is reset separately via
    /// [`reset_buffer`](Self::reset_buffer) since its lifetime is scoped to
    /// a single flush, not to the memtable's.
    pub fn clear(&mut self) {
        self.tree.reset();
        self.total_size = 0;
    }

    // ---- Flush-scratch staging buffer ----
    //
    // Fixed-capacity scratch space used only during flush, carrying no
    // tree state of its own: it is scoped to a single flush invocation.
    // The flush pipeline in the `sstable` crate drives it through
    // `append`/`drain`.

    /// Resets the staging buffer cursor to the start of a fresh flush.
    pub fn reset_buffer(&mut self) {
        self.buf_len = 0;
    }

    /// Current number of bytes held in the staging buffer.
    #[must_use]
    pub fn buf_len(&self) -> usize {
        self.buf_len
    }

    /// Appends `data` to the staging buffer, invoking `seal` with the
    /// filled slice each time the buffer reaches [`MT_BUF_CAP`] capacity.
    /// `seal` is expected to compress and write out one frame; after it
    /// returns successfully the buffer cursor is rewound to zero.
    ///
    /// A single record is never split across two calls to `seal` -- the
    /// caller always passes one whole record's bytes per call, so frame
    /// boundaries never interrupt a record (matching the flush pipeline's
    /// requirement that records are appended atomically).
    pub fn append<E>(
        &mut self,
        mut data: &[u8],
        mut seal: impl FnMut(&[u8]) -> Result<(), E>,
    ) -> Result<(), E> {
        while !data.is_empty() {
            if MT_BUF_CAP - self.buf_len == 0 {
                seal(&self.buf[..self.buf_len])?;
                self.buf_len = 0;
            }
            let space = MT_BUF_CAP - self.buf_len;
            let take = data.len().min(space);
            self.buf[self.buf_len..self.buf_len + take].copy_from_slice(&data[..take]);
            self.buf_len += take;
            data = &data[take..];

            if self.buf_len == MT_BUF_CAP {
                seal(&self.buf[..self.buf_len])?;
                self.buf_len = 0;
            }
        }
        Ok(())
    }

    /// Seals whatever is left in the staging buffer, even a partial
    /// buffer, via `seal`. Called once at the end of a flush traversal.
    pub fn drain<E>(&mut self, mut seal: impl FnMut(&[u8]) -> Result<(), E>) -> Result<(), E> {
        if self.buf_len > 0 {
            seal(&self.buf[..self.buf_len])?;
            self.buf_len = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
