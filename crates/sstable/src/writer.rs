//! The flush pipeline: turns one [`Memtable`] into one immutable segment
//! file, plus the in-memory artifacts (`SSTable` sparse index, `Bloom`
//! filter) the facade retains for that segment.

use anyhow::Context;
use bloom::Bloom;
use memtable::Memtable;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::format::{self, SSTable, BLOCK_SIZE, KEY_SIZE};

/// Artifacts produced by flushing one memtable generation to a segment.
pub struct FlushOutcome {
    /// Sparse block index for the segment just written.
    pub sstable: SSTable,
    /// Bloom filter over every non-tombstoned key in the segment.
    pub bloom: Bloom,
    /// Total bytes actually written to the segment file (frame headers
    /// plus compressed payloads).
    pub bytes_written: u64,
}

/// A flush failure, tagged by whether the segment file was ever
/// successfully opened.
///
/// The facade's counter-advance policy depends on this distinction: an
/// [`Open`](FlushFailure::Open) failure must not advance `next_segment_id`
/// (the id is unused, retry with the same one), while a
/// [`PostOpen`](FlushFailure::PostOpen) failure still advances it,
/// guaranteeing a fresh id on retry even though this segment's file may be
/// left truncated or corrupt on disk.
#[derive(Debug)]
pub enum FlushFailure {
    /// Failed before or while opening the segment file (or its directory).
    Open(anyhow::Error),
    /// Failed after the segment file was created.
    PostOpen(anyhow::Error),
}

impl std::fmt::Display for FlushFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushFailure::Open(e) => write!(f, "segment open failed: {:#}", e),
            FlushFailure::PostOpen(e) => write!(f, "segment write failed: {:#}", e),
        }
    }
}

impl std::error::Error for FlushFailure {}

/// Flushes `mem` to `segments_dir/segment_{id}.log`.
///
/// Returns `Ok(None)` without touching the filesystem when the tree backing
/// `mem` is empty (`root_idx == 0` or `length == 0`). Any I/O or
/// compression failure aborts the flush and is reported as a tagged
/// [`FlushFailure`] so the caller can apply the appropriate counter-advance
/// policy.
pub fn flush_memtable(
    mem: &mut Memtable,
    segments_dir: &Path,
    id: u64,
) -> Result<Option<FlushOutcome>, FlushFailure> {
    let length = mem.len();
    if length == 0 || mem.tree().root_idx() == 0 {
        return Ok(None);
    }

    std::fs::create_dir_all(segments_dir)
        .with_context(|| format!("creating segments directory {:?}", segments_dir))
        .map_err(FlushFailure::Open)?;
    let path = segments_dir.join(format!("segment_{}.log", id));
    let file = File::create(&path)
        .with_context(|| format!("opening segment file {:?}", path))
        .map_err(FlushFailure::Open)?;
    let mut segment = BufWriter::new(file);

    let outcome = flush_into(mem, &mut segment, length).map_err(FlushFailure::PostOpen)?;

    segment
        .flush()
        .context("flushing segment writer")
        .map_err(FlushFailure::PostOpen)?;
    segment
        .into_inner()
        .map_err(|e| anyhow::Error::new(e.into_error()))
        .context("retrieving segment file handle")
        .map_err(FlushFailure::PostOpen)?
        .sync_all()
        .context("syncing segment file")
        .map_err(FlushFailure::PostOpen)?;

    log::debug!(
        "flushed segment {} ({} bytes, {} entries)",
        id,
        outcome.bytes_written,
        length
    );

    Ok(Some(outcome))
}

fn flush_into<W: Write>(
    mem: &mut Memtable,
    segment: &mut W,
    length: usize,
) -> anyhow::Result<FlushOutcome> {
    mem.reset_buffer();

    let expected_blocks = mem.total_size() / BLOCK_SIZE;
    let mut sstable = SSTable::with_expected_blocks(expected_blocks);
    let nbytes = length * KEY_SIZE;
    let mut bloom = Bloom::with_nbytes(nbytes, bloom::BLOOM_K);

    // Traversal must finish reading the tree before we can mutably borrow
    // `mem` again for the staging buffer, so the walk is materialized here
    // rather than interleaved with `append`.
    let entries: Vec<(i64, bool, Option<Vec<u8>>)> = mem
        .in_order()
        .map(|e| (e.key, e.tombstone, e.value.map(|v| v.as_slice().to_vec())))
        .collect();

    let mut stream_offset: u64 = 0;
    let mut next_boundary: u64 = 0;
    let mut bytes_written: u64 = 0;

    for (key, tombstone, value) in entries {
        if stream_offset >= next_boundary {
            sstable.push(key, stream_offset);
            next_boundary += BLOCK_SIZE as u64;
            while next_boundary <= stream_offset {
                next_boundary += BLOCK_SIZE as u64;
            }
        }

        let record_len: i32 = if tombstone {
            -1
        } else {
            value.as_ref().map_or(-1, |v| v.len() as i32)
        };

        mem.append(&key.to_ne_bytes(), |chunk| {
            format::write_frame(&mut *segment, chunk).map(|n| bytes_written += n)
        })
        .context("appending record key to staging buffer")?;
        mem.append(&record_len.to_ne_bytes(), |chunk| {
            format::write_frame(&mut *segment, chunk).map(|n| bytes_written += n)
        })
        .context("appending record length to staging buffer")?;
        stream_offset += KEY_SIZE as u64 + 4;

        if record_len > 0 {
            let v = value
                .as_ref()
                .context("flush: tombstone-free record with no value bytes")?;
            mem.append(v.as_slice(), |chunk| {
                format::write_frame(&mut *segment, chunk).map(|n| bytes_written += n)
            })
            .context("appending record payload to staging buffer")?;
            stream_offset += v.len() as u64;
        }

        if !tombstone {
            bloom.put(key);
        }
    }

    mem.drain(|chunk| format::write_frame(&mut *segment, chunk).map(|n| bytes_written += n))
        .context("sealing final partial frame")?;

    Ok(FlushOutcome {
        sstable,
        bloom,
        bytes_written,
    })
}
