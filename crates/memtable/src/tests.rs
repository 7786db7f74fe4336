use super::*;

fn owned(bytes: &[u8]) -> ValueBytes {
    ValueBytes::Owned(bytes.to_vec())
}

// -------------------- Basic CRUD --------------------

#[test]
fn put_and_get_single_key() {
    let mut m = Memtable::with_capacity(16, true);
    assert!(m.put(1, owned(b"v1")));
    assert_eq!(m.len(), 1);
    assert_eq!(m.get(1).unwrap().as_slice(), b"v1");
}

#[test]
fn put_overwrites_existing_key() {
    let mut m = Memtable::with_capacity(16, true);
    m.put(1, owned(b"v1"));
    m.put(1, owned(b"v2"));
    assert_eq!(m.len(), 1);
    assert_eq!(m.get(1).unwrap().as_slice(), b"v2");
}

#[test]
fn get_missing_key_returns_none() {
    let m = Memtable::with_capacity(16, true);
    assert!(m.get(42).is_none());
}

#[test]
fn delete_creates_tombstone() {
    let mut m = Memtable::with_capacity(16, true);
    m.put(1, owned(b"v1"));
    assert!(m.delete(1));
    assert!(m.get(1).is_none());
    assert_eq!(m.len(), 1); // tombstone still occupies a node
}

#[test]
fn delete_missing_key_returns_false() {
    let mut m = Memtable::with_capacity(16, true);
    assert!(!m.delete(7));
}

#[test]
fn put_after_delete_resurrects_key() {
    let mut m = Memtable::with_capacity(16, true);
    m.put(1, owned(b"v1"));
    m.delete(1);
    assert!(m.get(1).is_none());
    m.put(1, owned(b"v2"));
    assert_eq!(m.get(1).unwrap().as_slice(), b"v2");
}

// -------------------- Capacity / headroom --------------------

#[test]
fn refuses_put_once_one_free_slot_remains() {
    // capacity 3 -> usable slots are indices 1 and 2; index 2 is held back
    // as headroom, so only one insert succeeds.
    let mut m = Memtable::with_capacity(3, true);
    assert!(m.put(1, owned(b"a")));
    assert!(!m.put(2, owned(b"b")));
    assert_eq!(m.len(), 1);
}

#[test]
fn overwrite_still_succeeds_once_headroom_is_reached() {
    let mut m = Memtable::with_capacity(3, true);
    m.put(1, owned(b"a"));
    assert!(m.put(1, owned(b"a2")));
    assert_eq!(m.get(1).unwrap().as_slice(), b"a2");
}

// -------------------- in_order --------------------

#[test]
fn in_order_yields_sorted_keys() {
    let mut m = Memtable::with_capacity(16, true);
    m.put(3, owned(b"3"));
    m.put(1, owned(b"1"));
    m.put(2, owned(b"2"));

    let keys: Vec<i64> = m.in_order().map(|e| e.key).collect();
    assert_eq!(keys, vec![1, 2, 3]);
}

#[test]
fn in_order_includes_tombstones() {
    let mut m = Memtable::with_capacity(16, true);
    m.put(1, owned(b"1"));
    m.delete(2);
    m.put(3, owned(b"3"));

    let entries: Vec<_> = m.in_order().collect();
    assert_eq!(entries.len(), 3);
    let mid = entries.iter().find(|e| e.key == 2).unwrap();
    assert!(mid.tombstone);
    assert!(mid.value.is_none());
}

#[test]
fn in_order_empty_memtable() {
    let m = Memtable::with_capacity(16, true);
    assert_eq!(m.in_order().count(), 0);
}

// -------------------- total_size tracking --------------------

#[test]
fn total_size_includes_key_and_value() {
    let mut m = Memtable::with_capacity(16, true);
    assert_eq!(m.total_size(), 0);
    m.put(1, owned(b"ccc"));
    assert_eq!(m.total_size(), std::mem::size_of::<i64>() + 3);
}

#[test]
fn total_size_grows_on_overwrite_rather_than_netting_out() {
    // total_size is a monotonic write-volume counter, not a live-footprint
    // gauge: it is only ever added to, matching the C original's
    // accumulate-on-write semantics.
    let mut m = Memtable::with_capacity(16, true);
    m.put(1, owned(b"aaa"));
    let after_first = m.total_size();
    m.put(1, owned(b"bb"));
    assert!(m.total_size() > after_first);
}

#[test]
fn total_size_unaffected_by_rejected_put() {
    let mut m = Memtable::with_capacity(3, true);
    m.put(1, owned(b"a"));
    let before = m.total_size();
    assert!(!m.put(2, owned(b"b")));
    assert_eq!(m.total_size(), before);
}

// -------------------- clear --------------------

#[test]
fn clear_resets_everything() {
    let mut m = Memtable::with_capacity(16, true);
    m.put(1, owned(b"1"));
    m.put(2, owned(b"2"));
    assert!(!m.is_empty());

    m.clear();
    assert_eq!(m.len(), 0);
    assert_eq!(m.total_size(), 0);
    assert!(m.is_empty());
    assert!(m.get(1).is_none());
}

#[test]
fn clear_then_reuse() {
    let mut m = Memtable::with_capacity(16, true);
    m.put(1, owned(b"old"));
    m.clear();
    assert!(m.put(1, owned(b"new")));
    assert_eq!(m.get(1).unwrap().as_slice(), b"new");
}

// -------------------- len / is_empty --------------------

#[test]
fn len_counts_tombstones() {
    let mut m = Memtable::with_capacity(16, true);
    m.put(1, owned(b"1"));
    m.delete(2);
    assert_eq!(m.len(), 2);
}

#[test]
fn is_empty_on_construction() {
    let m = Memtable::with_capacity(16, true);
    assert!(m.is_empty());
}

// -------------------- Stress --------------------

#[test]
fn many_distinct_keys_stay_sorted() {
    let mut m = Memtable::with_capacity(1200, true);
    for i in 0..1000i64 {
        assert!(m.put(i, owned(b"v")));
    }
    assert_eq!(m.len(), 1000);
    let keys: Vec<i64> = m.in_order().map(|e| e.key).collect();
    let mut sorted = keys.clone();
    sorted.sort_unstable();
    assert_eq!(keys, sorted);
}

#[test]
fn overwrite_same_key_many_times() {
    let mut m = Memtable::with_capacity(16, true);
    for i in 0..10_000 {
        m.put(1, owned(format!("v{}", i).as_bytes()));
    }
    assert_eq!(m.len(), 1);
    assert_eq!(m.get(1).unwrap().as_slice(), b"v9999");
}

#[test]
fn alternating_put_delete() {
    let mut m = Memtable::with_capacity(16, true);
    for _ in 0..1_000 {
        m.put(1, owned(b"v"));
        m.delete(1);
    }
    assert!(m.get(1).is_none());
    assert_eq!(m.len(), 1);
}

// -------------------- Edge cases --------------------

#[test]
fn empty_value() {
    let mut m = Memtable::with_capacity(16, true);
    m.put(1, owned(b""));
    assert!(m.get(1).unwrap().is_empty());
}

#[test]
fn negative_keys() {
    let mut m = Memtable::with_capacity(16, true);
    m.put(-1, owned(b"neg"));
    m.put(0, owned(b"zero"));
    m.put(1, owned(b"pos"));
    let keys: Vec<i64> = m.in_order().map(|e| e.key).collect();
    assert_eq!(keys, vec![-1, 0, 1]);
}

#[test]
fn large_value() {
    let mut m = Memtable::with_capacity(16, true);
    let val = vec![b'x'; 1_000_000];
    m.put(1, ValueBytes::Owned(val.clone()));
    assert_eq!(m.get(1).unwrap().len(), 1_000_000);
    assert_eq!(m.total_size(), std::mem::size_of::<i64>() + 1_000_000);
}

#[test]
fn shared_values_are_not_owned_by_the_tree() {
    use std::sync::Arc;
    let shared: Arc<[u8]> = Arc::from(&b"shared"[..]);
    let mut m = Memtable::with_capacity(16, false);
    assert!(m.put(1, ValueBytes::Shared(shared.clone())));
    assert_eq!(Arc::strong_count(&shared), 2);
    m.delete(1);
    assert_eq!(Arc::strong_count(&shared), 1);
}

// -------------------- Staging buffer (append / drain) --------------------

#[test]
fn append_below_capacity_does_not_seal() {
    let mut m = Memtable::with_capacity(16, true);
    let mut seals = 0u32;
    m.append::<std::convert::Infallible>(b"hello", |_| {
        seals += 1;
        Ok(())
    })
    .unwrap();
    assert_eq!(seals, 0);
    assert_eq!(m.buf_len(), 5);
}

#[test]
fn append_seals_exactly_at_capacity() {
    let mut m = Memtable::with_capacity(16, true);
    let data = vec![b'x'; MT_BUF_CAP];
    let mut sealed_lens = Vec::new();
    m.append::<std::convert::Infallible>(&data, |chunk| {
        sealed_lens.push(chunk.len());
        Ok(())
    })
    .unwrap();
    assert_eq!(sealed_lens, vec![MT_BUF_CAP]);
    assert_eq!(m.buf_len(), 0);
}

#[test]
fn append_splits_across_multiple_seals() {
    let mut m = Memtable::with_capacity(16, true);
    let data = vec![b'y'; MT_BUF_CAP * 2 + 10];
    let mut sealed_lens = Vec::new();
    m.append::<std::convert::Infallible>(&data, |chunk| {
        sealed_lens.push(chunk.len());
        Ok(())
    })
    .unwrap();
    assert_eq!(sealed_lens, vec![MT_BUF_CAP, MT_BUF_CAP]);
    assert_eq!(m.buf_len(), 10);
}

#[test]
fn drain_seals_partial_buffer() {
    let mut m = Memtable::with_capacity(16, true);
    m.append::<std::convert::Infallible>(b"partial", |_| Ok(())).unwrap();
    assert_eq!(m.buf_len(), 7);

    let mut sealed = None;
    m.drain::<std::convert::Infallible>(|chunk| {
        sealed = Some(chunk.to_vec());
        Ok(())
    })
    .unwrap();
    assert_eq!(sealed, Some(b"partial".to_vec()));
    assert_eq!(m.buf_len(), 0);
}

#[test]
fn drain_on_empty_buffer_does_not_seal() {
    let mut m = Memtable::with_capacity(16, true);
    let mut seals = 0u32;
    m.drain::<std::convert::Infallible>(|_| {
        seals += 1;
        Ok(())
    })
    .unwrap();
    assert_eq!(seals, 0);
}

#[test]
fn reset_buffer_discards_pending_bytes() {
    let mut m = Memtable::with_capacity(16, true);
    m.append::<std::convert::Infallible>(b"abc", |_| Ok(())).unwrap();
    assert_eq!(m.buf_len(), 3);
    m.reset_buffer();
    assert_eq!(m.buf_len(), 0);
}

#[test]
fn append_propagates_seal_error() {
    let mut m = Memtable::with_capacity(16, true);
    let data = vec![b'z'; MT_BUF_CAP + 1];
    let result = m.append(&data, |_| Err("boom"));
    assert_eq!(result, Err("boom"));
}
