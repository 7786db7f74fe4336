use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use memtable::Memtable;
use rbtree::ValueBytes;
use sstable::flush_memtable;
use tempfile::tempdir;

const N_KEYS: i64 = 10_000;
const VALUE_SIZE: usize = 100;

fn build_memtable() -> Memtable {
    let mut mem = Memtable::with_capacity(N_KEYS as usize * 2 + 4, true);
    for i in 0..N_KEYS {
        mem.put(i, ValueBytes::Owned(vec![b'x'; VALUE_SIZE]));
    }
    mem
}

fn flush_benchmark(c: &mut Criterion) {
    c.bench_function("flush_memtable_10k", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let mem = build_memtable();
                (dir, mem)
            },
            |(dir, mut mem)| {
                flush_memtable(&mut mem, dir.path(), 0).unwrap();
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, flush_benchmark);
criterion_main!(benches);
