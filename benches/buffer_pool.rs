//! Buffer pool benchmarks.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use heapstore::{
    BufferPool, Catalog, Field, FieldType, HeapFile, PageId, Permissions, Schema, TransactionId,
    Tuple, TupleIterator,
};
use tempfile::{tempdir, TempDir};

fn setup(rows: i32) -> (BufferPool, Arc<HeapFile>, TempDir) {
    let dir = tempdir().unwrap();
    let schema = Schema::from_types(&[FieldType::Int, FieldType::Int]);
    let file = Arc::new(HeapFile::create(dir.path().join("bench.dat"), schema, 4096).unwrap());

    let catalog = Arc::new(Catalog::new());
    catalog.add_table(Arc::clone(&file), "bench", "");
    let pool = BufferPool::new(64, catalog);

    let tid = TransactionId::new();
    for i in 0..rows {
        let mut t = Tuple::new(vec![Field::Int(i), Field::Int(i)]);
        pool.insert_tuple(tid, file.id(), &mut t).unwrap();
    }
    pool.transaction_complete(tid, true).unwrap();

    (pool, file, dir)
}

fn fetch_hit_benchmark(c: &mut Criterion) {
    let (pool, file, _dir) = setup(10);
    let pid = PageId::new(file.id(), 0);
    let tid = TransactionId::new();

    c.bench_function("fetch_hit", |b| {
        b.iter(|| black_box(pool.fetch(tid, pid, Permissions::ReadOnly).unwrap()))
    });
}

fn scan_benchmark(c: &mut Criterion) {
    let (pool, file, _dir) = setup(5_000);

    c.bench_function("scan_5000", |b| {
        b.iter(|| {
            let tid = TransactionId::new();
            let mut it = file.iter(&pool, tid);
            it.open().unwrap();
            let mut n = 0;
            while it.next_tuple().unwrap().is_some() {
                n += 1;
            }
            pool.transaction_complete(tid, true).unwrap();
            black_box(n)
        })
    });
}

fn insert_commit_benchmark(c: &mut Criterion) {
    let (pool, file, _dir) = setup(0);

    c.bench_function("insert_100_commit", |b| {
        b.iter(|| {
            let tid = TransactionId::new();
            for i in 0..100 {
                let mut t = Tuple::new(vec![Field::Int(i), Field::Int(i)]);
                pool.insert_tuple(tid, file.id(), &mut t).unwrap();
            }
            pool.transaction_complete(tid, true).unwrap();
        })
    });
}

criterion_group!(
    benches,
    fetch_hit_benchmark,
    scan_benchmark,
    insert_commit_benchmark
);
criterion_main!(benches);
