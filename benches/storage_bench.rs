//! Benchmarks for MeridianKV storage operations

use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use tempfile::TempDir;

use meridiankv::{Options, ReadOptions, WriteBatch, WriteOptions, DB};

fn open_db(dir: &TempDir) -> DB {
    let options = Options::builder()
        .create_if_missing(true)
        .write_buffer_size(8 * 1024 * 1024)
        .build();
    DB::open(dir.path(), options).unwrap()
}

fn bench_put(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let wopts = WriteOptions::default();

    let mut i = 0u64;
    c.bench_function("put_100b", |b| {
        b.iter(|| {
            i += 1;
            let key = format!("key{:012}", i);
            db.put(&wopts, key.as_bytes(), &[0x42; 100]).unwrap();
        })
    });
}

fn bench_get_hit(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let wopts = WriteOptions::default();
    for i in 0..10_000u64 {
        let key = format!("key{:012}", i);
        db.put(&wopts, key.as_bytes(), &[0x42; 100]).unwrap();
    }
    db.flush().unwrap();

    let ropts = ReadOptions::default();
    let mut i = 0u64;
    c.bench_function("get_hit", |b| {
        b.iter(|| {
            i = (i + 7919) % 10_000;
            let key = format!("key{:012}", i);
            db.get(&ropts, key.as_bytes()).unwrap();
        })
    });
}

fn bench_batch_write(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let wopts = WriteOptions::default();

    let mut i = 0u64;
    c.bench_function("write_batch_100", |b| {
        b.iter_batched(
            || {
                let mut batch = WriteBatch::new();
                for _ in 0..100 {
                    i += 1;
                    let key = format!("key{:012}", i);
                    batch.put(key.as_bytes(), &[0x42; 100]);
                }
                batch
            },
            |batch| db.write(&wopts, &batch).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

fn bench_scan(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir);
    let wopts = WriteOptions::default();
    for i in 0..10_000u64 {
        let key = format!("key{:012}", i);
        db.put(&wopts, key.as_bytes(), &[0x42; 100]).unwrap();
    }
    db.flush().unwrap();

    let ropts = ReadOptions::default();
    c.bench_function("scan_10k", |b| {
        b.iter(|| {
            let mut it = db.iter(&ropts);
            let mut n = 0usize;
            it.seek_to_first();
            while it.valid() {
                n += it.key().len();
                it.next();
            }
            n
        })
    });
}

criterion_group!(
    benches,
    bench_put,
    bench_get_hit,
    bench_batch_write,
    bench_scan
);
criterion_main!(benches);
