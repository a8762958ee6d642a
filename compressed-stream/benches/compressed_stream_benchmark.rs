use compressed_stream::{BackendKind, CompressedStream};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

const PAYLOAD_SIZE: usize = 4 * 1024 * 1024;
const CHUNK_SIZE: usize = 32 * 1024;

fn payload() -> Vec<u8> {
    (0..PAYLOAD_SIZE).map(|i| ((i / 64) % 251) as u8).collect()
}

// Writes the payload through each backend, then reads it back.
fn bench_backends(c: &mut Criterion) {
    let data = payload();
    let dir = tempfile::tempdir().unwrap();

    for kind in [BackendKind::None, BackendKind::Zlib, BackendKind::Zstd, BackendKind::Lz4] {
        let mut group = c.benchmark_group(format!("Compressed Stream - {}", kind));
        group.sample_size(10);
        group.throughput(Throughput::Bytes(PAYLOAD_SIZE as u64));

        let path = dir.path().join(format!("bench_{}.tmp", kind));

        group.bench_function("write", |b| {
            b.iter(|| {
                let mut stream = CompressedStream::create_path(&path, kind, 0).unwrap();
                for chunk in data.chunks(CHUNK_SIZE) {
                    stream.write(black_box(chunk)).unwrap();
                }
                stream.close().unwrap();
            });
        });

        group.bench_function("read", |b| {
            b.iter(|| {
                let mut stream = CompressedStream::open_path(&path, kind).unwrap();
                let mut buf = vec![0u8; CHUNK_SIZE];
                let mut total = 0;
                loop {
                    let n = stream.read(&mut buf).unwrap();
                    if n == 0 {
                        break;
                    }
                    total += n;
                }
                black_box(total)
            });
        });

        group.finish();
    }
}

criterion_group!(benches, bench_backends);
criterion_main!(benches);
