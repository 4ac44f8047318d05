//! Performance benchmarks for frame matching and reading

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::time::Instant;
use tokio_test::io::Builder;

use bannerscan::{probe::builtin, Connection, FrameReader, Terminator};

fn banner(lines: usize) -> Vec<u8> {
    let mut data = Vec::new();
    for i in 0..lines {
        data.extend_from_slice(format!("notice line {} from the registry host\r\n", i).as_bytes());
    }
    data.extend_from_slice(b"RMI Registry 1099\r\n");
    data
}

/// Benchmark whole-buffer terminator matching
fn bench_terminator_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("terminator_matching");
    let definition = builtin::rmiregistry().unwrap();
    let terminator = &definition.steps[0].terminator;

    for lines in [0usize, 10, 100] {
        let data = banner(lines);
        group.bench_with_input(BenchmarkId::new("rmi_match", lines), &data, |b, data| {
            b.iter(|| black_box(terminator.match_frame(black_box(data))))
        });
    }

    let line = Terminator::line().unwrap();
    let partial = vec![b'a'; 4096];
    group.bench_function("line_no_match_4k", |b| {
        b.iter(|| black_box(line.is_match(black_box(&partial))))
    });

    group.finish();
}

/// Benchmark reading a frame delivered in chunks of various sizes
fn bench_chunked_read(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("chunked_read");
    let terminator = Terminator::new(r"(?-u)(?:.*\r?\n)*RMI Registry (?P<status_code>[0-9]+)\r?\n").unwrap();
    let data = banner(20);

    for chunk in [1usize, 16, 256] {
        group.bench_with_input(BenchmarkId::new("rmi", chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                rt.block_on(async {
                    let mut builder = Builder::new();
                    for part in data.chunks(chunk) {
                        builder.read(part);
                    }
                    let mut conn =
                        Connection::new(builder.build(), Instant::now() + Duration::from_secs(5), 10_000);
                    let deadline = conn.deadline();
                    black_box(FrameReader::read_frame(&mut conn, &terminator, deadline).await.unwrap())
                })
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_terminator_matching, bench_chunked_read);
criterion_main!(benches);
