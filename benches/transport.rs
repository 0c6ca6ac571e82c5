//! Benchmarks for the transport and queue hand-off
//!
//! Run with: cargo bench

use algoswitch::queue::BoundedQueue;
use algoswitch::transport::{read_frame, write_frame, Frame, ModeFlag};
use algoswitch::tuple::{SerializerFormat, Tuple, TupleKind, TupleValue};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::io::Cursor;
use std::sync::Arc;
use std::thread;

fn sample(seq: u64) -> Tuple {
    Tuple::new(
        seq,
        vec![
            TupleValue::from("AAPL"),
            TupleValue::from(101.25),
            TupleValue::from(seq as i64),
        ],
    )
}

fn bench_tuple_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("tuple_serialization");
    let tuple = sample(42);

    for format in [SerializerFormat::Bincode, SerializerFormat::Json] {
        let serializer = format.serializer(TupleKind::General);
        let bytes = serializer.serialize(&tuple).unwrap();
        let label = format!("{:?}", format).to_lowercase();

        group.bench_function(BenchmarkId::new("serialize", &label), |b| {
            b.iter(|| black_box(serializer.serialize(black_box(&tuple)).unwrap()));
        });
        group.bench_function(BenchmarkId::new("deserialize", &label), |b| {
            b.iter(|| black_box(serializer.deserialize(black_box(&bytes))));
        });
    }

    group.finish();
}

fn bench_frame_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_codec");

    for size in [64usize, 1024, 64 * 1024] {
        let frame = Frame::Data(vec![0xAB; size]);
        let mut encoded = Vec::with_capacity(size + 4);
        write_frame(&mut encoded, &frame).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("write", size), &frame, |b, frame| {
            let mut buf = Vec::with_capacity(size + 4);
            b.iter(|| {
                buf.clear();
                write_frame(&mut buf, black_box(frame)).unwrap();
            });
        });
        group.bench_with_input(BenchmarkId::new("read", size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut cursor = Cursor::new(encoded.as_slice());
                black_box(read_frame(&mut cursor, usize::MAX).unwrap())
            });
        });
    }

    let mode = Frame::Mode(ModeFlag::TemporaryQueue);
    group.bench_function("mode_frame_round_trip", |b| {
        let mut buf = Vec::with_capacity(20);
        b.iter(|| {
            buf.clear();
            write_frame(&mut buf, &mode).unwrap();
            black_box(read_frame(&mut Cursor::new(buf.as_slice()), usize::MAX).unwrap())
        });
    });

    group.finish();
}

fn bench_queue_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_handoff");
    let items = 10_000u64;
    group.throughput(Throughput::Elements(items));

    for capacity in [16usize, 1024] {
        group.bench_with_input(
            BenchmarkId::new("producer_consumer", capacity),
            &capacity,
            |b, &capacity| {
                b.iter(|| {
                    let queue = Arc::new(BoundedQueue::new(capacity));
                    let producer = {
                        let queue = queue.clone();
                        thread::spawn(move || {
                            for seq in 0..items {
                                queue.produce(sample(seq));
                            }
                        })
                    };
                    for _ in 0..items {
                        black_box(queue.consume());
                    }
                    producer.join().unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_tuple_serialization,
    bench_frame_codec,
    bench_queue_handoff
);
criterion_main!(benches);
