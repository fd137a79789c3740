//! Benchmarks for the replay path
//!
//! - Capture parsing throughput for captures of increasing length
//! - Scheduler ticking a full capture into the queue at different speeds
//! - Queue enqueue/drain hand-off
//!
//! Fixtures are generated in memory (see `paddock::test_utils`).

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use paddock::test_utils::{capture_at, timed_packets};
use paddock::{Capture, PlaybackScheduler, packet_queue};
use std::hint::black_box;
use std::time::Duration;

// 60Hz telemetry, one packet every ~16ms
fn race_offsets(count: u64) -> Vec<u64> {
    (0..count).map(|i| i * 16).collect()
}

fn bench_capture_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("capture_parsing");

    for count in [1_000u64, 10_000, 50_000] {
        let times: Vec<u64> = race_offsets(count).into_iter().map(|t| t + 13 * 3_600_000).collect();
        let bytes = capture_at(&times);

        group.throughput(Throughput::Elements(count));
        group.bench_function(BenchmarkId::new("records", count), |b| {
            b.iter(|| {
                let capture = Capture::from_reader(black_box(bytes.as_slice()));
                black_box(capture.len())
            })
        });
    }

    group.finish();
}

fn bench_scheduler_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_replay");
    let packets: std::sync::Arc<[_]> = timed_packets(&race_offsets(10_000)).into();

    for speed in [1u32, 10, 100] {
        group.throughput(Throughput::Elements(packets.len() as u64));
        group.bench_function(BenchmarkId::new("full_capture", format!("{}x", speed)), |b| {
            b.iter(|| {
                let (tx, mut rx) = packet_queue();
                let mut scheduler = PlaybackScheduler::new(packets.clone()).with_speed(speed);
                while !scheduler.is_exhausted() {
                    scheduler.tick(Duration::from_millis(50), &tx);
                    black_box(rx.drain().count());
                }
            })
        });
    }

    group.finish();
}

fn bench_queue_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue_handoff");
    let payload = vec![0u8; 1_347];

    for batch in [1usize, 64, 1024] {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_function(BenchmarkId::new("enqueue_drain", batch), |b| {
            let (tx, mut rx) = packet_queue();
            b.iter(|| {
                for _ in 0..batch {
                    tx.enqueue(payload.as_slice());
                }
                black_box(rx.drain().count())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_capture_parsing, bench_scheduler_replay, bench_queue_handoff);
criterion_main!(benches);
