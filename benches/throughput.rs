//! Outbound queue throughput: lines enqueued by producers until the writer
//! task has flushed them into a sink.

use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use nuclearbot::OutboundQueue;
use tmi_proto::outbound;

const BATCHES: [usize; 3] = [1, 16, 48];

fn queue_flush_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();
    let line = outbound::privmsg("bench", "Hello, world! This is a typical chat reply.");

    let mut group = c.benchmark_group("outbound_queue");
    for batch in BATCHES {
        group.throughput(Throughput::Elements(batch as u64));
        group.bench_with_input(BenchmarkId::new("flush", batch), &batch, |b, &batch| {
            b.to_async(&runtime).iter(|| {
                let line = line.clone();
                async move {
                    let mut queue = OutboundQueue::new(tokio::io::sink(), 64);
                    queue.start("bench");
                    for _ in 0..batch {
                        queue.enqueue(line.clone()).unwrap();
                    }
                    assert!(queue.wait_idle(Duration::from_secs(1)).await);
                    queue.stop().await;
                }
            })
        });
    }
    group.finish();
}

fn enqueue_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    c.bench_function("enqueue_only", |b| {
        b.to_async(&runtime).iter(|| async {
            // Writer never started: measures the producer side alone
            let queue = OutboundQueue::new(tokio::io::sink(), 64);
            for i in 0..48 {
                queue.enqueue(outbound::pong(&i.to_string())).unwrap();
            }
            queue.stop().await;
        })
    });
}

criterion_group!(benches, queue_flush_benchmark, enqueue_benchmark);
criterion_main!(benches);
