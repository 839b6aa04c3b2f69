//! # Dispatch Benchmarks
//!
//! | Path | What is measured |
//! |------|------------------|
//! | push fan-out | one inbound push delivered to N subscribers |
//! | request round trip | emit, response, single-shot completion |
//! | dangling drop | inbound response nobody waits for |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use duplex_mux::{
    ActionOptions, Channel, ChannelConfig, MemoryTransport, RequestOptions, ResponseEnvelope,
    RequestId, SequentialIdGenerator, Verb,
};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

const EVENT: &str = "bench";

fn open() -> (Arc<MemoryTransport>, Channel) {
    let transport = Arc::new(MemoryTransport::new());
    let channel = Channel::open_with_ids(
        transport.clone(),
        ChannelConfig::for_event(EVENT),
        Arc::new(SequentialIdGenerator::new("b")),
    )
    .expect("channel opens");
    (transport, channel)
}

fn bench_push_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("push-fan-out");

    for subscribers in [1usize, 10, 100] {
        let (transport, channel) = open();
        let hits = Arc::new(AtomicU64::new(0));
        for _ in 0..subscribers {
            let hits = hits.clone();
            channel
                .subscribe(ActionOptions::new("ticket.updated"), move |_: &ResponseEnvelope| {
                    hits.fetch_add(1, Ordering::Relaxed);
                })
                .expect("subscribe");
        }

        group.throughput(Throughput::Elements(subscribers as u64));
        group.bench_with_input(
            BenchmarkId::new("subscribers", subscribers),
            &subscribers,
            |b, _| {
                b.iter(|| {
                    black_box(transport.push(EVENT, "ticket.updated", json!({"id": 1})));
                })
            },
        );
    }

    group.finish();
}

fn bench_request_round_trip(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime");
    let (transport, channel) = open();

    c.bench_function("request-round-trip", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let pending = channel
                    .request::<serde_json::Value>(RequestOptions::new(Verb::Get, "ticket.fetch"))
                    .expect("request");
                let sent = transport.take_sent(EVENT);
                if let Some(request) = sent.last() {
                    transport.respond(EVENT, request, 200, json!({"id": 1}));
                }
                black_box(pending.await.expect("response"))
            })
        })
    });
}

fn bench_dangling_drop(c: &mut Criterion) {
    let (_transport, channel) = open();
    let dangling = ResponseEnvelope {
        method: Verb::Get,
        action: "ticket.fetch".to_string(),
        request_id: RequestId::new("gone"),
        status: 200,
        data: json!(null),
    };

    c.bench_function("dangling-drop", |b| {
        b.iter(|| black_box(channel.dispatcher().dispatch(&dangling)))
    });
}

criterion_group!(
    benches,
    bench_push_fan_out,
    bench_request_round_trip,
    bench_dangling_drop
);
criterion_main!(benches);
