use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use event_queue::{Broker, EventQueue, InMemoryBroker, QueueConfig};
use mediator::Message;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StockLow {
    product_id: String,
    stock: u32,
}

impl Message for StockLow {
    const NAME: &'static str = "ProductStockLow";
}

fn event(i: u32) -> StockLow {
    StockLow {
        product_id: format!("product-{i}"),
        stock: i,
    }
}

fn bench_enqueue_single(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_queue/enqueue_single", |b| {
        b.iter(|| {
            rt.block_on(async {
                let queue = EventQueue::new(InMemoryBroker::new(), &QueueConfig::default());
                queue.enqueue(&event(1)).await.unwrap();
            });
        });
    });
}

fn bench_enqueue_batch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("event_queue/enqueue_in_batch");

    for size in [10u32, 100] {
        let events: Vec<StockLow> = (0..size).map(event).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &events, |b, events| {
            b.iter(|| {
                rt.block_on(async {
                    let queue = EventQueue::new(InMemoryBroker::new(), &QueueConfig::default());
                    queue.enqueue_in_batch(events).await.unwrap();
                });
            });
        });
    }

    group.finish();
}

fn bench_claim_and_complete(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_queue/claim_and_complete_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                let broker = InMemoryBroker::new();
                let queue = EventQueue::new(broker.clone(), &QueueConfig::default());
                let events: Vec<StockLow> = (0..100).map(event).collect();
                queue.enqueue_in_batch(&events).await.unwrap();

                while let Some(job) = broker.fetch_next().await.unwrap() {
                    broker.complete(job.id).await.unwrap();
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_enqueue_single,
    bench_enqueue_batch,
    bench_claim_and_complete
);
criterion_main!(benches);
