use common::AggregateId;
use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{
    AppendOptions, EventEnvelope, EventStore, InMemoryEventStore, Position, Version,
};

fn ticket_issued(ticket_id: AggregateId) -> EventEnvelope {
    EventEnvelope::builder()
        .aggregate_id(ticket_id)
        .aggregate_type("Ticket")
        .event_type("TicketIssued")
        .version(Version::first())
        .payload_raw(serde_json::json!({
            "type": "TicketIssued",
            "data": {
                "ticket_id": ticket_id.to_string(),
                "ticket_type_id": "general",
                "holder_name": "Bench Holder"
            }
        }))
        .build()
        .unwrap()
}

fn bench_issue_ticket_stream(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/append_expect_new", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryEventStore::new();
                let ticket_id = AggregateId::new();
                store
                    .append(vec![ticket_issued(ticket_id)], AppendOptions::expect_new())
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_idempotent_append(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(async {
        store
            .append(
                vec![ticket_issued(AggregateId::new())],
                AppendOptions::expect_new().with_idempotency_key("evt_bench"),
            )
            .await
            .unwrap();
    });

    c.bench_function("event_store/duplicate_idempotency_key", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = store
                    .append(
                        vec![ticket_issued(AggregateId::new())],
                        AppendOptions::expect_new().with_idempotency_key("evt_bench"),
                    )
                    .await;
                assert!(result.is_err());
            });
        });
    });
}

fn bench_events_after(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryEventStore::new();
    rt.block_on(async {
        for _ in 0..1_000 {
            store
                .append(
                    vec![ticket_issued(AggregateId::new())],
                    AppendOptions::expect_new(),
                )
                .await
                .unwrap();
        }
    });

    c.bench_function("event_store/events_after_page_100", |b| {
        b.iter(|| {
            rt.block_on(async {
                store.events_after(Position::new(500), 100).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_issue_ticket_stream,
    bench_idempotent_append,
    bench_events_after,
);
criterion_main!(benches);
