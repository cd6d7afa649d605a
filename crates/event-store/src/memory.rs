use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{
    AggregateId, EventEnvelope, EventStoreError, Position, Result, Version,
    store::{AppendOptions, EventStore, EventStream, validate_events_for_append},
};

#[derive(Default)]
struct Log {
    /// Events in position order.
    events: Vec<EventEnvelope>,
    idempotency_keys: HashSet<String>,
}

impl Log {
    fn stream_version(&self, aggregate_id: AggregateId) -> Option<Version> {
        self.events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .map(|e| e.version)
            .max()
    }
}

/// In-memory event store for tests and local development.
///
/// Behaves like [`crate::PostgresEventStore`]: the version check, the
/// idempotency check and the write happen under one lock, so concurrent
/// appends to the same stream serialize exactly as they do in the database.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    log: Arc<RwLock<Log>>,
}

impl InMemoryEventStore {
    /// Creates a new empty in-memory event store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.log.read().await.events.len()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(
        &self,
        mut events: Vec<EventEnvelope>,
        options: AppendOptions,
    ) -> Result<Version> {
        validate_events_for_append(&events)?;

        let aggregate_id = events[0].aggregate_id;
        let mut log = self.log.write().await;

        if let Some(key) = &options.idempotency_key
            && log.idempotency_keys.contains(key)
        {
            return Err(EventStoreError::DuplicateIdempotencyKey(key.clone()));
        }

        let current_version = log.stream_version(aggregate_id).unwrap_or(Version::initial());

        if let Some(expected) = options.expected_version
            && current_version != expected
        {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected,
                actual: current_version,
            });
        }

        // Mirrors the unique (aggregate_id, version) constraint.
        if events[0].version != current_version.next() {
            return Err(EventStoreError::ConcurrencyConflict {
                aggregate_id,
                expected: events[0].version,
                actual: current_version,
            });
        }

        let mut position = log.events.last().map(|e| e.position).unwrap_or_default();
        for event in &mut events {
            position = Position::new(position.as_i64() + 1);
            event.position = position;
        }

        let last_version = events
            .last()
            .map(|e| e.version)
            .unwrap_or(current_version);
        log.events.extend(events);
        if let Some(key) = options.idempotency_key {
            log.idempotency_keys.insert(key);
        }

        Ok(last_version)
    }

    async fn get_events_for_aggregate(
        &self,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        let mut events: Vec<_> = log
            .events
            .iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn get_aggregate_version(&self, aggregate_id: AggregateId) -> Result<Option<Version>> {
        Ok(self.log.read().await.stream_version(aggregate_id))
    }

    async fn events_after(&self, after: Position, limit: usize) -> Result<Vec<EventEnvelope>> {
        let log = self.log.read().await;
        Ok(log
            .events
            .iter()
            .filter(|e| e.position > after)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn stream_all_events(&self) -> Result<EventStream> {
        let events = self.log.read().await.events.clone();
        Ok(Box::pin(futures_util::stream::iter(
            events.into_iter().map(Ok),
        )))
    }

    async fn has_idempotency_key(&self, key: &str) -> Result<bool> {
        Ok(self.log.read().await.idempotency_keys.contains(key))
    }
}
