//! Command handling infrastructure.

use std::marker::PhantomData;

use common::AggregateId;
use event_store::{AppendOptions, EventEnvelope, EventStore, Version};

use crate::aggregate::{Aggregate, DomainEvent};
use crate::error::DomainError;

/// Result of command execution.
#[derive(Debug)]
pub struct CommandResult<A: Aggregate> {
    /// The aggregate after applying the new events.
    pub aggregate: A,

    /// The events that were generated and persisted.
    pub events: Vec<A::Event>,

    /// The new version of the aggregate after the command.
    pub new_version: Version,
}

/// Trait for commands that can be executed against an aggregate.
pub trait Command: Send + Sync {
    /// The type of aggregate this command targets.
    type Aggregate: Aggregate;

    /// Returns the ID of the aggregate this command targets.
    fn aggregate_id(&self) -> AggregateId;
}

/// Extra information attached to the events a command records.
#[derive(Debug, Clone, Default)]
pub struct CommandContext {
    /// Store-wide key; a second command carrying the same key writes nothing
    /// and fails with `DuplicateIdempotencyKey`.
    pub idempotency_key: Option<String>,

    /// Id of the request or webhook delivery that caused the command.
    pub correlation_id: Option<String>,
}

impl CommandContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }
}

/// Loads an aggregate, runs a command against it and appends the resulting
/// events with optimistic concurrency.
pub struct CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    store: S,
    _phantom: PhantomData<A>,
}

impl<S, A> CommandHandler<S, A>
where
    S: EventStore,
    A: Aggregate,
{
    /// Creates a new command handler with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            _phantom: PhantomData,
        }
    }

    /// Returns a reference to the underlying event store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Rebuilds an aggregate from its stream.
    ///
    /// A stream with no events yields `A::default()`.
    pub async fn load(&self, aggregate_id: AggregateId) -> Result<A, DomainError> {
        let envelopes = self.store.get_events_for_aggregate(aggregate_id).await?;

        let mut aggregate = A::default();
        for envelope in envelopes {
            let event: A::Event = serde_json::from_value(envelope.payload)?;
            aggregate.apply(event);
            aggregate.set_version(envelope.version);
        }

        Ok(aggregate)
    }

    /// Loads an aggregate, returning None if it doesn't exist.
    pub async fn load_existing(&self, aggregate_id: AggregateId) -> Result<Option<A>, DomainError> {
        let aggregate = self.load(aggregate_id).await?;
        Ok(aggregate.exists().then_some(aggregate))
    }

    /// Executes a command and persists the resulting events.
    ///
    /// The command function receives the current aggregate state and returns
    /// either a list of events to apply, or an error.
    pub async fn execute<F>(
        &self,
        aggregate_id: AggregateId,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        self.execute_with(aggregate_id, CommandContext::default(), command_fn)
            .await
    }

    /// Like [`CommandHandler::execute`], recording `context` with the events.
    pub async fn execute_with<F>(
        &self,
        aggregate_id: AggregateId,
        context: CommandContext,
        command_fn: F,
    ) -> Result<CommandResult<A>, DomainError>
    where
        F: FnOnce(&A) -> Result<Vec<A::Event>, A::Error>,
        DomainError: From<A::Error>,
    {
        let mut aggregate = self.load(aggregate_id).await?;
        let current_version = aggregate.version();

        let events = command_fn(&aggregate)?;

        if events.is_empty() {
            return Ok(CommandResult {
                aggregate,
                events: vec![],
                new_version: current_version,
            });
        }

        let envelopes = self.build_envelopes(
            aggregate_id,
            current_version,
            &events,
            context.correlation_id.as_deref(),
        )?;

        let mut options = AppendOptions::expect_version(current_version);
        options.idempotency_key = context.idempotency_key;

        let new_version = self.store.append(envelopes, options).await?;

        for event in &events {
            aggregate.apply(event.clone());
        }
        aggregate.set_version(new_version);

        Ok(CommandResult {
            aggregate,
            events,
            new_version,
        })
    }

    fn build_envelopes(
        &self,
        aggregate_id: AggregateId,
        current_version: Version,
        events: &[A::Event],
        correlation_id: Option<&str>,
    ) -> Result<Vec<EventEnvelope>, DomainError> {
        let mut envelopes = Vec::with_capacity(events.len());
        let mut version = current_version;

        for event in events {
            version = version.next();
            let mut builder = EventEnvelope::builder()
                .aggregate_id(aggregate_id)
                .aggregate_type(A::aggregate_type())
                .event_type(event.event_type())
                .version(version)
                .payload(event)?;
            if let Some(id) = correlation_id {
                builder = builder.correlation_id(id);
            }
            envelopes.push(builder.build()?);
        }

        Ok(envelopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::{EventStoreError, InMemoryEventStore};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum SeatEvent {
        Claimed { id: AggregateId, holder: String },
        Released,
    }

    impl DomainEvent for SeatEvent {
        fn event_type(&self) -> &'static str {
            match self {
                SeatEvent::Claimed { .. } => "SeatClaimed",
                SeatEvent::Released => "SeatReleased",
            }
        }
    }

    #[derive(Debug, Default)]
    struct Seat {
        id: Option<AggregateId>,
        holder: Option<String>,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("seat is free")]
    struct SeatFree;

    impl Aggregate for Seat {
        type Event = SeatEvent;
        type Error = SeatFree;

        fn aggregate_type() -> &'static str {
            "Seat"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                SeatEvent::Claimed { id, holder } => {
                    self.id = Some(id);
                    self.holder = Some(holder);
                }
                SeatEvent::Released => self.holder = None,
            }
        }
    }

    impl From<SeatFree> for DomainError {
        fn from(_: SeatFree) -> Self {
            DomainError::AggregateNotFound {
                aggregate_type: "Seat",
                aggregate_id: String::new(),
            }
        }
    }

    fn claim(id: AggregateId) -> impl FnOnce(&Seat) -> Result<Vec<SeatEvent>, SeatFree> {
        move |_| {
            Ok(vec![SeatEvent::Claimed {
                id,
                holder: "Ada".to_string(),
            }])
        }
    }

    #[tokio::test]
    async fn execute_creates_aggregate() {
        let handler: CommandHandler<_, Seat> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();

        let result = handler.execute(id, claim(id)).await.unwrap();

        assert_eq!(result.events.len(), 1);
        assert_eq!(result.new_version, Version::first());
        assert_eq!(result.aggregate.holder.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn execute_updates_existing_aggregate() {
        let handler: CommandHandler<_, Seat> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();
        handler.execute(id, claim(id)).await.unwrap();

        let result = handler
            .execute(id, |seat| {
                if seat.holder.is_none() {
                    return Err(SeatFree);
                }
                Ok(vec![SeatEvent::Released])
            })
            .await
            .unwrap();

        assert_eq!(result.new_version, Version::new(2));
        assert!(result.aggregate.holder.is_none());
    }

    #[tokio::test]
    async fn rejected_command_writes_nothing() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Seat> = CommandHandler::new(store.clone());

        let result = handler.execute(AggregateId::new(), |_| Err(SeatFree)).await;

        assert!(result.is_err());
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn load_existing_distinguishes_missing_streams() {
        let handler: CommandHandler<_, Seat> = CommandHandler::new(InMemoryEventStore::new());
        let id = AggregateId::new();

        assert!(handler.load_existing(id).await.unwrap().is_none());

        handler.execute(id, claim(id)).await.unwrap();
        let seat = handler.load_existing(id).await.unwrap().unwrap();
        assert_eq!(seat.version(), Version::first());
    }

    #[tokio::test]
    async fn empty_events_returns_without_persisting() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Seat> = CommandHandler::new(store.clone());

        let result = handler
            .execute(AggregateId::new(), |_| Ok(vec![]))
            .await
            .unwrap();

        assert!(result.events.is_empty());
        assert_eq!(result.new_version, Version::initial());
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn context_records_correlation_and_idempotency_key() {
        let store = InMemoryEventStore::new();
        let handler: CommandHandler<_, Seat> = CommandHandler::new(store.clone());
        let id = AggregateId::new();
        let context = CommandContext::new()
            .idempotency_key("evt_1")
            .correlation_id("evt_1");

        handler
            .execute_with(id, context.clone(), claim(id))
            .await
            .unwrap();

        let stored = store.get_events_for_aggregate(id).await.unwrap();
        assert_eq!(stored[0].correlation_id(), Some("evt_1"));

        let err = handler
            .execute_with(id, context, |_| Ok(vec![SeatEvent::Released]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::EventStore(EventStoreError::DuplicateIdempotencyKey(_))
        ));
        assert_eq!(store.event_count().await, 1);
    }
}
