//! Append-only event log.
//!
//! Every order, ticket and participant is stored as a stream of events keyed
//! by its [`AggregateId`]. Appends are guarded by optimistic concurrency on the
//! stream version and, optionally, by a store-wide idempotency key so that a
//! redelivered webhook can never be applied twice.

pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventEnvelope, EventEnvelopeBuilder, EventId, Position, Version};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{AppendOptions, EventStore, EventStoreExt, EventStream};
