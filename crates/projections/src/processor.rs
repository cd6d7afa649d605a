//! Projection processor for feeding events to projections.

use event_store::{EventEnvelope, EventStore, Position};
use futures_util::StreamExt;
use tokio::sync::Mutex;

use crate::Result;
use crate::projection::Projection;

/// Events fetched per round trip during catch-up.
const BATCH_SIZE: usize = 500;

/// Processes events from an event store and delivers them to projections.
///
/// The processor supports:
/// - Catch-up: reads events after the slowest projection's position
/// - Single event delivery to projections that have not seen it
/// - Rebuild: resets all projections and replays the whole log
///
/// Catch-up and rebuild are serialized, so the processor can be shared
/// between request handlers and background workers.
pub struct ProjectionProcessor<S: EventStore> {
    store: S,
    projections: Vec<Box<dyn Projection>>,
    running: Mutex<()>,
}

impl<S: EventStore> ProjectionProcessor<S> {
    /// Creates a new processor with the given event store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            projections: Vec::new(),
            running: Mutex::new(()),
        }
    }

    /// Registers a projection with this processor.
    pub fn register(&mut self, projection: Box<dyn Projection>) {
        self.projections.push(projection);
    }

    /// Returns the number of registered projections.
    pub fn projection_count(&self) -> usize {
        self.projections.len()
    }

    /// Brings every projection up to the end of the log and returns the number
    /// of events delivered.
    #[tracing::instrument(skip(self))]
    pub async fn run_catch_up(&self) -> Result<u64> {
        let _running = self.running.lock().await;

        let mut after = self.slowest_position().await;
        let mut delivered = 0;

        loop {
            let batch = self.store.events_after(after, BATCH_SIZE).await?;
            let Some(last) = batch.last() else {
                break;
            };
            after = last.position;

            for event in &batch {
                delivered += self.deliver(event).await?;
            }

            if batch.len() < BATCH_SIZE {
                break;
            }
        }

        if delivered > 0 {
            tracing::debug!(delivered, position = %after, "catch-up complete");
        }

        Ok(delivered)
    }

    /// Delivers a stored event to the projections that have not handled it.
    #[tracing::instrument(skip(self, event), fields(event_type = %event.event_type, position = %event.position))]
    pub async fn process_event(&self, event: &EventEnvelope) -> Result<()> {
        self.deliver(event).await?;
        Ok(())
    }

    /// Resets all projections and replays all events from the store.
    #[tracing::instrument(skip(self))]
    pub async fn rebuild_all(&self) -> Result<u64> {
        let _running = self.running.lock().await;

        for projection in &self.projections {
            projection.reset().await?;
        }

        let mut stream = self.store.stream_all_events().await?;
        let mut delivered = 0;
        while let Some(result) = stream.next().await {
            delivered += self.deliver(&result?).await?;
        }

        tracing::info!(delivered, projections = self.projections.len(), "rebuild complete");
        Ok(delivered)
    }

    async fn slowest_position(&self) -> Position {
        let mut slowest: Option<Position> = None;
        for projection in &self.projections {
            let last = projection.position().await.last;
            slowest = Some(slowest.map_or(last, |s| s.min(last)));
        }
        slowest.unwrap_or_else(Position::start)
    }

    async fn deliver(&self, event: &EventEnvelope) -> Result<u64> {
        let mut delivered = 0;
        for projection in &self.projections {
            if projection.position().await.is_behind(event.position) {
                projection.handle(event).await?;
                metrics::counter!("projections_events_processed", "projection" => projection.name())
                    .increment(1);
                delivered += 1;
            }
        }
        Ok(delivered)
    }
}
