//! Core projection trait and position tracking.

use async_trait::async_trait;
use event_store::{EventEnvelope, Position};

use crate::Result;

/// How far into the event log a projection has read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionPosition {
    /// Global position of the last event handled.
    pub last: Position,

    /// Number of events handled since the last reset.
    pub events_processed: u64,
}

impl ProjectionPosition {
    /// Creates a position before the first event.
    pub fn zero() -> Self {
        Self {
            last: Position::start(),
            events_processed: 0,
        }
    }

    /// Advances past the event at `position`.
    pub fn advance(&self, position: Position) -> Self {
        Self {
            last: position,
            events_processed: self.events_processed + 1,
        }
    }

    /// True if the event at `position` has not been handled yet.
    pub fn is_behind(&self, position: Position) -> bool {
        self.last < position
    }
}

impl std::fmt::Display for ProjectionPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "position({}, {} events)", self.last, self.events_processed)
    }
}

/// A projection that processes events and updates a read model.
///
/// Implementations advance their own position in `handle`, including for
/// events they do not care about, so catch-up never re-delivers them.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Returns the name of this projection.
    fn name(&self) -> &'static str;

    /// Handles a single event, updating the projection's read model.
    async fn handle(&self, event: &EventEnvelope) -> Result<()>;

    /// Returns the current position of this projection.
    async fn position(&self) -> ProjectionPosition;

    /// Resets the projection to its initial state.
    async fn reset(&self) -> Result<()>;
}
