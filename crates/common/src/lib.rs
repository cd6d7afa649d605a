//! Shared building blocks for the conference ticketing workspace.

pub mod clock;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use types::AggregateId;
