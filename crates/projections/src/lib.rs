//! Read models fed from the event log.
//!
//! - [`Projection`] trait for processing events into read models
//! - [`ProjectionProcessor`] for catching projections up by global position
//! - [`PendingOrdersView`] for held capacity and overdue orders
//! - [`TicketSalesView`] for sales and attendance counters

pub mod error;
pub mod processor;
pub mod projection;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use views::{
    ParticipantAttendance, PendingOrder, PendingOrdersView, SalesSnapshot, TicketSalesView,
    TicketTypeSales,
};
