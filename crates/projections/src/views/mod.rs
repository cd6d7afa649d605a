//! Read model views for the query side.

pub mod pending_orders;
pub mod ticket_sales;

pub use pending_orders::{PendingOrder, PendingOrdersView};
pub use ticket_sales::{ParticipantAttendance, SalesSnapshot, TicketSalesView, TicketTypeSales};
