//! Domain layer for conference ticketing.
//!
//! This crate provides:
//! - Aggregate trait and the command handler that persists their events
//! - Order aggregate with the payment state machine
//! - Ticket and Participant aggregates with one-way check-in
//! - The ticket catalog, signed access codes and the check-in service

pub mod aggregate;
pub mod catalog;
pub mod checkin;
pub mod code;
pub mod command;
pub mod error;
pub mod order;
pub mod participant;
pub mod ticket;

pub use aggregate::{Aggregate, DomainEvent};
pub use catalog::{Catalog, CatalogError, InMemoryCatalog, TicketType, TicketTypeId};
pub use checkin::{CheckInError, CheckInService, CheckInView};
pub use code::{AccessCode, AccessCodeSigner, CodeError, CodeKind};
pub use command::{Command, CommandContext, CommandHandler, CommandResult};
pub use error::DomainError;
pub use order::{
    Buyer, CancelOrder, ConfirmPayment, Currency, ExpireOrder, IssueTickets, Money, Order,
    OrderError, OrderEvent, OrderLine, OrderService, OrderState, PlaceOrder, PlannedTicket,
    RecordLatePaymentRefund, RecordPaymentInitiation,
};
pub use participant::{
    Participant, ParticipantCheckedInData, ParticipantError, ParticipantEvent, ParticipantKind,
    ParticipantRegisteredData, ParticipantService, RegisterParticipant,
};
pub use ticket::{
    Issuance, Ticket, TicketCheckedInData, TicketError, TicketEvent, TicketIssuedData,
    TicketService, TicketState,
};
