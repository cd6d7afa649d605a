//! Speakers and exhibitors: registered by organizers, admitted with a badge.

mod aggregate;
mod events;
mod service;

pub use aggregate::{Participant, ParticipantKind};
pub use events::{ParticipantCheckedInData, ParticipantEvent, ParticipantRegisteredData};
pub use service::{ParticipantService, RegisterParticipant};

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParticipantError {
    #[error("Participant already registered")]
    AlreadyRegistered,

    #[error("Participant is not registered")]
    NotRegistered,

    #[error("Participant name is required")]
    NameRequired,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Participant already checked in at {at}")]
    AlreadyCheckedIn { at: DateTime<Utc> },
}
