use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;

use super::ParticipantKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ParticipantEvent {
    ParticipantRegistered(ParticipantRegisteredData),
    ParticipantCheckedIn(ParticipantCheckedInData),
}

impl DomainEvent for ParticipantEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ParticipantEvent::ParticipantRegistered(_) => "ParticipantRegistered",
            ParticipantEvent::ParticipantCheckedIn(_) => "ParticipantCheckedIn",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantRegisteredData {
    pub participant_id: AggregateId,
    pub kind: ParticipantKind,
    pub name: String,
    pub organization: Option<String>,
    pub email: Option<String>,

    /// Signed badge payload.
    pub code: String,

    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantCheckedInData {
    pub at: DateTime<Utc>,
    pub gate: Option<String>,
}
