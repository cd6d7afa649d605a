use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::code::CodeKind;

use super::{
    ParticipantCheckedInData, ParticipantError, ParticipantEvent, ParticipantRegisteredData,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticipantKind {
    Speaker,
    Exhibitor,
}

impl ParticipantKind {
    pub fn code_kind(&self) -> CodeKind {
        match self {
            ParticipantKind::Speaker => CodeKind::Speaker,
            ParticipantKind::Exhibitor => CodeKind::Exhibitor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ParticipantKind::Speaker => "speaker",
            ParticipantKind::Exhibitor => "exhibitor",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Participant {
    id: Option<AggregateId>,
    version: Version,
    kind: Option<ParticipantKind>,
    name: String,
    organization: Option<String>,
    email: Option<String>,
    code: String,
    registered_at: DateTime<Utc>,
    checked_in_at: Option<DateTime<Utc>>,
    gate: Option<String>,
}

impl Aggregate for Participant {
    type Event = ParticipantEvent;
    type Error = ParticipantError;

    fn aggregate_type() -> &'static str {
        "Participant"
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
            ParticipantEvent::ParticipantRegistered(data) => {
                self.id = Some(data.participant_id);
                self.kind = Some(data.kind);
                self.name = data.name;
                self.organization = data.organization;
                self.email = data.email;
                self.code = data.code;
                self.registered_at = data.registered_at;
            }
            ParticipantEvent::ParticipantCheckedIn(data) => {
                self.checked_in_at = Some(data.at);
                self.gate = data.gate;
            }
        }
    }
}

impl Participant {
    pub fn kind(&self) -> Option<ParticipantKind> {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn organization(&self) -> Option<&str> {
        self.organization.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn checked_in_at(&self) -> Option<DateTime<Utc>> {
        self.checked_in_at
    }

    pub fn gate(&self) -> Option<&str> {
        self.gate.as_deref()
    }
}

impl Participant {
    pub fn register(
        &self,
        data: ParticipantRegisteredData,
    ) -> Result<Vec<ParticipantEvent>, ParticipantError> {
        if self.id.is_some() {
            return Err(ParticipantError::AlreadyRegistered);
        }
        if data.name.trim().is_empty() {
            return Err(ParticipantError::NameRequired);
        }
        if let Some(email) = &data.email
            && !email.contains('@')
        {
            return Err(ParticipantError::InvalidEmail(email.clone()));
        }
        Ok(vec![ParticipantEvent::ParticipantRegistered(data)])
    }

    pub fn check_in(
        &self,
        at: DateTime<Utc>,
        gate: Option<String>,
    ) -> Result<Vec<ParticipantEvent>, ParticipantError> {
        if self.id.is_none() {
            return Err(ParticipantError::NotRegistered);
        }
        if let Some(at) = self.checked_in_at {
            return Err(ParticipantError::AlreadyCheckedIn { at });
        }
        Ok(vec![ParticipantEvent::ParticipantCheckedIn(
            ParticipantCheckedInData { at, gate },
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registration(name: &str, email: Option<&str>) -> ParticipantRegisteredData {
        ParticipantRegisteredData {
            participant_id: AggregateId::new(),
            kind: ParticipantKind::Speaker,
            name: name.to_string(),
            organization: Some("Analytical Engines Ltd".to_string()),
            email: email.map(str::to_string),
            code: "SPK.x.y".to_string(),
            registered_at: Utc::now(),
        }
    }

    #[test]
    fn register_validates() {
        let participant = Participant::default();
        assert!(matches!(
            participant.register(registration(" ", None)),
            Err(ParticipantError::NameRequired)
        ));
        assert!(matches!(
            participant.register(registration("Ada", Some("ada"))),
            Err(ParticipantError::InvalidEmail(_))
        ));
        assert!(participant.register(registration("Ada", None)).is_ok());
    }

    #[test]
    fn check_in_once() {
        let mut participant = Participant::default();
        participant.apply_events(
            participant
                .register(registration("Ada", Some("ada@example.com")))
                .unwrap(),
        );
        assert_eq!(participant.kind(), Some(ParticipantKind::Speaker));

        let at = Utc::now();
        participant.apply_events(participant.check_in(at, None).unwrap());
        assert_eq!(participant.checked_in_at(), Some(at));

        assert!(matches!(
            participant.check_in(Utc::now(), None),
            Err(ParticipantError::AlreadyCheckedIn { .. })
        ));
    }

    #[test]
    fn kind_maps_to_code_prefix() {
        assert_eq!(ParticipantKind::Speaker.code_kind().prefix(), "SPK");
        assert_eq!(ParticipantKind::Exhibitor.code_kind().prefix(), "EXH");
        assert_eq!(
            serde_json::to_string(&ParticipantKind::Exhibitor).unwrap(),
            "\"exhibitor\""
        );
    }
}
