use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::EventStore;

use crate::code::{AccessCode, AccessCodeSigner};
use crate::command::{CommandHandler, CommandResult};
use crate::error::DomainError;

use super::{Participant, ParticipantError, ParticipantKind, ParticipantRegisteredData};

#[derive(Debug, Clone)]
pub struct RegisterParticipant {
    pub participant_id: AggregateId,
    pub kind: ParticipantKind,
    pub name: String,
    pub organization: Option<String>,
    pub email: Option<String>,
    pub registered_at: DateTime<Utc>,
}

pub struct ParticipantService<S: EventStore> {
    handler: CommandHandler<S, Participant>,
    signer: AccessCodeSigner,
}

impl<S: EventStore> ParticipantService<S> {
    pub fn new(store: S, signer: AccessCodeSigner) -> Self {
        Self {
            handler: CommandHandler::new(store),
            signer,
        }
    }

    /// Registers a speaker or exhibitor and signs their badge code.
    #[tracing::instrument(skip(self, cmd), fields(participant_id = %cmd.participant_id, kind = cmd.kind.as_str()))]
    pub async fn register(
        &self,
        cmd: RegisterParticipant,
    ) -> Result<CommandResult<Participant>, DomainError> {
        let code = self
            .signer
            .sign(AccessCode::new(cmd.kind.code_kind(), cmd.participant_id));
        let data = ParticipantRegisteredData {
            participant_id: cmd.participant_id,
            kind: cmd.kind,
            name: cmd.name.trim().to_string(),
            organization: cmd.organization,
            email: cmd.email,
            code,
            registered_at: cmd.registered_at,
        };

        self.handler
            .execute(cmd.participant_id, |participant| participant.register(data))
            .await
    }

    /// Marks the participant as arrived. Mirrors ticket check-in.
    #[tracing::instrument(skip(self))]
    pub async fn check_in(
        &self,
        participant_id: AggregateId,
        at: DateTime<Utc>,
        gate: Option<String>,
    ) -> Result<CommandResult<Participant>, DomainError> {
        match self
            .handler
            .execute(participant_id, |participant| participant.check_in(at, gate))
            .await
        {
            Err(e) if e.is_conflict() => {
                let participant = self.handler.load(participant_id).await?;
                match participant.checked_in_at() {
                    Some(at) => Err(ParticipantError::AlreadyCheckedIn { at }.into()),
                    None => Err(e),
                }
            }
            other => other,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_participant(
        &self,
        participant_id: AggregateId,
    ) -> Result<Option<Participant>, DomainError> {
        self.handler.load_existing(participant_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::CodeKind;
    use event_store::InMemoryEventStore;

    fn service() -> ParticipantService<InMemoryEventStore> {
        ParticipantService::new(
            InMemoryEventStore::new(),
            AccessCodeSigner::new("participant-test-secret").unwrap(),
        )
    }

    fn exhibitor() -> RegisterParticipant {
        RegisterParticipant {
            participant_id: AggregateId::new(),
            kind: ParticipantKind::Exhibitor,
            name: "  Babbage & Co  ".to_string(),
            organization: Some("Babbage & Co".to_string()),
            email: None,
            registered_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn register_signs_badge() {
        let service = service();
        let cmd = exhibitor();
        let id = cmd.participant_id;

        let result = service.register(cmd).await.unwrap();
        let participant = result.aggregate;
        assert_eq!(participant.name(), "Babbage & Co");

        let code = AccessCodeSigner::new("participant-test-secret")
            .unwrap()
            .verify(participant.code())
            .unwrap();
        assert_eq!(code.kind, CodeKind::Exhibitor);
        assert_eq!(code.id, id);
    }

    #[tokio::test]
    async fn register_twice_fails() {
        let service = service();
        let cmd = exhibitor();
        service.register(cmd.clone()).await.unwrap();

        assert!(matches!(
            service.register(cmd).await,
            Err(DomainError::Participant(ParticipantError::AlreadyRegistered))
        ));
    }

    #[tokio::test]
    async fn check_in_unknown_participant() {
        assert!(matches!(
            service()
                .check_in(AggregateId::new(), Utc::now(), None)
                .await,
            Err(DomainError::Participant(ParticipantError::NotRegistered))
        ));
    }
}
