//! Door scanning: resolve a QR payload to a ticket or badge and admit it once.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::EventStore;
use serde::Serialize;
use thiserror::Error;

use crate::aggregate::Aggregate;
use crate::code::{AccessCodeSigner, CodeError, CodeKind};
use crate::error::DomainError;
use crate::participant::{Participant, ParticipantError, ParticipantService};
use crate::ticket::{Ticket, TicketError, TicketService};

/// What the door staff sees after a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckInView {
    pub kind: CodeKind,
    pub id: AggregateId,
    pub display_name: String,

    /// Ticket type for tickets, organization or role for badges.
    pub detail: String,

    pub checked_in_at: Option<DateTime<Utc>>,
    pub gate: Option<String>,
}

impl CheckInView {
    fn from_ticket(ticket: &Ticket) -> Option<Self> {
        Some(Self {
            kind: CodeKind::Ticket,
            id: ticket.id()?,
            display_name: ticket.holder_name().to_string(),
            detail: ticket.ticket_type_name().to_string(),
            checked_in_at: ticket.checked_in_at(),
            gate: ticket.gate().map(str::to_string),
        })
    }

    fn from_participant(kind: CodeKind, participant: &Participant) -> Option<Self> {
        let detail = match participant.organization() {
            Some(org) => org.to_string(),
            None => participant
                .kind()
                .map(|k| k.as_str().to_string())
                .unwrap_or_default(),
        };
        Some(Self {
            kind,
            id: participant.id()?,
            display_name: participant.name().to_string(),
            detail,
            checked_in_at: participant.checked_in_at(),
            gate: participant.gate().map(str::to_string),
        })
    }
}

#[derive(Debug, Error)]
pub enum CheckInError {
    #[error("Invalid access code: {0}")]
    InvalidCode(#[from] CodeError),

    #[error("No ticket or badge found for this code")]
    NotFound,

    #[error("Already checked in at {at}")]
    AlreadyCheckedIn { at: DateTime<Utc> },

    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl CheckInError {
    fn reason(&self) -> &'static str {
        match self {
            CheckInError::InvalidCode(_) => "invalid_code",
            CheckInError::NotFound => "not_found",
            CheckInError::AlreadyCheckedIn { .. } => "already_checked_in",
            CheckInError::Domain(_) => "error",
        }
    }
}

pub struct CheckInService<S: EventStore> {
    tickets: TicketService<S>,
    participants: ParticipantService<S>,
    signer: AccessCodeSigner,
}

impl<S: EventStore + Clone> CheckInService<S> {
    pub fn new(store: S, signer: AccessCodeSigner) -> Self {
        Self {
            tickets: TicketService::new(store.clone()),
            participants: ParticipantService::new(store, signer.clone()),
            signer,
        }
    }

    /// Resolves a code without changing anything.
    #[tracing::instrument(skip(self, raw))]
    pub async fn lookup(&self, raw: &str) -> Result<CheckInView, CheckInError> {
        let code = self.signer.verify(raw)?;

        let view = match code.kind {
            CodeKind::Ticket => self
                .tickets
                .get_ticket(code.id)
                .await?
                .as_ref()
                .and_then(CheckInView::from_ticket),
            kind => self
                .participants
                .get_participant(code.id)
                .await?
                .filter(|p| p.kind().map(|k| k.code_kind()) == Some(kind))
                .as_ref()
                .and_then(|p| CheckInView::from_participant(kind, p)),
        };

        view.ok_or(CheckInError::NotFound)
    }

    /// Admits the holder of `raw`. A second scan of the same code fails with
    /// [`CheckInError::AlreadyCheckedIn`] and writes nothing.
    #[tracing::instrument(skip(self, raw))]
    pub async fn check_in(
        &self,
        raw: &str,
        gate: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CheckInView, CheckInError> {
        let result = self.try_check_in(raw, gate, now).await;
        match &result {
            Ok(view) => {
                metrics::counter!("checkins_total", "kind" => view.kind.as_str()).increment(1);
                tracing::info!(kind = view.kind.as_str(), id = %view.id, "checked in");
            }
            Err(e) => {
                metrics::counter!("checkins_rejected_total", "reason" => e.reason()).increment(1);
                tracing::warn!(error = %e, "check-in rejected");
            }
        }
        result
    }

    async fn try_check_in(
        &self,
        raw: &str,
        gate: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CheckInView, CheckInError> {
        // Resolving first rejects badges whose kind does not match the code.
        let current = self.lookup(raw).await?;
        if let Some(at) = current.checked_in_at {
            return Err(CheckInError::AlreadyCheckedIn { at });
        }

        let view = match current.kind {
            CodeKind::Ticket => {
                let result = self
                    .tickets
                    .check_in(current.id, now, gate)
                    .await
                    .map_err(map_ticket_error)?;
                CheckInView::from_ticket(&result.aggregate)
            }
            kind => {
                let result = self
                    .participants
                    .check_in(current.id, now, gate)
                    .await
                    .map_err(map_participant_error)?;
                CheckInView::from_participant(kind, &result.aggregate)
            }
        };

        view.ok_or(CheckInError::NotFound)
    }
}

fn map_ticket_error(e: DomainError) -> CheckInError {
    match e {
        DomainError::Ticket(TicketError::AlreadyCheckedIn { at }) => {
            CheckInError::AlreadyCheckedIn { at }
        }
        DomainError::Ticket(TicketError::NotIssued) => CheckInError::NotFound,
        other => CheckInError::Domain(other),
    }
}

fn map_participant_error(e: DomainError) -> CheckInError {
    match e {
        DomainError::Participant(ParticipantError::AlreadyCheckedIn { at }) => {
            CheckInError::AlreadyCheckedIn { at }
        }
        DomainError::Participant(ParticipantError::NotRegistered) => CheckInError::NotFound,
        other => CheckInError::Domain(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::AccessCode;
    use crate::participant::{ParticipantKind, RegisterParticipant};
    use crate::ticket::TicketIssuedData;
    use event_store::InMemoryEventStore;

    const SECRET: &str = "check-in-test-secret";

    struct Fixture {
        store: InMemoryEventStore,
        service: CheckInService<InMemoryEventStore>,
        signer: AccessCodeSigner,
    }

    fn fixture() -> Fixture {
        let store = InMemoryEventStore::new();
        let signer = AccessCodeSigner::new(SECRET).unwrap();
        Fixture {
            service: CheckInService::new(store.clone(), signer.clone()),
            store,
            signer,
        }
    }

    async fn issue_ticket(f: &Fixture) -> String {
        let ticket_id = AggregateId::new();
        let code = f.signer.sign(AccessCode::new(CodeKind::Ticket, ticket_id));
        TicketService::new(f.store.clone())
            .issue_ticket(TicketIssuedData {
                ticket_id,
                order_id: AggregateId::new(),
                ticket_type_id: "general".into(),
                ticket_type_name: "General Admission".to_string(),
                holder_name: "Ada Lovelace".to_string(),
                holder_email: "ada@example.com".to_string(),
                code: code.clone(),
                issued_at: Utc::now(),
            })
            .await
            .unwrap();
        code
    }

    #[tokio::test]
    async fn ticket_checks_in_once() {
        let f = fixture();
        let code = issue_ticket(&f).await;

        let view = f.service.lookup(&code).await.unwrap();
        assert_eq!(view.display_name, "Ada Lovelace");
        assert!(view.checked_in_at.is_none());

        let now = Utc::now();
        let view = f
            .service
            .check_in(&code, Some("main".to_string()), now)
            .await
            .unwrap();
        assert_eq!(view.checked_in_at, Some(now));
        assert_eq!(view.gate.as_deref(), Some("main"));

        let err = f.service.check_in(&code, None, Utc::now()).await.unwrap_err();
        assert!(matches!(err, CheckInError::AlreadyCheckedIn { at } if at == now));
        assert_eq!(f.store.event_count().await, 2);
    }

    #[tokio::test]
    async fn forged_code_is_rejected_before_lookup() {
        let f = fixture();
        let other = AccessCodeSigner::new("some-other-secret!!").unwrap();
        let forged = other.sign(AccessCode::new(CodeKind::Ticket, AggregateId::new()));

        assert!(matches!(
            f.service.check_in(&forged, None, Utc::now()).await,
            Err(CheckInError::InvalidCode(CodeError::BadSignature))
        ));
    }

    #[tokio::test]
    async fn valid_code_for_missing_ticket() {
        let f = fixture();
        let code = f
            .signer
            .sign(AccessCode::new(CodeKind::Ticket, AggregateId::new()));

        assert!(matches!(
            f.service.lookup(&code).await,
            Err(CheckInError::NotFound)
        ));
    }

    #[tokio::test]
    async fn speaker_badge_checks_in() {
        let f = fixture();
        let participants = ParticipantService::new(f.store.clone(), f.signer.clone());
        let result = participants
            .register(RegisterParticipant {
                participant_id: AggregateId::new(),
                kind: ParticipantKind::Speaker,
                name: "Grace Hopper".to_string(),
                organization: None,
                email: Some("grace@example.com".to_string()),
                registered_at: Utc::now(),
            })
            .await
            .unwrap();
        let code = result.aggregate.code().to_string();

        let view = f.service.check_in(&code, None, Utc::now()).await.unwrap();
        assert_eq!(view.kind, CodeKind::Speaker);
        assert_eq!(view.detail, "speaker");

        assert!(matches!(
            f.service.check_in(&code, None, Utc::now()).await,
            Err(CheckInError::AlreadyCheckedIn { .. })
        ));
    }

    #[tokio::test]
    async fn badge_code_with_wrong_kind_is_not_found() {
        let f = fixture();
        let participants = ParticipantService::new(f.store.clone(), f.signer.clone());
        let id = AggregateId::new();
        participants
            .register(RegisterParticipant {
                participant_id: id,
                kind: ParticipantKind::Speaker,
                name: "Grace Hopper".to_string(),
                organization: None,
                email: None,
                registered_at: Utc::now(),
            })
            .await
            .unwrap();

        let exhibitor_code = f.signer.sign(AccessCode::new(CodeKind::Exhibitor, id));
        assert!(matches!(
            f.service.lookup(&exhibitor_code).await,
            Err(CheckInError::NotFound)
        ));
    }
}
