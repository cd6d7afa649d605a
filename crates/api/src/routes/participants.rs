//! Speaker and exhibitor badges.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Aggregate, Participant, ParticipantKind, RegisterParticipant};
use serde::{Deserialize, Serialize};

use super::parse_aggregate_id;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterParticipantRequest {
    pub kind: ParticipantKind,
    pub name: String,
    pub organization: Option<String>,
    pub email: Option<String>,
}

#[derive(Serialize)]
pub struct ParticipantResponse {
    pub id: String,
    pub kind: Option<ParticipantKind>,
    pub name: String,
    pub organization: Option<String>,
    pub email: Option<String>,

    /// Badge QR payload.
    pub code: String,

    pub registered_at: DateTime<Utc>,
    pub checked_in_at: Option<DateTime<Utc>>,
}

impl From<&Participant> for ParticipantResponse {
    fn from(participant: &Participant) -> Self {
        Self {
            id: participant.id().map(|id| id.to_string()).unwrap_or_default(),
            kind: participant.kind(),
            name: participant.name().to_string(),
            organization: participant.organization().map(str::to_string),
            email: participant.email().map(str::to_string),
            code: participant.code().to_string(),
            registered_at: participant.registered_at(),
            checked_in_at: participant.checked_in_at(),
        }
    }
}

/// POST /participants
#[tracing::instrument(skip(state, req), fields(kind = req.kind.as_str()))]
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterParticipantRequest>,
) -> Result<(StatusCode, Json<ParticipantResponse>), ApiError> {
    let result = state
        .participants
        .register(RegisterParticipant {
            participant_id: AggregateId::new(),
            kind: req.kind,
            name: req.name,
            organization: req.organization,
            email: req.email,
            registered_at: state.clock.now(),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ParticipantResponse::from(&result.aggregate)),
    ))
}

/// GET /participants/{id}
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ParticipantResponse>, ApiError> {
    let participant_id = parse_aggregate_id(&id)?;
    let participant = state
        .participants
        .get_participant(participant_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Participant {id} not found")))?;

    Ok(Json(ParticipantResponse::from(&participant)))
}
