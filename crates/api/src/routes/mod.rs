pub mod check_in;
pub mod health;
pub mod orders;
pub mod participants;
pub mod stats;
pub mod ticket_types;
pub mod webhooks;

use common::AggregateId;

use crate::error::ApiError;

fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    AggregateId::parse(id).map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
