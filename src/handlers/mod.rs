// Three access tiers, each mounted under the API prefix:
// public (no token), protected (any valid token), operator (operator token).
pub mod operator;
pub mod protected;
pub mod public;

use crate::database::Store;
use crate::error::ApiError;

/// Rejects blank required string fields with a field-level validation error.
pub(crate) fn require_text(field: &str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::invalid_field(field, "This field is required"));
    }
    Ok(())
}

/// Loads a ticket or fails with 404.
pub(crate) async fn load_ticket(
    store: &dyn Store,
    id: i64,
) -> Result<crate::database::models::Ticket, ApiError> {
    store
        .get_ticket(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Ticket not found"))
}
