use axum::{extract::State, Extension};
use serde::Deserialize;

use crate::auth::Identity;
use crate::database::models::{Message, NewMessage};
use crate::extract::{ApiJson, ApiPath};
use crate::handlers::{load_ticket, require_text};
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::{self, TicketAction};
use crate::state::AppState;

use super::resolve_caller;

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub sender: String,
    pub recipient: String,
    pub content: String,
}

/// POST /tickets/:id/messages
///
/// Shape and role checks run before the ticket is loaded, so a user posting
/// as `operator` is refused even for a ticket that does not exist.
pub async fn create_message(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(ticket_id): ApiPath<i64>,
    ApiJson(body): ApiJson<CreateMessageRequest>,
) -> ApiResult<Message> {
    let (sender, recipient) = policy::message_parties(&body.sender, &body.recipient)?;
    require_text("content", &body.content)?;
    policy::check_sender(&identity, sender)?;

    let caller = resolve_caller(state.store.as_ref(), &identity).await?;
    let ticket = load_ticket(state.store.as_ref(), ticket_id).await?;
    policy::authorize_ticket(&caller, &ticket, TicketAction::PostMessage { sender })?;

    let message = state
        .store
        .create_message(NewMessage {
            ticket_id: ticket.id,
            sender,
            recipient,
            content: body.content,
        })
        .await?;

    Ok(ApiResponse::created(message))
}

/// GET /tickets/:id/messages - oldest first
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(ticket_id): ApiPath<i64>,
) -> ApiResult<Vec<Message>> {
    let caller = resolve_caller(state.store.as_ref(), &identity).await?;
    let ticket = load_ticket(state.store.as_ref(), ticket_id).await?;
    policy::authorize_ticket(&caller, &ticket, TicketAction::ReadHistory)?;

    let messages = state.store.list_messages(ticket.id).await?;
    Ok(ApiResponse::success(messages))
}
