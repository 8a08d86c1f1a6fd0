use axum::{extract::State, Extension};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::Identity;
use crate::database::models::{NewTicket, Ticket};
use crate::extract::{ApiJson, ApiPath};
use crate::handlers::{load_ticket, require_text};
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy::{self, Caller, PolicyError, TicketAction};
use crate::state::AppState;

use super::resolve_caller;

#[derive(Debug, Deserialize)]
pub struct CreateTicketRequest {
    pub subject: String,
    pub description: String,
    pub source: String,
}

#[derive(Debug, Serialize)]
pub struct ClosedTicket {
    pub message: &'static str,
    pub ticket: Ticket,
}

/// POST /tickets/create
pub async fn create_ticket(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiJson(body): ApiJson<CreateTicketRequest>,
) -> ApiResult<Ticket> {
    require_text("subject", &body.subject)?;
    require_text("description", &body.description)?;
    require_text("source", &body.source)?;

    let caller = resolve_caller(state.store.as_ref(), &identity).await?;
    let user_id = policy::ticket_owner(&caller)?;

    let ticket = state
        .store
        .create_ticket(NewTicket {
            user_id,
            subject: body.subject,
            description: body.description,
            source: body.source,
        })
        .await?;
    info!("Ticket {} opened by {}", ticket.id, identity);

    Ok(ApiResponse::created(ticket))
}

/// GET /tickets - operators see every ticket, users only their own
pub async fn list_tickets(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ApiResult<Vec<Ticket>> {
    let caller = resolve_caller(state.store.as_ref(), &identity).await?;
    let tickets = state.store.list_tickets(policy::ticket_scope(&caller)).await?;
    Ok(ApiResponse::success(tickets))
}

/// POST /tickets/:id/close
pub async fn close_ticket(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ClosedTicket> {
    let caller = resolve_caller(state.store.as_ref(), &identity).await?;
    close_as(&state, &caller, id).await
}

/// Shared by the user and operator close routes.
pub(crate) async fn close_as(state: &AppState, caller: &Caller, id: i64) -> ApiResult<ClosedTicket> {
    let ticket = load_ticket(state.store.as_ref(), id).await?;
    policy::authorize_ticket(caller, &ticket, TicketAction::Close)?;

    // A concurrent close can win between the load and the update.
    let ticket = state
        .store
        .close_ticket(id, caller.party())
        .await?
        .ok_or(PolicyError::AlreadyClosed)?;
    info!("Ticket {} closed by {}", ticket.id, caller.party());

    Ok(ApiResponse::success(ClosedTicket {
        message: "Ticket closed successfully",
        ticket,
    }))
}
