use axum::{extract::State, Extension};

use crate::auth::Identity;
use crate::extract::ApiPath;
use crate::handlers::protected::tickets::{close_as, ClosedTicket};
use crate::middleware::ApiResult;
use crate::policy::{self, Caller};
use crate::state::AppState;

/// POST /operator/ticket/:id/close
pub async fn close_ticket(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<ClosedTicket> {
    let caller = Caller::Operator {
        username: policy::require_operator(&identity)?.to_string(),
    };
    close_as(&state, &caller, id).await
}
