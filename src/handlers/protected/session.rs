use axum::Extension;
use serde::Serialize;
use tracing::info;

use crate::auth::Identity;
use crate::middleware::{ApiResponse, ApiResult};
use crate::policy;

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub message: &'static str,
    pub username: String,
}

/// POST /logout
///
/// Tokens are stateless; this only confirms the operator's session end.
/// The client is expected to discard its token.
pub async fn logout(Extension(identity): Extension<Identity>) -> ApiResult<LogoutResponse> {
    let username = policy::require_operator(&identity)?;
    info!("Operator {} logged out", username);

    Ok(ApiResponse::success(LogoutResponse {
        message: "Logged out",
        username: username.to_string(),
    }))
}
