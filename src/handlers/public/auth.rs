use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{password::verify_password, Identity};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::handlers::require_text;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ConsumerTokenRequest {
    pub telegram_id: String,
}

#[derive(Debug, Deserialize)]
pub struct OperatorLoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

impl TokenResponse {
    fn bearer(access: String, state: &AppState) -> Self {
        Self {
            access,
            token_type: "Bearer",
            expires_in: state.tokens.lifetime().num_seconds(),
        }
    }
}

/// POST /consumers/token - user token by telegram id; the user row is created on first call
pub async fn consumer_token(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ConsumerTokenRequest>,
) -> ApiResult<TokenResponse> {
    let telegram_id = body.telegram_id.trim();
    require_text("telegram_id", telegram_id)?;

    let user = state.store.find_or_create_user(telegram_id).await?;
    let token = state.tokens.issue(&Identity::from_user(&user))?;

    Ok(ApiResponse::success(TokenResponse::bearer(token, &state)))
}

/// POST /token - operator login
pub async fn operator_token(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<OperatorLoginRequest>,
) -> ApiResult<TokenResponse> {
    require_text("username", &body.username)?;
    require_text("password", &body.password)?;

    let invalid = || ApiError::unauthorized("Invalid username or password");

    let Some(operator) = state.store.find_operator(&body.username).await? else {
        warn!("Login attempt for unknown operator {}", body.username);
        return Err(invalid());
    };
    if !verify_password(&body.password, &operator.password_hash)? {
        warn!("Wrong password for operator {}", operator.username);
        return Err(invalid());
    }

    let token = state.tokens.issue(&Identity::from_operator(&operator)?)?;
    info!("Operator {} logged in", operator.username);

    Ok(ApiResponse::success(TokenResponse::bearer(token, &state)))
}
