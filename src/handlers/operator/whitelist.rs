use axum::{extract::State, Extension};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::Identity;
use crate::database::models::{Permission, WhitelistEntry};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct EditWhitelistRequest {
    pub permission: String,
    /// Disambiguates when the telegram id applied from several origins.
    #[serde(default)]
    pub from: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EditWhitelistResponse {
    pub message: &'static str,
    pub entry: WhitelistEntry,
}

fn parse_decision(raw: &str) -> Result<Permission, ApiError> {
    match raw.parse::<Permission>() {
        Ok(permission) if permission.is_terminal() => Ok(permission),
        _ => Err(ApiError::invalid_field("permission", "Must be 'approve' or 'deny'")),
    }
}

/// POST /operator/whitelist/:telegram_id/edit
///
/// An approval needs a configured endpoint for the entry's origin; without
/// one nothing is persisted. Once persisted, the callback runs detached and
/// its outcome never changes the response.
pub async fn edit_whitelist(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    ApiPath(telegram_id): ApiPath<String>,
    ApiJson(body): ApiJson<EditWhitelistRequest>,
) -> ApiResult<EditWhitelistResponse> {
    let permission = parse_decision(&body.permission)?;

    let entry = state
        .store
        .find_whitelist(&telegram_id, body.from.as_deref())
        .await?
        .ok_or_else(|| ApiError::not_found("Whitelist entry not found"))?;
    if entry.permission.is_terminal() {
        return Err(ApiError::conflict(format!("Whitelist entry already set to '{}'", entry.permission)));
    }

    let callback = match permission {
        Permission::Approve => Some(
            state
                .endpoints
                .lookup(&entry.origin)
                .ok_or_else(|| ApiError::unknown_origin(&entry.origin))?,
        ),
        _ => None,
    };

    let entry = state
        .store
        .decide_whitelist(entry.id, permission)
        .await?
        .ok_or_else(|| ApiError::conflict("Whitelist entry was decided concurrently"))?;
    info!(
        "Whitelist entry {} ({} from {}) set to {} by {}",
        entry.id, entry.telegram_id, entry.origin, entry.permission, identity
    );

    if let Some(url) = callback {
        state.notifier.dispatch(url, entry.clone());
    }

    Ok(ApiResponse::success(EditWhitelistResponse { message: "OK", entry }))
}

/// GET /operator/whitelist
pub async fn list_pending_whitelist(State(state): State<AppState>) -> ApiResult<Vec<WhitelistEntry>> {
    let entries = state.store.list_whitelist(Some(Permission::Pending)).await?;
    Ok(ApiResponse::success(entries))
}

/// GET /operator/whitelist/all
pub async fn list_all_whitelist(State(state): State<AppState>) -> ApiResult<Vec<WhitelistEntry>> {
    let entries = state.store.list_whitelist(None).await?;
    Ok(ApiResponse::success(entries))
}
