use axum::{extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::database::models::{NewWhitelistEntry, Permission, Submission};
use crate::error::ApiError;
use crate::extract::ApiJson;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// Access request as sent by the origin systems' bots.
#[derive(Debug, Deserialize)]
pub struct WhitelistRequest {
    pub text: String,
    #[serde(rename = "chatId")]
    pub chat_id: i64,
    pub from: String,
    pub user: Applicant,
}

#[derive(Debug, Deserialize)]
pub struct Applicant {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    #[serde(default)]
    pub language_code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub message: &'static str,
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<Permission>,
}

impl WhitelistRequest {
    fn validate(&self, state: &AppState) -> Result<(), ApiError> {
        let mut errors = HashMap::new();
        let required = "This field is required";

        for (field, value) in [
            ("text", &self.text),
            ("from", &self.from),
            ("user.first_name", &self.user.first_name),
            ("user.last_name", &self.user.last_name),
            ("user.username", &self.user.username),
        ] {
            if value.trim().is_empty() {
                errors.insert(field.to_string(), required.to_string());
            }
        }
        if self.chat_id == 0 {
            errors.insert("chatId".to_string(), required.to_string());
        }
        if self.user.id == 0 {
            errors.insert("user.id".to_string(), required.to_string());
        }
        if !self.from.trim().is_empty() && !state.config.origin_allowed(&self.from) {
            errors.insert(
                "from".to_string(),
                format!("Must be one of: {}", state.config.whitelist.allowed_origins.join(", ")),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::validation_error("Invalid whitelist request", Some(errors)))
        }
    }
}

/// POST /whitelist - records a pending access request; resubmission is a no-op success
pub async fn submit_whitelist(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<WhitelistRequest>,
) -> ApiResult<SubmissionResponse> {
    body.validate(&state)?;

    let entry = NewWhitelistEntry {
        telegram_id: body.user.id.to_string(),
        origin: body.from,
        text: body.text,
        chat_id: body.chat_id,
        first_name: body.user.first_name,
        last_name: body.user.last_name,
        username: body.user.username,
        language_code: body.user.language_code.filter(|c| !c.is_empty()),
    };

    match state.store.submit_whitelist(entry).await? {
        Submission::Created(entry) => {
            info!("Whitelist request {} from {} for {}", entry.id, entry.origin, entry.telegram_id);
            Ok(ApiResponse::created(SubmissionResponse {
                message: "Request created",
                id: entry.id,
                permission: None,
            }))
        }
        Submission::Existing(entry) => Ok(ApiResponse::with_status(
            SubmissionResponse {
                message: "Request already exists",
                id: entry.id,
                permission: Some(entry.permission),
            },
            StatusCode::OK,
        )),
    }
}
