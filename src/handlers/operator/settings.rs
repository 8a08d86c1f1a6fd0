use axum::extract::State;
use tracing::info;

use crate::database::models::{Endpoint, EndpointInput};
use crate::error::ApiError;
use crate::extract::{ApiJson, ApiPath};
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// Trims the input and checks that the URL is an absolute http(s) URL.
fn validate_endpoint(input: EndpointInput) -> Result<EndpointInput, ApiError> {
    let name = input.name.trim().to_string();
    let url = input.url.trim().to_string();

    if name.is_empty() {
        return Err(ApiError::invalid_field("name", "This field is required"));
    }
    match url::Url::parse(&url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {}
        _ => return Err(ApiError::invalid_field("url", "Must be an absolute http(s) URL")),
    }

    Ok(EndpointInput { name, url })
}

/// GET /operator/settings
pub async fn list_endpoints(State(state): State<AppState>) -> ApiResult<Vec<Endpoint>> {
    Ok(ApiResponse::success(state.store.list_endpoints().await?))
}

/// POST /operator/settings
pub async fn create_endpoint(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<EndpointInput>,
) -> ApiResult<Endpoint> {
    let input = validate_endpoint(body)?;
    let endpoint = state.store.create_endpoint(input).await?;
    info!("Endpoint {} added for {}", endpoint.id, endpoint.name);

    state.endpoints.reload(state.store.as_ref()).await?;
    Ok(ApiResponse::created(endpoint))
}

/// PUT /operator/settings/:id
pub async fn update_endpoint(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(body): ApiJson<EndpointInput>,
) -> ApiResult<Endpoint> {
    let input = validate_endpoint(body)?;
    let endpoint = state
        .store
        .update_endpoint(id, input)
        .await?
        .ok_or_else(|| ApiError::not_found("Endpoint not found"))?;
    info!("Endpoint {} updated for {}", endpoint.id, endpoint.name);

    state.endpoints.reload(state.store.as_ref()).await?;
    Ok(ApiResponse::success(endpoint))
}

/// DELETE /operator/settings/:id
pub async fn delete_endpoint(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<()> {
    if !state.store.delete_endpoint(id).await? {
        return Err(ApiError::not_found("Endpoint not found"));
    }
    info!("Endpoint {} deleted", id);

    state.endpoints.reload(state.store.as_ref()).await?;
    Ok(ApiResponse::no_content())
}
