use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post, MethodRouter},
    Router,
};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::auth::password::hash_password;
use crate::config::{AppConfig, SecurityConfig};
use crate::database::models::{NewOperator, DEFAULT_OPERATOR_ROLE};
use crate::database::{open_store, Store};
use crate::handlers::{operator, protected, public};
use crate::middleware::{jwt_auth_middleware, require_operator_middleware};
use crate::state::AppState;

/// Registers `path` and `path/` with the same handler.
fn route_both(router: Router<AppState>, path: &str, method: MethodRouter<AppState>) -> Router<AppState> {
    router
        .route(path, method.clone())
        .route(&format!("{}/", path), method)
}

fn public_routes() -> Router<AppState> {
    let router = Router::new();
    let router = route_both(router, "/consumers/token", post(public::consumer_token));
    let router = route_both(router, "/token", post(public::operator_token));
    route_both(router, "/whitelist", post(public::submit_whitelist))
}

fn protected_routes(state: &AppState) -> Router<AppState> {
    let router = Router::new();
    let router = route_both(router, "/logout", post(protected::logout));
    let router = route_both(router, "/tickets", get(protected::list_tickets));
    let router = route_both(router, "/tickets/create", post(protected::create_ticket));
    let router = route_both(
        router,
        "/tickets/:id/messages",
        get(protected::list_messages).post(protected::create_message),
    );
    let router = route_both(router, "/tickets/:id/close", post(protected::close_ticket));

    router.route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware))
}

fn operator_routes(state: &AppState) -> Router<AppState> {
    let router = Router::new();
    let router = route_both(router, "/operator/ticket/:id/close", post(operator::close_ticket));
    let router = route_both(router, "/operator/whitelist", get(operator::list_pending_whitelist));
    let router = route_both(router, "/operator/whitelist/all", get(operator::list_all_whitelist));
    let router = route_both(router, "/operator/whitelist/:telegram_id/edit", post(operator::edit_whitelist));
    let router = route_both(
        router,
        "/operator/settings",
        get(operator::list_endpoints).post(operator::create_endpoint),
    );
    let router = route_both(
        router,
        "/operator/settings/:id",
        axum::routing::put(operator::update_endpoint).delete(operator::delete_endpoint),
    );

    // Layers run outermost-first: the token is validated before the role check.
    router
        .route_layer(middleware::from_fn(require_operator_middleware))
        .route_layer(middleware::from_fn_with_state(state.clone(), jwt_auth_middleware))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Builds the full router for the given state.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(public_routes())
        .merge(protected_routes(&state))
        .merge(operator_routes(&state));

    let prefix = state.config.server.api_prefix.trim_end_matches('/');
    let router = if prefix.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(prefix, api)
    };

    router
        .route("/", get(root))
        .route("/health", get(health))
        .layer(cors_layer(&state.config.security))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root(State(state): State<AppState>) -> Json<Value> {
    let prefix = state.config.server.api_prefix.trim_end_matches('/');

    Json(json!({
        "success": true,
        "data": {
            "name": "Helpdesk API",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Tickets, operator messaging and access whitelist",
            "endpoints": {
                "public": format!("{prefix}/consumers/token, {prefix}/token, {prefix}/whitelist"),
                "tickets": format!("{prefix}/tickets[/:id/messages|/:id/close] (token)"),
                "operator": format!("{prefix}/operator/* (operator token)"),
                "health": "/health",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "database unavailable",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now
                    }
                })),
            )
        }
    }
}

/// Creates the configured bootstrap operator unless the username exists.
pub async fn seed_operator(store: &dyn Store, config: &AppConfig) -> anyhow::Result<()> {
    let Some(bootstrap) = &config.security.bootstrap_operator else {
        return Ok(());
    };

    if store.find_operator(&bootstrap.username).await?.is_some() {
        return Ok(());
    }

    store
        .upsert_operator(NewOperator {
            username: bootstrap.username.clone(),
            password_hash: hash_password(&bootstrap.password)?,
            role: DEFAULT_OPERATOR_ROLE.to_string(),
        })
        .await?;
    info!("Seeded bootstrap operator {}", bootstrap.username);
    Ok(())
}

/// Opens the store, loads the endpoint snapshot and seeds the bootstrap operator.
pub async fn build_state(config: AppConfig) -> anyhow::Result<AppState> {
    config.validate()?;

    let store = open_store(&config.database).await?;
    let state = AppState::new(config, store)?;

    state.endpoints.reload(state.store.as_ref()).await?;
    seed_operator(state.store.as_ref(), &state.config).await?;
    Ok(state)
}

/// Runs the HTTP server until the process is stopped.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    if matches!(config.environment, crate::config::Environment::Development) {
        warn!("Running with development defaults; do not expose this instance");
    }

    let port = config.server.port;
    let state = build_state(config).await?;

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Helpdesk API listening on http://{}", bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}
