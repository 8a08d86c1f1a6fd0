#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{header, Method, Request, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use helpdesk_api::config::{AppConfig, Environment, StoreBackend};
use helpdesk_api::server::{app, build_state};
use helpdesk_api::AppState;

pub const OPERATOR: &str = "operator1";
pub const OPERATOR_PASSWORD: &str = "securepassword";

/// The real router over an in-memory store with the bootstrap operator seeded.
pub struct TestApp {
    pub state: AppState,
    router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestResponse {
    pub fn data(&self) -> &Value {
        &self.body["data"]
    }

    pub fn code(&self) -> &str {
        self.body["code"].as_str().unwrap_or_default()
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::for_environment(Environment::Development);
    config.database.store = StoreBackend::Memory;
    config.security.jwt_secret = "integration-test-secret".to_string();
    config.whitelist.notify_timeout_secs = 2;
    config
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Result<Self> {
        let state = build_state(config).await?;
        let router = app(state.clone());
        Ok(Self { state, router })
    }

    pub async fn send(&self, method: Method, path: &str, token: Option<&str>, body: Option<Value>) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).with_context(|| format!("non-JSON body for {}", path))?
        };

        Ok(TestResponse { status, body })
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<TestResponse> {
        self.send(Method::GET, path, token, None).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>, body: Value) -> Result<TestResponse> {
        self.send(Method::POST, path, token, Some(body)).await
    }

    pub async fn user_token(&self, telegram_id: &str) -> Result<String> {
        let res = self
            .post("/api/consumers/token", None, json!({ "telegram_id": telegram_id }))
            .await?;
        anyhow::ensure!(res.status == StatusCode::OK, "user token failed: {}", res.body);
        access_token(&res)
    }

    pub async fn operator_token(&self) -> Result<String> {
        let res = self
            .post(
                "/api/token",
                None,
                json!({ "username": OPERATOR, "password": OPERATOR_PASSWORD }),
            )
            .await?;
        anyhow::ensure!(res.status == StatusCode::OK, "operator token failed: {}", res.body);
        access_token(&res)
    }

    pub async fn create_ticket(&self, token: &str, subject: &str) -> Result<i64> {
        let res = self
            .post(
                "/api/tickets/create",
                Some(token),
                json!({ "subject": subject, "description": "details", "source": "telegram" }),
            )
            .await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "create ticket failed: {}", res.body);
        res.data()["id"].as_i64().context("ticket id")
    }
}

fn access_token(res: &TestResponse) -> Result<String> {
    res.data()["access"]
        .as_str()
        .map(str::to_string)
        .context("missing access token")
}

pub fn whitelist_request(telegram_id: i64, origin: &str) -> Value {
    json!({
        "text": "Please grant access",
        "chatId": 5000 + telegram_id,
        "from": origin,
        "user": {
            "id": telegram_id,
            "is_bot": false,
            "first_name": "Ann",
            "last_name": "Lee",
            "username": "annlee",
            "language_code": "en"
        }
    })
}

/// Local HTTP server standing in for an origin system's callback.
pub struct CallbackServer {
    pub url: String,
    pub received: mpsc::UnboundedReceiver<Value>,
}

pub async fn callback_server() -> Result<CallbackServer> {
    callback_server_replying(StatusCode::OK).await
}

/// Like [`callback_server`], but every callback is answered with `status`.
pub async fn callback_server_replying(status: StatusCode) -> Result<CallbackServer> {
    async fn receive(
        State((tx, status)): State<(mpsc::UnboundedSender<Value>, StatusCode)>,
        Json(body): Json<Value>,
    ) -> StatusCode {
        let _ = tx.send(body);
        status
    }

    let (tx, received) = mpsc::unbounded_channel();
    let router = Router::new().route("/notify", post(receive)).with_state((tx, status));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    Ok(CallbackServer {
        url: format!("http://{}/notify", addr),
        received,
    })
}
