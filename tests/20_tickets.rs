mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;
use helpdesk_api::database::Store;

#[tokio::test]
async fn tickets_are_scoped_by_role() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alice = app.user_token("1001").await?;
    let bob = app.user_token("1002").await?;
    let operator = app.operator_token().await?;

    app.create_ticket(&alice, "printer").await?;
    app.create_ticket(&alice, "vpn").await?;
    app.create_ticket(&bob, "mail").await?;

    let res = app.get("/api/tickets", Some(&alice)).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data().as_array().map(Vec::len), Some(2));

    let res = app.get("/api/tickets/", Some(&bob)).await?;
    assert_eq!(res.data().as_array().map(Vec::len), Some(1));

    let res = app.get("/api/tickets", Some(&operator)).await?;
    assert_eq!(res.data().as_array().map(Vec::len), Some(3));
    Ok(())
}

#[tokio::test]
async fn new_ticket_is_open_and_owned() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alice = app.user_token("1001").await?;

    let res = app
        .post(
            "/api/tickets/create/",
            Some(&alice),
            json!({ "subject": "printer", "description": "jammed", "source": "telegram" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.data()["status"], "OPEN");
    assert!(res.data()["short_id"].is_string());
    assert!(res.data()["closed_by"].is_null());
    Ok(())
}

#[tokio::test]
async fn ticket_fields_are_required() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alice = app.user_token("1001").await?;

    let res = app
        .post(
            "/api/tickets/create",
            Some(&alice),
            json!({ "subject": "", "description": "x", "source": "telegram" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.code(), "VALIDATION_ERROR");
    Ok(())
}

#[tokio::test]
async fn operators_cannot_open_tickets() -> Result<()> {
    let app = TestApp::spawn().await?;
    let operator = app.operator_token().await?;

    let res = app
        .post(
            "/api/tickets/create",
            Some(&operator),
            json!({ "subject": "s", "description": "d", "source": "web" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn conversation_between_owner_and_operator() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alice = app.user_token("1001").await?;
    let operator = app.operator_token().await?;
    let id = app.create_ticket(&alice, "printer").await?;
    let path = format!("/api/tickets/{}/messages", id);

    let res = app
        .post(&path, Some(&alice), json!({ "sender": "user", "recipient": "operator", "content": "help" }))
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = app
        .post(&path, Some(&operator), json!({ "sender": "operator", "recipient": "user", "content": "on it" }))
        .await?;
    assert_eq!(res.status, StatusCode::CREATED);

    for token in [&alice, &operator] {
        let res = app.get(&path, Some(token)).await?;
        assert_eq!(res.status, StatusCode::OK);
        let contents: Vec<&str> = res
            .data()
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|m| m["content"].as_str())
            .collect();
        assert_eq!(contents, ["help", "on it"]);
    }
    Ok(())
}

#[tokio::test]
async fn sender_rules() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alice = app.user_token("1001").await?;
    let operator = app.operator_token().await?;
    let id = app.create_ticket(&alice, "printer").await?;
    let path = format!("/api/tickets/{}/messages", id);

    // A user posing as operator is refused, owned ticket or not.
    let res = app
        .post(&path, Some(&alice), json!({ "sender": "operator", "recipient": "user", "content": "x" }))
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    let res = app
        .post("/api/tickets/9999/messages", Some(&alice), json!({ "sender": "operator", "recipient": "user", "content": "x" }))
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .post(&path, Some(&operator), json!({ "sender": "user", "recipient": "operator", "content": "x" }))
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .post(&path, Some(&alice), json!({ "sender": "bot", "recipient": "operator", "content": "x" }))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post(&path, Some(&alice), json!({ "sender": "user", "recipient": "operator", "content": "" }))
        .await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn strangers_cannot_touch_a_ticket() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alice = app.user_token("1001").await?;
    let mallory = app.user_token("6666").await?;
    let id = app.create_ticket(&alice, "printer").await?;

    let res = app.get(&format!("/api/tickets/{}/messages", id), Some(&mallory)).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app
        .post(
            &format!("/api/tickets/{}/messages", id),
            Some(&mallory),
            json!({ "sender": "user", "recipient": "operator", "content": "hi" }),
        )
        .await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.post(&format!("/api/tickets/{}/close", id), Some(&mallory), json!({})).await?;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn missing_ticket_is_not_found() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alice = app.user_token("1001").await?;
    let operator = app.operator_token().await?;

    let res = app.get("/api/tickets/4040/messages", Some(&alice)).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app.post("/api/operator/ticket/4040/close", Some(&operator), json!({})).await?;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app.get("/api/tickets/abc/messages", Some(&alice)).await?;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn closing_twice_conflicts() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alice = app.user_token("1001").await?;
    let operator = app.operator_token().await?;
    let id = app.create_ticket(&alice, "printer").await?;

    let res = app.post(&format!("/api/tickets/{}/close", id), Some(&alice), json!({})).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["ticket"]["status"], "CLOSED");
    assert_eq!(res.data()["ticket"]["closed_by"], "user");
    assert!(res.data()["ticket"]["closed_at"].is_string());

    let res = app.post(&format!("/api/tickets/{}/close/", id), Some(&alice), json!({})).await?;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.code(), "ALREADY_CLOSED");

    let res = app
        .post(&format!("/api/operator/ticket/{}/close", id), Some(&operator), json!({}))
        .await?;
    assert_eq!(res.status, StatusCode::CONFLICT);
    assert_eq!(res.code(), "ALREADY_CLOSED");

    let ticket = app.state.store.get_ticket(id).await?.expect("ticket");
    assert!(ticket.is_closed());
    Ok(())
}

#[tokio::test]
async fn operator_close_records_actor() -> Result<()> {
    let app = TestApp::spawn().await?;
    let alice = app.user_token("1001").await?;
    let operator = app.operator_token().await?;
    let id = app.create_ticket(&alice, "printer").await?;

    let res = app
        .post(&format!("/api/operator/ticket/{}/close", id), Some(&operator), json!({}))
        .await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.data()["ticket"]["closed_by"], "operator");
    Ok(())
}
