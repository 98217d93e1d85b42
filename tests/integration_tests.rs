use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use flightbook::config::{AppConfig, LlmBackend};
use flightbook::db;
use flightbook::handlers;
use flightbook::services::ai::{IntentRecognizer, LlmProvider, LlmRecognizer, Message};
use flightbook::state::AppState;

// ── Mock Providers ──

struct MockLlm;

#[async_trait]
impl LlmProvider for MockLlm {
    async fn chat(&self, _system_prompt: &str, messages: &[Message]) -> anyhow::Result<String> {
        let last = messages
            .last()
            .map(|m| m.content.to_lowercase())
            .unwrap_or_default();

        // Simple deterministic responses based on user message content
        if last.contains("atlantis") {
            Ok(r#"{"intent":"book_flight","destination_city":"paris","origin_city":null,"unsupported_airports":["atlantis"]}"#.to_string())
        } else if last.contains("book") || last.contains("fly") {
            Ok(r#"{"intent":"book_flight","destination_city":"sydney","origin_city":"london","departure_date":null,"return_date":null,"budget":null,"adult_count":null,"child_count":null,"unsupported_airports":[]}"#.to_string())
        } else if last.contains("weather") {
            Ok(r#"{"intent":"none"}"#.to_string())
        } else if last.contains("bye") {
            Ok(r#"{"intent":"cancel"}"#.to_string())
        } else {
            Ok("I'm not sure what you mean.".to_string())
        }
    }
}

struct FailingLlm;

#[async_trait]
impl LlmProvider for FailingLlm {
    async fn chat(&self, _system_prompt: &str, _messages: &[Message]) -> anyhow::Result<String> {
        anyhow::bail!("connection refused")
    }
}

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 3978,
        database_url: ":memory:".to_string(),
        admin_token: "test-token".to_string(),
        llm_provider: LlmBackend::Disabled,
        ollama_url: "http://localhost:11434".to_string(),
        ollama_model: "llama3.2".to_string(),
        groq_api_key: String::new(),
        groq_model: "llama-3.1-8b-instant".to_string(),
        conversation_ttl_minutes: 30,
        max_slot_retries: None,
    }
}

fn test_state_with(llm: Option<Box<dyn LlmProvider>>) -> Arc<AppState> {
    let conn = db::init_db(":memory:").unwrap();
    let recognizer = llm.map(|llm| Arc::new(LlmRecognizer::new(llm)) as Arc<dyn IntentRecognizer>);
    AppState::new(test_config(), conn, recognizer)
}

fn test_state() -> Arc<AppState> {
    test_state_with(Some(Box::new(MockLlm)))
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::routes(state)
}

async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, Value) {
    let res = test_app(state.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn start_conversation(state: &Arc<AppState>) -> (String, Vec<String>) {
    let (status, json) = send(
        state,
        Request::builder()
            .method("POST")
            .uri("/api/conversations")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = json["conversation_id"].as_str().unwrap().to_string();
    (id, replies(&json))
}

async fn say(state: &Arc<AppState>, id: &str, text: &str) -> (StatusCode, Value) {
    send(
        state,
        Request::builder()
            .method("POST")
            .uri(format!("/api/conversations/{id}/messages"))
            .header("Content-Type", "application/json")
            .body(Body::from(json!({ "text": text }).to_string()))
            .unwrap(),
    )
    .await
}

fn replies(json: &Value) -> Vec<String> {
    json["replies"]
        .as_array()
        .map(|r| {
            r.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn admin_get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}

/// Audit events are written by a background task.
async fn wait_for_audit(state: &Arc<AppState>, uri: &str, kind: &str) -> Vec<Value> {
    for _ in 0..50 {
        let (_, json) = send(state, admin_get(uri, Some("test-token"))).await;
        let events = json.as_array().cloned().unwrap_or_default();
        if events.iter().any(|e| e["kind"] == kind) {
            return events;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no {kind} audit event at {uri}");
}

// ── Health Check ──

#[tokio::test]
async fn test_health() {
    let state = test_state();
    let (status, json) = send(
        &state,
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["recognizer"], true);
}

// ── Conversation API Tests ──

#[tokio::test]
async fn test_greeting_with_recognizer() {
    let state = test_state();
    let (_, greeting) = start_conversation(&state).await;
    assert_eq!(greeting, vec!["What can I help you with today?"]);
}

#[tokio::test]
async fn test_greeting_without_recognizer_adds_note() {
    let state = test_state_with(None);
    let (_, greeting) = start_conversation(&state).await;
    assert_eq!(greeting.len(), 2);
    assert!(greeting[0].starts_with("NOTE:"));
    assert_eq!(greeting[1], "What can I help you with today?");
}

#[tokio::test]
async fn test_full_booking_flow() {
    let state = test_state();
    let (id, _) = start_conversation(&state).await;

    let (status, json) = say(&state, &id, "I want to book a flight to Sydney from London").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(replies(&json), vec!["On what date would you like to travel?"]);

    let (_, json) = say(&state, &id, "1st of march 2023").await;
    assert_eq!(replies(&json), vec!["On what date would you like to come back?"]);

    let (_, json) = say(&state, &id, "15th of march 2023").await;
    assert_eq!(replies(&json), vec!["What is your budget?"]);

    let (_, json) = say(&state, &id, "800$").await;
    assert_eq!(replies(&json), vec!["For how many adult(s)?"]);

    let (_, json) = say(&state, &id, "2").await;
    assert_eq!(replies(&json), vec!["And how many child(ren)?"]);

    let (_, json) = say(&state, &id, "0").await;
    assert_eq!(
        replies(&json),
        vec![
            "Just confirming, you are traveling from London to Sydney from 2023-03-01 to 2023-03-15 \
             with 2 adult(s) and 0 child(ren), and a budget of 800$. Does this sound correct? (1) Yes or (2) No"
        ]
    );
    assert!(json.get("booking").is_none());

    let (_, json) = say(&state, &id, "yes").await;
    let messages = replies(&json);
    assert_eq!(messages.len(), 1);
    assert!(messages[0].starts_with("Your flight is confirmed for 2 adult(s) and 0 child(ren), from London to Sydney"));
    assert_eq!(json["booking"]["destination_city"], "Sydney");
    assert_eq!(json["booking"]["return_date"], "2023-03-15");

    // Persisted and visible to the admin API
    let (status, bookings) = send(&state, admin_get("/api/admin/bookings", Some("test-token"))).await;
    assert_eq!(status, StatusCode::OK);
    let bookings = bookings.as_array().unwrap();
    assert_eq!(bookings.len(), 1);
    assert_eq!(bookings[0]["conversation_id"], id.as_str());
    assert_eq!(bookings[0]["budget"], "800$");
    assert_eq!(bookings[0]["adult_count"], 2);

    let events = wait_for_audit(
        &state,
        &format!("/api/admin/audit?conversation_id={id}"),
        "Success",
    )
    .await;
    let filled = events.iter().filter(|e| e["kind"] == "SlotFilled").count();
    assert_eq!(filled, 7);
}

#[tokio::test]
async fn test_failed_save_keeps_booking_for_reconfirmation() {
    let state = test_state();
    let (id, _) = start_conversation(&state).await;

    say(&state, &id, "I want to book a flight to Sydney from London").await;
    for answer in ["1st of march 2023", "15th of march 2023", "800$", "2"] {
        say(&state, &id, answer).await;
    }
    let (_, json) = say(&state, &id, "0").await;
    let summary = replies(&json);

    state
        .db
        .lock()
        .unwrap()
        .execute_batch("ALTER TABLE bookings RENAME TO bookings_offline")
        .unwrap();

    let (status, json) = say(&state, &id, "yes").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json.get("booking").is_none());
    let messages = replies(&json);
    assert_eq!(messages.len(), 2);
    assert!(messages[0].starts_with("Sorry, I couldn't save your booking"));
    assert_eq!(messages[1], summary[0]);

    state
        .db
        .lock()
        .unwrap()
        .execute_batch("ALTER TABLE bookings_offline RENAME TO bookings")
        .unwrap();

    let (_, json) = say(&state, &id, "yes").await;
    assert_eq!(json["booking"]["destination_city"], "Sydney");
    assert_eq!(json["booking"]["budget"], "800$");

    let (_, bookings) = send(&state, admin_get("/api/admin/bookings", Some("test-token"))).await;
    assert_eq!(bookings.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unsupported_airports_warning() {
    let state = test_state();
    let (id, _) = start_conversation(&state).await;

    let (_, json) = say(&state, &id, "I want to go from Atlantis to Paris").await;
    assert_eq!(
        replies(&json),
        vec![
            "Sorry but the following airports are not supported: Atlantis",
            "From what city will you be travelling?",
        ]
    );
}

#[tokio::test]
async fn test_cancel_mid_booking() {
    let state = test_state();
    let (id, _) = start_conversation(&state).await;

    say(&state, &id, "book a flight please").await;
    let (_, json) = say(&state, &id, "cancel").await;
    assert_eq!(replies(&json), vec!["See you soon!"]);
    assert!(json.get("booking").is_none());

    wait_for_audit(
        &state,
        &format!("/api/admin/audit?conversation_id={id}"),
        "Cancelled",
    )
    .await;

    let (_, bookings) = send(&state, admin_get("/api/admin/bookings", Some("test-token"))).await;
    assert_eq!(bookings.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_idle_intents() {
    let state = test_state();
    let (id, _) = start_conversation(&state).await;

    let (_, json) = say(&state, &id, "what's the weather like?").await;
    assert_eq!(
        replies(&json),
        vec!["Sorry, I'm programmed to book flights. Please try to express your intent clearly."]
    );

    let (_, json) = say(&state, &id, "bye").await;
    assert_eq!(replies(&json), vec!["See you soon!"]);

    // Prose instead of JSON falls back to an unrecognized intent.
    let (_, json) = say(&state, &id, "hmm").await;
    assert_eq!(
        replies(&json),
        vec!["Sorry, I didn't get that. Please try asking in a different way"]
    );
}

#[tokio::test]
async fn test_recognizer_failure_is_not_understood() {
    let state = test_state_with(Some(Box::new(FailingLlm)));
    let (id, _) = start_conversation(&state).await;

    let (status, json) = say(&state, &id, "book me a flight").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        replies(&json),
        vec!["Sorry, I didn't get that. Please try asking in a different way"]
    );
}

#[tokio::test]
async fn test_degraded_mode_starts_booking() {
    let state = test_state_with(None);
    let (id, _) = start_conversation(&state).await;

    let (_, json) = say(&state, &id, "hello").await;
    assert_eq!(replies(&json), vec!["To what city would you like to travel?"]);

    let (_, json) = say(&state, &id, "new york").await;
    assert_eq!(replies(&json), vec!["From what city will you be travelling?"]);
}

#[tokio::test]
async fn test_unknown_conversation_not_found() {
    let state = test_state();
    let (status, json) = say(&state, "does-not-exist", "hello").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("does-not-exist"));
}

#[tokio::test]
async fn test_empty_message_rejected() {
    let state = test_state();
    let (id, _) = start_conversation(&state).await;
    let (status, _) = say(&state, &id, "   ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Admin API Tests ──

#[tokio::test]
async fn test_admin_requires_auth() {
    let state = test_state();
    for uri in ["/api/admin/bookings", "/api/admin/audit"] {
        let (status, json) = send(&state, admin_get(uri, None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["error"], "unauthorized");
    }
}

#[tokio::test]
async fn test_admin_wrong_token() {
    let state = test_state();
    let (status, _) = send(&state, admin_get("/api/admin/bookings", Some("wrong-token"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_audit_lists_recent_events() {
    let state = test_state();
    let (first, _) = start_conversation(&state).await;
    let (second, _) = start_conversation(&state).await;

    say(&state, &first, "book a flight").await;
    say(&state, &first, "stop").await;
    say(&state, &second, "book a flight").await;
    say(&state, &second, "quit").await;

    let all = wait_for_audit(&state, "/api/admin/audit", "Cancelled").await;
    assert!(all.iter().any(|e| e["conversation_id"] == first.as_str()));

    let only_second = wait_for_audit(
        &state,
        &format!("/api/admin/audit?conversation_id={second}"),
        "Cancelled",
    )
    .await;
    assert!(only_second
        .iter()
        .all(|e| e["conversation_id"] == second.as_str()));
}
