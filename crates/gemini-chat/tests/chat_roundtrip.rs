use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use gemini_chat::{Config, GeminiClient, GeminiError};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// What the fake endpoint saw, plus the responses it still has to give.
#[derive(Default)]
struct Recorded {
    calls: Vec<String>,
    keys: Vec<String>,
    bodies: Vec<Value>,
    script: VecDeque<(StatusCode, Value)>,
}

type Shared = Arc<Mutex<Recorded>>;

async fn generate_content(
    State(state): State<Shared>,
    Path(call): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let mut state = state.lock().unwrap();
    state.calls.push(call);
    state.keys.push(
        headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    );
    state.bodies.push(body);
    let (status, reply) = state.script.pop_front().expect("unexpected request");
    (status, Json(reply))
}

/// Serves `script` on a local port and returns a client pointed at it.
async fn serve(script: Vec<(StatusCode, Value)>) -> (GeminiClient, Shared) {
    let state: Shared = Arc::new(Mutex::new(Recorded {
        script: script.into(),
        ..Recorded::default()
    }));
    let app = Router::new()
        .route("/v1beta/models/{call}", post(generate_content))
        .with_state(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let config = Config::builder()
        .with_base_url(&format!("http://{addr}/v1beta"))
        .with_api_key("test-key")
        .with_model("gemini-test")
        .build();
    (GeminiClient::new(config).unwrap(), state)
}

fn reply(text: &str) -> (StatusCode, Value) {
    (
        StatusCode::OK,
        json!({
            "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] }, "finishReason": "STOP" }],
            "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 4, "totalTokenCount": 14 }
        }),
    )
}

#[tokio::test]
async fn chat_resends_history_with_every_turn() {
    // --- Arrange ---
    let (client, state) = serve(vec![
        reply("Hi, I'm MentorAI. What is a REST API?"),
        reply("Good. Next question?"),
    ])
    .await;
    let chat = client.start_chat("You are MentorAI.");

    // --- Act ---
    let first = chat.send_message("Hello! Please start the interview.").await.unwrap();
    let second = chat.send_message("An API over HTTP.").await.unwrap();

    // --- Assert ---
    assert_eq!(first, "Hi, I'm MentorAI. What is a REST API?");
    assert_eq!(second, "Good. Next question?");

    let state = state.lock().unwrap();
    assert_eq!(state.calls, ["gemini-test:generateContent"; 2]);
    assert_eq!(state.keys, ["test-key"; 2]);

    let last = &state.bodies[1];
    assert_eq!(
        last["systemInstruction"]["parts"][0]["text"],
        "You are MentorAI."
    );
    let roles: Vec<&str> = last["contents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, ["user", "model", "user"]);
    assert_eq!(last["contents"][2]["parts"][0]["text"], "An API over HTTP.");

    assert_eq!(chat.history().await.len(), 4);
    assert_eq!(client.stats().requests(), 2);
    assert_eq!(client.stats().total_tokens(), 28);
}

#[tokio::test]
async fn service_errors_carry_the_api_message_and_keep_history() {
    let (client, _state) = serve(vec![
        (
            StatusCode::BAD_REQUEST,
            json!({ "error": { "code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT" } }),
        ),
        reply("Recovered."),
    ])
    .await;
    let chat = client.start_chat("system");

    let err = chat.send_message("Hello").await.unwrap_err();
    match err {
        GeminiError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "API key not valid.");
        }
        other => panic!("expected an API error, got {other:?}"),
    }
    assert!(chat.history().await.is_empty());

    assert_eq!(chat.send_message("Hello").await.unwrap(), "Recovered.");
    assert_eq!(chat.history().await.len(), 2);
}

#[tokio::test]
async fn blocked_prompt_is_reported() {
    let (client, _state) = serve(vec![(
        StatusCode::OK,
        json!({ "promptFeedback": { "blockReason": "SAFETY" } }),
    )])
    .await;
    let chat = client.start_chat("system");

    let err = chat.send_message("something").await.unwrap_err();

    assert!(matches!(err, GeminiError::Blocked(reason) if reason == "SAFETY"));
}

#[tokio::test]
async fn unreachable_host_is_an_http_error() {
    let config = Config::builder()
        .with_base_url("http://127.0.0.1:1/v1beta")
        .with_api_key("test-key")
        .build();
    let client = GeminiClient::new(config).unwrap();

    let err = client.start_chat("system").send_message("hi").await.unwrap_err();

    assert!(matches!(err, GeminiError::Http(_)));
}
