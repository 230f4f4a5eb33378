use async_trait::async_trait;
use interview_core::conversation::{ChatSession, ConversationClient, ConversationError};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Deserialize)]
pub struct LlmResponse {
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// An adapter that implements the generic `ConversationClient` trait on top of
/// the OpenAI chat completions endpoint.
#[derive(Clone)]
pub struct OpenAIAdapter {
    client: Client,
    api_key: Arc<SecretString>,
    model: String,
    base_url: String,
}

impl OpenAIAdapter {
    pub fn new(api_key: &SecretString, model: &str) -> Self {
        Self::with_base_url(api_key, model, OPENAI_BASE_URL)
    }

    pub fn with_base_url(api_key: &SecretString, model: &str, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: Arc::new(SecretString::from(api_key.expose_secret().to_string())),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ConversationError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ConversationError::Network(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let raw = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&raw)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| status.to_string());
            tracing::error!("OpenAI API returned {}: {}", status, message);
            return Err(ConversationError::Service(format!(
                "{}: {message}",
                status.as_u16()
            )));
        }

        let resp = resp
            .json::<LlmResponse>()
            .await
            .map_err(|e| ConversationError::MalformedResponse(e.to_string()))?;

        let answer = &resp
            .choices
            .first()
            .ok_or_else(|| ConversationError::MalformedResponse("No response from LLM".into()))?
            .message
            .content;
        if answer.trim().is_empty() {
            return Err(ConversationError::MalformedResponse(
                "LLM returned an empty message".into(),
            ));
        }
        Ok(answer.clone())
    }
}

#[async_trait]
impl ConversationClient for OpenAIAdapter {
    async fn open_session(
        &self,
        system_instruction: &str,
    ) -> Result<Arc<dyn ChatSession>, ConversationError> {
        tracing::info!(model = %self.model, "Opening OpenAI chat session");
        Ok(Arc::new(OpenAIChatSession {
            adapter: self.clone(),
            history: Mutex::new(vec![ChatMessage::new("system", system_instruction)]),
        }))
    }
}

/// Keeps the running message list; chat completions are stateless on the server.
struct OpenAIChatSession {
    adapter: OpenAIAdapter,
    history: Mutex<Vec<ChatMessage>>,
}

#[async_trait]
impl ChatSession for OpenAIChatSession {
    async fn send_message(&self, text: &str) -> Result<String, ConversationError> {
        let mut history = self.history.lock().await;

        let mut messages = history.clone();
        messages.push(ChatMessage::new("user", text));
        let reply = self.adapter.complete(&messages).await?;

        // History only grows when the turn succeeded.
        messages.push(ChatMessage::new("assistant", &reply));
        *history = messages;
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};
    use std::sync::Mutex as StdMutex;

    type Seen = Arc<StdMutex<Vec<(String, Value)>>>;

    /// Echoes the number of messages it received, or fails when asked to.
    async fn completions(
        State(seen): State<Seen>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let count = body["messages"].as_array().map(Vec::len).unwrap_or(0);
        let last = body["messages"][count.saturating_sub(1)]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        seen.lock().unwrap().push((auth, body));

        if last == "silence" {
            return (
                StatusCode::OK,
                Json(json!({
                    "choices": [{ "index": 0, "message": { "role": "assistant", "content": "  " } }]
                })),
            );
        }
        if last == "fail" {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": { "message": "Rate limit reached", "type": "requests" } })),
            );
        }
        (
            StatusCode::OK,
            Json(json!({
                "choices": [{ "index": 0, "message": { "role": "assistant", "content": format!("reply to {count} messages") } }]
            })),
        )
    }

    async fn adapter() -> (OpenAIAdapter, Seen) {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route("/v1/chat/completions", post(completions))
            .with_state(seen.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let adapter = OpenAIAdapter::with_base_url(
            &SecretString::from("sk-test".to_string()),
            "gpt-test",
            &format!("http://{addr}/v1"),
        );
        (adapter, seen)
    }

    #[tokio::test]
    async fn session_sends_system_prompt_and_history() {
        // --- Arrange ---
        let (adapter, seen) = adapter().await;
        let session = adapter.open_session("You are MentorAI.").await.unwrap();

        // --- Act ---
        let first = session.send_message("Hello! Please start the interview.").await.unwrap();
        let second = session.send_message("My answer.").await.unwrap();

        // --- Assert ---
        assert_eq!(first, "reply to 2 messages");
        assert_eq!(second, "reply to 4 messages");

        let seen = seen.lock().unwrap();
        let (auth, body) = &seen[1];
        assert_eq!(auth, "Bearer sk-test");
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You are MentorAI.");
        assert_eq!(body["messages"][2]["role"], "assistant");
        assert_eq!(body["messages"][3]["content"], "My answer.");
    }

    #[tokio::test]
    async fn failed_turn_is_a_service_error_and_not_remembered() {
        let (adapter, _seen) = adapter().await;
        let session = adapter.open_session("system").await.unwrap();

        let err = session.send_message("fail").await.unwrap_err();
        assert_eq!(
            err,
            ConversationError::Service("429: Rate limit reached".to_string())
        );

        // The failed user message was not kept: system + user only.
        let reply = session.send_message("retry").await.unwrap();
        assert_eq!(reply, "reply to 2 messages");
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_network_error() {
        let adapter = OpenAIAdapter::with_base_url(
            &SecretString::from("sk-test".to_string()),
            "gpt-test",
            "http://127.0.0.1:1/v1",
        );
        let session = adapter.open_session("system").await.unwrap();

        let err = session.send_message("hello").await.unwrap_err();

        assert!(matches!(err, ConversationError::Network(_)));
    }

    #[tokio::test]
    async fn blank_reply_is_malformed_and_not_remembered() {
        let (adapter, _seen) = adapter().await;
        let session = adapter.open_session("system").await.unwrap();

        let err = session.send_message("silence").await.unwrap_err();
        assert!(matches!(err, ConversationError::MalformedResponse(_)));

        let reply = session.send_message("retry").await.unwrap();
        assert_eq!(reply, "reply to 2 messages");
    }
}
