use anyhow::{Context, Result};
use async_trait::async_trait;
use gemini_chat::{Chat, GeminiClient, GeminiError};
use interview_core::conversation::{ChatSession, ConversationClient, ConversationError};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

/// An adapter that implements the generic `ConversationClient` trait for the
/// `gemini_chat::GeminiClient`.
pub struct GeminiAdapter {
    client: GeminiClient,
}

impl GeminiAdapter {
    pub fn new(api_key: &SecretString, model: &str) -> Result<Self> {
        let config = gemini_chat::Config::builder()
            .with_api_key(api_key.expose_secret())
            .with_model(model)
            .build();
        Self::from_config(config)
    }

    pub fn from_config(config: gemini_chat::Config) -> Result<Self> {
        let client = GeminiClient::new(config).context("Failed to create GeminiAdapter")?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &GeminiClient {
        &self.client
    }
}

#[async_trait]
impl ConversationClient for GeminiAdapter {
    async fn open_session(
        &self,
        system_instruction: &str,
    ) -> Result<Arc<dyn ChatSession>, ConversationError> {
        tracing::info!(model = self.client.config().model(), "Opening Gemini chat session");
        let chat = self.client.start_chat(system_instruction);
        Ok(Arc::new(GeminiChatSession { chat }))
    }
}

struct GeminiChatSession {
    chat: Chat,
}

#[async_trait]
impl ChatSession for GeminiChatSession {
    async fn send_message(&self, text: &str) -> Result<String, ConversationError> {
        self.chat.send_message(text).await.map_err(into_conversation_error)
    }
}

/// Translates client failures into the error kinds the interview understands.
fn into_conversation_error(e: GeminiError) -> ConversationError {
    match e {
        GeminiError::MissingApiKey => ConversationError::MissingCredential,
        GeminiError::Http(e) if e.is_decode() => ConversationError::MalformedResponse(e.to_string()),
        GeminiError::Http(e) => ConversationError::Network(e.to_string()),
        GeminiError::Api { status, message } => {
            ConversationError::Service(format!("{status}: {message}"))
        }
        GeminiError::Blocked(reason) => {
            ConversationError::Service(format!("the reply was blocked ({reason})"))
        }
        GeminiError::EmptyResponse => {
            ConversationError::MalformedResponse("the reply contained no text".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_requires_a_key() {
        let result = GeminiAdapter::new(&SecretString::from(String::new()), "gemini-test");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn opening_a_session_makes_no_request() {
        // --- Arrange ---
        let adapter = GeminiAdapter::new(&SecretString::from("key".to_string()), "gemini-test").unwrap();

        // --- Act ---
        let session = adapter.open_session("You are MentorAI.").await;

        // --- Assert ---
        assert!(session.is_ok());
        assert_eq!(adapter.client().stats().requests(), 0);
    }

    #[test]
    fn service_errors_keep_status_and_message() {
        let mapped = into_conversation_error(GeminiError::Api {
            status: 429,
            message: "Resource has been exhausted".to_string(),
        });
        assert_eq!(
            mapped,
            ConversationError::Service("429: Resource has been exhausted".to_string())
        );
    }

    #[test]
    fn empty_and_blocked_replies_are_distinguished() {
        assert!(matches!(
            into_conversation_error(GeminiError::EmptyResponse),
            ConversationError::MalformedResponse(_)
        ));
        assert_eq!(
            into_conversation_error(GeminiError::Blocked("SAFETY".into())).to_string(),
            "service error: the reply was blocked (SAFETY)"
        );
        assert_eq!(
            into_conversation_error(GeminiError::MissingApiKey),
            ConversationError::MissingCredential
        );
    }
}
