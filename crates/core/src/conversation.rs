use async_trait::async_trait;
use std::sync::Arc;

/// Failure of a round trip to the hosted model. The session only ever shows the
/// message, so the variants exist for logging and adapter tests.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConversationError {
    #[error("API key is missing")]
    MissingCredential,
    #[error("network error: {0}")]
    Network(String),
    #[error("service error: {0}")]
    Service(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// A provider able to open chat sessions scoped to a system instruction.
/// This lets the interview run against different backends (Gemini, OpenAI)
/// through a common interface.
#[async_trait]
pub trait ConversationClient: Send + Sync {
    async fn open_session(
        &self,
        system_instruction: &str,
    ) -> Result<Arc<dyn ChatSession>, ConversationError>;
}

/// An open conversation. The session keeps its own history, so callers only
/// send the newest user message.
#[async_trait]
pub trait ChatSession: Send + Sync {
    async fn send_message(&self, text: &str) -> Result<String, ConversationError>;
}
