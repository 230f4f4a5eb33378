use crate::session_state::InterviewState;

/// User-visible failures surfaced by the interview session.
///
/// Every variant carries the message shown to the user. Only [`InterviewError::Config`]
/// blocks the application; the others are transient banners.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InterviewError {
    #[error("{0}")]
    Config(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conversation(String),
    #[error("{0}")]
    SpeechInput(String),
    #[error("{0}")]
    SpeechOutput(String),
    #[error("operation not allowed while the interview is {0:?}")]
    InvalidState(InterviewState),
}

impl InterviewError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, InterviewError::Config(_))
    }
}

/// Why a submitted answer was ignored. Rejections are no-ops, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitRejected {
    #[error("the interview is not in progress")]
    NotInProgress,
    #[error("the message is empty")]
    EmptyMessage,
    #[error("a reply is still pending")]
    ReplyPending,
    #[error("time is up")]
    TimeUp,
}
