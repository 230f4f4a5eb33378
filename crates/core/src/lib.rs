//! Domain core of the mock interview assistant.
//!
//! Everything here is independent of any particular chat service or speech
//! engine: those plug in through the traits in [`conversation`] and [`speech`].

pub mod completion;
pub mod conversation;
pub mod error;
pub mod message;
pub mod prompt;
pub mod session_state;
pub mod setup;
pub mod speech;
pub mod timer;

pub use conversation::{ChatSession, ConversationClient, ConversationError};
pub use error::{InterviewError, SubmitRejected};
pub use message::{Message, MessageId, Sender};
pub use session_state::{InterviewSession, InterviewState, SessionSnapshot};
pub use setup::SessionSetup;
pub use speech::{RecordingId, SpeechCapabilities, SpeechError, SpeechEvent, SpeechInput, SpeechOutput};
