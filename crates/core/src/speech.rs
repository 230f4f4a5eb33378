//! Contracts for the platform speech capabilities.
//!
//! Adapters report asynchronously through a [`SpeechEvent`] channel handed to them
//! at construction; the runtime forwards those events to
//! [`InterviewSession::handle_speech_event`](crate::session_state::InterviewSession::handle_speech_event).

use crate::message::MessageId;
use std::fmt;
use std::time::Duration;

/// Pause between cancelling the current utterance and queueing the next one, so
/// the engine never sees the cancel and the new utterance interleaved.
pub const CANCEL_SETTLE_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpeechError {
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("speech capability unavailable: {0}")]
    Unavailable(String),
    #[error("audio device busy")]
    AudioBusy,
    #[error("{0}")]
    Failed(String),
}

/// Identifies one recording, so events from an abandoned recording can be told
/// apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordingId(pub u64);

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A piece of text to read aloud, tied to the transcript entry it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub message_id: MessageId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// Transcript of the recording so far, replaced on every update.
    Transcript {
        recording: RecordingId,
        text: String,
        is_final: bool,
    },
    InputEnded(RecordingId),
    InputError(RecordingId, SpeechError),
    OutputStarted(MessageId),
    OutputEnded(MessageId),
    OutputError(MessageId, SpeechError),
}

/// Speech-to-text capability.
pub trait SpeechInput: Send {
    /// Begins a recording. Results arrive as [`SpeechEvent::Transcript`] tagged
    /// with `recording`.
    fn start(&mut self, recording: RecordingId) -> Result<(), SpeechError>;
    /// Ends the recording and delivers the final transcript.
    fn stop(&mut self);
    /// Ends the recording and discards pending results.
    fn abort(&mut self);
}

/// Text-to-speech capability. Only one utterance plays at a time.
pub trait SpeechOutput: Send {
    fn speak(&mut self, utterance: Utterance) -> Result<(), SpeechError>;
    fn stop(&mut self);
    fn is_speaking(&self) -> bool;
}

/// Which speech capabilities are present, as found by the probe at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeechCapabilities {
    pub input: bool,
    pub output: bool,
}
