//! Speech adapters backed by local programs: a system text-to-speech command
//! for output and an external dictation command for input.

pub mod probe;
pub mod speaker;
pub mod transcriber;

pub use probe::{EngineCommand, SpeechEngines};
pub use speaker::CommandSpeaker;
pub use transcriber::CommandTranscriber;

/// Capacity of the speech event channel shared by both adapters.
pub const EVENT_CHANNEL_CAPACITY: usize = 128;
