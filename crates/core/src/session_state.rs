use crate::completion::CompletionDetector;
use crate::conversation::{ChatSession, ConversationClient, ConversationError};
use crate::error::{InterviewError, SubmitRejected};
use crate::message::{Message, MessageId, Sender, Transcript};
use crate::prompt::{self, APOLOGY_MESSAGE, BOOTSTRAP_MESSAGE, DEFAULT_SYSTEM_PROMPT};
use crate::setup::SessionSetup;
use crate::speech::{
    CANCEL_SETTLE_DELAY, RecordingId, SpeechCapabilities, SpeechError, SpeechEvent, SpeechInput,
    SpeechOutput, Utterance,
};
use crate::timer::Countdown;
use std::sync::Arc;
use tokio::sync::watch;

/// Lifecycle of one interview.
///
/// `NotStarted -> LoadingSystemPrompt -> InProgress -> Completed`, with
/// `LoadingSystemPrompt -> NotStarted` when initialization fails and a restart
/// edge from every state back to `NotStarted`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterviewState {
    NotStarted,
    LoadingSystemPrompt,
    InProgress,
    Completed,
}

/// Everything needed to open the conversation, detached from the session so the
/// round trip can be awaited while the session keeps handling events.
pub struct InitRequest {
    client: Arc<dyn ConversationClient>,
    system_instruction: String,
    generation: u64,
}

impl InitRequest {
    pub fn system_instruction(&self) -> &str {
        &self.system_instruction
    }

    /// Opens the chat and asks the interviewer for its opening turn.
    pub async fn run(self) -> InitOutcome {
        let result = async {
            let chat = self.client.open_session(&self.system_instruction).await?;
            let reply = chat.send_message(BOOTSTRAP_MESSAGE).await?;
            Ok::<_, ConversationError>((chat, reply))
        }
        .await;
        InitOutcome {
            generation: self.generation,
            result,
        }
    }
}

pub struct InitOutcome {
    generation: u64,
    result: Result<(Arc<dyn ChatSession>, String), ConversationError>,
}

/// One user message on its way to the interviewer.
pub struct TurnRequest {
    chat: Arc<dyn ChatSession>,
    text: String,
    generation: u64,
}

impl TurnRequest {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub async fn run(self) -> TurnOutcome {
        let result = self.chat.send_message(&self.text).await;
        TurnOutcome {
            generation: self.generation,
            result,
        }
    }
}

pub struct TurnOutcome {
    generation: u64,
    result: Result<String, ConversationError>,
}

/// The signals the presentation layer renders from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub state: InterviewState,
    pub is_loading: bool,
    pub error: Option<InterviewError>,
    pub seconds_remaining: u64,
    pub is_recording: bool,
    pub speaking_message_id: Option<MessageId>,
    pub auto_play: bool,
    pub speech_input_available: bool,
    pub speech_output_available: bool,
}

type RecordingHook = Box<dyn FnMut(bool) + Send>;

/// Owns the interview: lifecycle state, transcript, countdown and the speech
/// capability handles.
///
/// Network round trips are split in two halves. [`start`](Self::start) and
/// [`submit_user_message`](Self::submit_user_message) update state synchronously
/// and hand back a request; the caller awaits `run()` on it and passes the outcome
/// to [`complete_initialize`](Self::complete_initialize) or
/// [`complete_turn`](Self::complete_turn). Outcomes that belong to an interview
/// which has since been restarted are dropped.
pub struct InterviewSession {
    state: InterviewState,
    setup: SessionSetup,
    transcript: Transcript,
    client: Option<Arc<dyn ConversationClient>>,
    chat: Option<Arc<dyn ChatSession>>,
    countdown: Countdown,
    is_loading: bool,
    error: Option<InterviewError>,
    input_text: String,
    is_recording: bool,
    // Latest recording handed to the speech input; events for older ones are stale.
    recording: RecordingId,
    speaking_message_id: Option<MessageId>,
    auto_play: bool,
    speech_input: Option<Box<dyn SpeechInput>>,
    speech_output: Option<Box<dyn SpeechOutput>>,
    detector: CompletionDetector,
    system_prompt: String,
    recording_hook: Option<RecordingHook>,
    generation: u64,
}

impl InterviewSession {
    /// Creates a session. `client` is `None` when no credential is configured, in
    /// which case every start attempt fails with a configuration error.
    pub fn new(client: Option<Arc<dyn ConversationClient>>) -> Self {
        Self {
            state: InterviewState::NotStarted,
            setup: SessionSetup::default(),
            transcript: Transcript::new(),
            client,
            chat: None,
            countdown: Countdown::new(),
            is_loading: false,
            error: None,
            input_text: String::new(),
            is_recording: false,
            recording: RecordingId(0),
            speaking_message_id: None,
            auto_play: true,
            speech_input: None,
            speech_output: None,
            detector: CompletionDetector::default(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            recording_hook: None,
            generation: 0,
        }
    }

    pub fn with_setup(mut self, setup: SessionSetup) -> Self {
        self.setup = setup;
        self
    }

    pub fn with_speech_input(mut self, input: Box<dyn SpeechInput>) -> Self {
        self.speech_input = Some(input);
        self
    }

    pub fn with_speech_output(mut self, output: Box<dyn SpeechOutput>) -> Self {
        self.speech_output = Some(output);
        self
    }

    pub fn with_auto_play(mut self, enabled: bool) -> Self {
        self.auto_play = enabled;
        self
    }

    pub fn with_system_prompt(mut self, template: impl Into<String>) -> Self {
        self.system_prompt = template.into();
        self
    }

    pub fn with_completion_detector(mut self, detector: CompletionDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Registers a callback run every time the recording flag flips.
    pub fn on_recording_changed(&mut self, hook: impl FnMut(bool) + Send + 'static) {
        self.recording_hook = Some(Box::new(hook));
    }

    pub fn state(&self) -> InterviewState {
        self.state
    }

    pub fn setup(&self) -> &SessionSetup {
        &self.setup
    }

    /// Replaces the interview form. Only allowed before the interview starts.
    pub fn update_setup(&mut self, setup: SessionSetup) -> Result<(), InterviewError> {
        if self.state != InterviewState::NotStarted {
            return Err(InterviewError::InvalidState(self.state));
        }
        self.setup = setup;
        Ok(())
    }

    pub fn messages(&self) -> &[Message] {
        self.transcript.messages()
    }

    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.transcript.visible()
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.transcript.get(id)
    }

    pub fn error(&self) -> Option<&InterviewError> {
        self.error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn seconds_remaining(&self) -> u64 {
        self.countdown.remaining()
    }

    /// Follows the countdown tick by tick.
    pub fn timer_updates(&self) -> watch::Receiver<u64> {
        self.countdown.subscribe()
    }

    pub fn is_timer_running(&self) -> bool {
        self.countdown.is_running()
    }

    pub fn input_text(&self) -> &str {
        &self.input_text
    }

    pub fn set_input_text(&mut self, text: impl Into<String>) {
        self.input_text = text.into();
    }

    pub fn is_recording(&self) -> bool {
        self.is_recording
    }

    pub fn speaking_message_id(&self) -> Option<MessageId> {
        self.speaking_message_id
    }

    pub fn auto_play(&self) -> bool {
        self.auto_play
    }

    pub fn speech_input_available(&self) -> bool {
        self.speech_capabilities().input
    }

    pub fn speech_output_available(&self) -> bool {
        self.speech_capabilities().output
    }

    /// The speech adapters this session was assembled with.
    pub fn speech_capabilities(&self) -> SpeechCapabilities {
        SpeechCapabilities {
            input: self.speech_input.is_some(),
            output: self.speech_output.is_some(),
        }
    }

    /// Whether the user may currently send an answer.
    pub fn input_enabled(&self) -> bool {
        self.state == InterviewState::InProgress
            && !self.is_loading
            && self.countdown.remaining() > 0
    }

    pub fn is_time_up(&self) -> bool {
        self.state == InterviewState::InProgress && self.countdown.remaining() == 0
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let speech = self.speech_capabilities();
        SessionSnapshot {
            state: self.state,
            is_loading: self.is_loading,
            error: self.error.clone(),
            seconds_remaining: self.countdown.remaining(),
            is_recording: self.is_recording,
            speaking_message_id: self.speaking_message_id,
            auto_play: self.auto_play,
            speech_input_available: speech.input,
            speech_output_available: speech.output,
        }
    }

    /// Validates the setup and moves to `LoadingSystemPrompt`.
    ///
    /// On success the returned request must be run and its outcome passed to
    /// [`complete_initialize`](Self::complete_initialize). On failure the session
    /// stays `NotStarted` and the error is also kept for display.
    pub fn start(&mut self) -> Result<InitRequest, InterviewError> {
        if self.state != InterviewState::NotStarted {
            return Err(InterviewError::InvalidState(self.state));
        }
        let Some(client) = self.client.clone() else {
            return Err(self.fail(InterviewError::Config(
                "Cannot start the interview: API key is missing.".to_string(),
            )));
        };
        if let Err(err) = self.setup.validate() {
            return Err(self.fail(err));
        }

        self.error = None;
        self.transcript.clear();
        self.input_text.clear();
        self.chat = None;
        self.countdown.reset(self.setup.duration_seconds());
        self.state = InterviewState::LoadingSystemPrompt;
        self.is_loading = true;
        self.generation += 1;

        tracing::info!(
            job_role = %self.setup.job_role,
            duration_minutes = self.setup.duration_minutes,
            "Starting interview"
        );

        Ok(InitRequest {
            client,
            system_instruction: prompt::render_system_prompt(&self.system_prompt, &self.setup),
            generation: self.generation,
        })
    }

    /// Applies the outcome of an [`InitRequest`]. Returns `false` when the outcome
    /// belonged to an interview that has since been restarted and was dropped.
    pub async fn complete_initialize(&mut self, outcome: InitOutcome) -> bool {
        if outcome.generation != self.generation
            || self.state != InterviewState::LoadingSystemPrompt
        {
            tracing::debug!("Discarding initialization outcome from a restarted interview");
            return false;
        }
        self.is_loading = false;

        match outcome.result {
            Ok((chat, reply)) => {
                self.chat = Some(chat);
                self.state = InterviewState::InProgress;
                self.countdown.resume();
                tracing::info!("Interview in progress");
                self.accept_reply(reply).await;
            }
            Err(e) => {
                tracing::error!("Failed to initialize chat session: {}", e);
                self.error = Some(InterviewError::Conversation(format!(
                    "Failed to start interview: {e}. Check your API key and network."
                )));
                self.countdown.reset(0);
                self.state = InterviewState::NotStarted;
            }
        }
        true
    }

    /// Appends the user's answer and returns the request that delivers it.
    pub fn submit_user_message(&mut self, text: &str) -> Result<TurnRequest, SubmitRejected> {
        match self.state {
            InterviewState::InProgress => {}
            // The opening question is still on its way.
            InterviewState::LoadingSystemPrompt => return Err(SubmitRejected::ReplyPending),
            _ => return Err(SubmitRejected::NotInProgress),
        }
        if self.is_loading {
            return Err(SubmitRejected::ReplyPending);
        }
        if self.countdown.remaining() == 0 {
            return Err(SubmitRejected::TimeUp);
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(SubmitRejected::EmptyMessage);
        }
        let Some(chat) = self.chat.clone() else {
            return Err(SubmitRejected::NotInProgress);
        };

        self.stop_speaking();
        self.transcript.push(Sender::User, text);
        self.input_text.clear();
        self.is_loading = true;
        self.error = None;

        Ok(TurnRequest {
            chat,
            text: text.to_string(),
            generation: self.generation,
        })
    }

    /// Applies the outcome of a [`TurnRequest`]. Returns `false` when the reply was
    /// dropped because the interview has been restarted or has ended.
    pub async fn complete_turn(&mut self, outcome: TurnOutcome) -> bool {
        if outcome.generation != self.generation || self.state != InterviewState::InProgress {
            tracing::debug!("Discarding reply from a restarted interview");
            return false;
        }
        self.is_loading = false;

        match outcome.result {
            Ok(reply) => self.accept_reply(reply).await,
            Err(e) => {
                tracing::error!("Failed to send message or get response: {}", e);
                self.error = Some(InterviewError::Conversation(format!(
                    "Error communicating with AI: {e}"
                )));
                // A failed turn keeps the interview going.
                let id = self.transcript.push(Sender::Ai, APOLOGY_MESSAGE);
                if self.auto_play {
                    self.speak_message(id).await;
                }
            }
        }
        true
    }

    async fn accept_reply(&mut self, reply: String) {
        let inspection = self.detector.inspect(&reply);
        let id = self.transcript.push(Sender::Ai, inspection.text);

        if inspection.completed {
            self.state = InterviewState::Completed;
            self.countdown.stop();
            tracing::info!(
                seconds_remaining = self.countdown.remaining(),
                "Interview completed"
            );
        }
        if self.auto_play {
            self.speak_message(id).await;
        }
    }

    /// Abandons the current interview and goes back to the form, keeping the setup.
    pub fn restart(&mut self) {
        self.stop_speaking();
        if self.is_recording {
            if let Some(input) = self.speech_input.as_mut() {
                input.abort();
            }
            self.set_recording(false);
        }
        self.countdown.reset(0);
        self.transcript.clear();
        self.chat = None;
        self.error = None;
        self.input_text.clear();
        self.is_loading = false;
        self.generation += 1;
        self.state = InterviewState::NotStarted;
        tracing::info!("Interview restarted");
    }

    pub fn set_auto_play(&mut self, enabled: bool) {
        self.auto_play = enabled;
        if !enabled {
            self.stop_speaking();
        }
    }

    /// Reads a message aloud, replacing whatever is playing.
    pub async fn speak_message(&mut self, id: MessageId) {
        let Some(text) = self.transcript.get(id).map(|m| m.text().to_string()) else {
            tracing::warn!("No message {} to speak", id);
            return;
        };
        if self.speech_output.is_none() {
            tracing::warn!("Speech synthesis not available");
            return;
        }

        self.stop_speaking();
        tokio::time::sleep(CANCEL_SETTLE_DELAY).await;

        let Some(output) = self.speech_output.as_mut() else {
            return;
        };
        match output.speak(Utterance {
            message_id: id,
            text,
        }) {
            Ok(()) => self.speaking_message_id = Some(id),
            Err(e) => {
                self.error = Some(InterviewError::SpeechOutput(describe_output_error(&e)));
                self.speaking_message_id = None;
            }
        }
    }

    /// Speaker button on a message: stops it if it is playing, otherwise plays it.
    pub async fn toggle_message_speech(&mut self, id: MessageId) {
        if self.speaking_message_id == Some(id) {
            self.stop_speaking();
        } else {
            self.speak_message(id).await;
        }
    }

    pub fn stop_speaking(&mut self) {
        if let Some(output) = self.speech_output.as_mut() {
            if output.is_speaking() {
                output.stop();
            }
        }
        self.speaking_message_id = None;
    }

    /// Microphone button: stops an active recording, otherwise starts one.
    pub fn toggle_recording(&mut self) -> Result<(), InterviewError> {
        if self.is_recording {
            if let Some(input) = self.speech_input.as_mut() {
                input.stop();
            }
            return Ok(());
        }
        if !self.input_enabled() {
            return Err(InterviewError::InvalidState(self.state));
        }

        self.stop_speaking();
        self.input_text.clear();
        self.recording = RecordingId(self.recording.0 + 1);
        let recording = self.recording;
        let started = match self.speech_input.as_mut() {
            Some(input) => input.start(recording),
            None => Err(SpeechError::Unavailable(
                "no speech recognition engine was found".to_string(),
            )),
        };

        match started {
            Ok(()) => {
                self.error = None;
                self.set_recording(true);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Error starting speech recognition: {}", e);
                self.set_recording(false);
                Err(self.fail(InterviewError::SpeechInput(describe_input_error(&e))))
            }
        }
    }

    pub fn handle_speech_event(&mut self, event: SpeechEvent) {
        match event {
            SpeechEvent::Transcript { recording, .. }
            | SpeechEvent::InputEnded(recording)
            | SpeechEvent::InputError(recording, _)
                if recording != self.recording =>
            {
                tracing::debug!(
                    "Ignoring event from recording {} (current is {})",
                    recording,
                    self.recording
                );
            }
            SpeechEvent::Transcript { text, is_final, .. } => {
                if self.is_recording {
                    tracing::trace!(is_final, "Transcript update");
                    self.input_text = text;
                }
            }
            SpeechEvent::InputEnded(_) => self.set_recording(false),
            SpeechEvent::InputError(_, e) => {
                tracing::error!("Speech recognition error: {}", e);
                self.error = Some(InterviewError::SpeechInput(format!(
                    "Speech recognition error: {e}."
                )));
                self.set_recording(false);
            }
            SpeechEvent::OutputStarted(id) => {
                tracing::debug!("Speaking message {}", id);
            }
            SpeechEvent::OutputEnded(id) => {
                if self.speaking_message_id == Some(id) {
                    self.speaking_message_id = None;
                }
            }
            SpeechEvent::OutputError(id, e) => {
                tracing::error!("Speech synthesis error for message {}: {}", id, e);
                self.error = Some(InterviewError::SpeechOutput(describe_output_error(&e)));
                if self.speaking_message_id == Some(id) {
                    self.speaking_message_id = None;
                }
            }
        }
    }

    fn set_recording(&mut self, active: bool) {
        if self.is_recording == active {
            return;
        }
        self.is_recording = active;
        tracing::debug!(active, "Recording state changed");
        if let Some(hook) = self.recording_hook.as_mut() {
            hook(active);
        }
    }

    fn fail(&mut self, err: InterviewError) -> InterviewError {
        self.error = Some(err.clone());
        err
    }
}

impl Drop for InterviewSession {
    fn drop(&mut self) {
        if let Some(output) = self.speech_output.as_mut() {
            output.stop();
        }
        if self.is_recording {
            if let Some(input) = self.speech_input.as_mut() {
                input.abort();
            }
        }
    }
}

fn describe_input_error(e: &SpeechError) -> String {
    match e {
        SpeechError::Unavailable(_) => format!("Speech recognition is not available: {e}."),
        _ => format!("Could not start microphone: {e}. Please check permissions."),
    }
}

fn describe_output_error(e: &SpeechError) -> String {
    match e {
        SpeechError::AudioBusy => "Speech synthesis error: audio-busy. The audio device might \
                                   be busy. Please try again shortly."
            .to_string(),
        SpeechError::Failed(detail) => {
            tracing::warn!("Unclassified speech synthesis failure: {}", detail);
            "An unknown error occurred during speech synthesis.".to_string()
        }
        _ => format!("Speech synthesis error: {e}."),
    }
}
