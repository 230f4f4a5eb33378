use crate::probe::EngineCommand;
use anyhow::Context;
use interview_core::message::MessageId;
use interview_core::speech::{SpeechError, SpeechEvent, SpeechOutput, Utterance};
use std::process::Stdio;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// One running text-to-speech process.
struct Playback {
    message_id: MessageId,
    cancel: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

/// Speech output that runs a text-to-speech program once per utterance, passing
/// the text as the last argument. The process exiting is the end of playback.
pub struct CommandSpeaker {
    command: EngineCommand,
    lang: String,
    events: mpsc::Sender<SpeechEvent>,
    current: Option<Playback>,
}

impl CommandSpeaker {
    pub fn new(command: EngineCommand, lang: &str, events: mpsc::Sender<SpeechEvent>) -> Self {
        Self {
            command,
            lang: lang.to_string(),
            events,
            current: None,
        }
    }

    /// Id of the message currently being read aloud, if any.
    pub fn current_message(&self) -> Option<MessageId> {
        self.current
            .as_ref()
            .filter(|p| !p.handle.is_finished())
            .map(|p| p.message_id)
    }

    fn launch(&self, text: &str) -> anyhow::Result<tokio::process::Child> {
        self.command
            .to_command()
            .arg(text)
            .env("SPEECH_LANG", &self.lang)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to launch speech engine {}",
                    self.command.program().display()
                )
            })
    }
}

impl SpeechOutput for CommandSpeaker {
    /// Must be called from within a Tokio runtime.
    fn speak(&mut self, utterance: Utterance) -> Result<(), SpeechError> {
        self.stop();

        let mut child = self.launch(&utterance.text).map_err(|e| {
            tracing::error!("{:#}", e);
            classify_launch_error(&e)
        })?;

        let id = utterance.message_id;
        let events = self.events.clone();
        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let _ = events.send(SpeechEvent::OutputStarted(id)).await;

            let status = tokio::select! {
                status = child.wait() => Some(status),
                _ = &mut cancel_rx => None,
            };

            let event = match status {
                Some(Ok(status)) if status.success() => SpeechEvent::OutputEnded(id),
                Some(Ok(status)) => SpeechEvent::OutputError(
                    id,
                    SpeechError::Failed(format!("speech engine exited with {status}")),
                ),
                Some(Err(e)) => SpeechEvent::OutputError(id, SpeechError::Failed(e.to_string())),
                None => {
                    // Cancelled: make sure the voice actually goes quiet.
                    if let Err(e) = child.kill().await {
                        tracing::warn!("Failed to kill speech engine: {}", e);
                    }
                    SpeechEvent::OutputEnded(id)
                }
            };
            if events.send(event).await.is_err() {
                tracing::debug!("Speech event receiver dropped");
            }
        });

        self.current = Some(Playback {
            message_id: id,
            cancel: Some(cancel_tx),
            handle,
        });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut playback) = self.current.take() {
            if let Some(cancel) = playback.cancel.take() {
                let _ = cancel.send(());
            }
        }
    }

    fn is_speaking(&self) -> bool {
        self.current_message().is_some()
    }
}

impl Drop for CommandSpeaker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Maps a failed launch onto the speech error kinds the session understands.
pub(crate) fn classify_launch_error(e: &anyhow::Error) -> SpeechError {
    match e.downcast_ref::<std::io::Error>().map(|io| io.kind()) {
        Some(std::io::ErrorKind::NotFound) => SpeechError::Unavailable(format!("{e:#}")),
        Some(std::io::ErrorKind::PermissionDenied) => {
            SpeechError::PermissionDenied(format!("{e:#}"))
        }
        _ => SpeechError::Failed(format!("{e:#}")),
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use interview_core::message::{Sender, Transcript};
    use std::time::Duration;

    async fn next(rx: &mut mpsc::Receiver<SpeechEvent>) -> SpeechEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a speech event")
            .expect("event channel closed")
    }

    fn utterance(text: &str) -> Utterance {
        let mut transcript = Transcript::new();
        let message_id = transcript.push(Sender::Ai, text);
        Utterance {
            message_id,
            text: text.to_string(),
        }
    }

    #[tokio::test]
    async fn process_exit_ends_playback() {
        // --- Arrange ---
        let (tx, mut rx) = mpsc::channel(8);
        let mut speaker = CommandSpeaker::new(EngineCommand::new("true", Vec::<String>::new()), "en-US", tx);
        let utterance = utterance("Hello there");
        let id = utterance.message_id;

        // --- Act ---
        speaker.speak(utterance).unwrap();

        // --- Assert ---
        assert_eq!(next(&mut rx).await, SpeechEvent::OutputStarted(id));
        assert_eq!(next(&mut rx).await, SpeechEvent::OutputEnded(id));
    }

    #[tokio::test]
    async fn stop_kills_a_long_utterance() {
        let (tx, mut rx) = mpsc::channel(8);
        // `sleep 30` stands in for a voice reading a long answer.
        let mut speaker = CommandSpeaker::new(EngineCommand::new("sleep", Vec::<String>::new()), "en-US", tx);
        let utterance = utterance("30");
        let id = utterance.message_id;

        speaker.speak(utterance).unwrap();
        assert_eq!(next(&mut rx).await, SpeechEvent::OutputStarted(id));
        assert!(speaker.is_speaking());

        speaker.stop();

        assert_eq!(next(&mut rx).await, SpeechEvent::OutputEnded(id));
        assert!(!speaker.is_speaking());
    }

    #[tokio::test]
    async fn failing_engine_reports_an_error() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut speaker = CommandSpeaker::new(EngineCommand::new("false", Vec::<String>::new()), "en-US", tx);
        let utterance = utterance("anything");
        let id = utterance.message_id;

        speaker.speak(utterance).unwrap();

        assert_eq!(next(&mut rx).await, SpeechEvent::OutputStarted(id));
        assert!(matches!(
            next(&mut rx).await,
            SpeechEvent::OutputError(failed, SpeechError::Failed(_)) if failed == id
        ));
    }

    #[tokio::test]
    async fn missing_program_is_unavailable() {
        let (tx, _rx) = mpsc::channel(8);
        let mut speaker = CommandSpeaker::new(
            EngineCommand::new("/nonexistent/voice-engine", Vec::<String>::new()),
            "en-US",
            tx,
        );

        let err = speaker.speak(utterance("hello")).unwrap_err();

        assert!(matches!(err, SpeechError::Unavailable(_)));
        assert!(!speaker.is_speaking());
    }
}
