use crate::probe::EngineCommand;
use crate::speaker::classify_launch_error;
use anyhow::Context;
use interview_core::speech::{RecordingId, SpeechError, SpeechEvent, SpeechInput};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Finish {
    /// Keep what was heard and deliver it as the final transcript.
    Stop,
    /// Throw away everything heard so far.
    Abort,
}

struct Recording {
    finish: Option<oneshot::Sender<Finish>>,
    handle: JoinHandle<()>,
}

/// Speech input backed by an external dictation command.
///
/// The command records from the microphone and prints its transcript of the
/// utterance so far, one line per update. Every line replaces the previous one;
/// the last line seen is the final transcript.
pub struct CommandTranscriber {
    command: EngineCommand,
    lang: String,
    events: mpsc::Sender<SpeechEvent>,
    current: Option<Recording>,
}

impl CommandTranscriber {
    pub fn new(command: EngineCommand, lang: &str, events: mpsc::Sender<SpeechEvent>) -> Self {
        Self {
            command,
            lang: lang.to_string(),
            events,
            current: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    fn launch(&self) -> anyhow::Result<tokio::process::Child> {
        self.command
            .to_command()
            .env("SPEECH_LANG", &self.lang)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to launch dictation command {}",
                    self.command.program().display()
                )
            })
    }

    fn finish(&mut self, how: Finish) {
        if let Some(mut recording) = self.current.take() {
            if let Some(finish) = recording.finish.take() {
                let _ = finish.send(how);
            }
        }
    }
}

impl SpeechInput for CommandTranscriber {
    /// Must be called from within a Tokio runtime.
    fn start(&mut self, recording: RecordingId) -> Result<(), SpeechError> {
        if self.is_recording() {
            return Err(SpeechError::Failed("a recording is already running".to_string()));
        }

        let mut child = self.launch().map_err(|e| {
            tracing::error!("{:#}", e);
            classify_launch_error(&e)
        })?;
        let Some(stdout) = child.stdout.take() else {
            return Err(SpeechError::Failed(
                "dictation command has no output stream".to_string(),
            ));
        };

        let events = self.events.clone();
        let (finish_tx, mut finish_rx) = oneshot::channel::<Finish>();

        let handle = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            let mut heard = String::new();

            let finish = loop {
                tokio::select! {
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            let line = line.trim();
                            if line.is_empty() {
                                continue;
                            }
                            heard = line.to_string();
                            let _ = events
                                .send(SpeechEvent::Transcript {
                                    recording,
                                    text: heard.clone(),
                                    is_final: false,
                                })
                                .await;
                        }
                        // The command exited on its own.
                        Ok(None) => break None,
                        Err(e) => {
                            let _ = events
                                .send(SpeechEvent::InputError(
                                    recording,
                                    SpeechError::Failed(e.to_string()),
                                ))
                                .await;
                            break Some(Finish::Abort);
                        }
                    },
                    how = &mut finish_rx => break Some(how.unwrap_or(Finish::Abort)),
                }
            };

            if finish.is_some() {
                if let Err(e) = child.kill().await {
                    tracing::warn!("Failed to kill dictation command: {}", e);
                }
            } else {
                match child.wait().await {
                    Ok(status) if !status.success() && heard.is_empty() => {
                        let _ = events
                            .send(SpeechEvent::InputError(
                                recording,
                                SpeechError::Failed(format!("dictation command exited with {status}")),
                            ))
                            .await;
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Failed to wait for dictation command: {}", e),
                }
            }

            if finish != Some(Finish::Abort) && !heard.is_empty() {
                let _ = events
                    .send(SpeechEvent::Transcript {
                        recording,
                        text: heard,
                        is_final: true,
                    })
                    .await;
            }
            if events.send(SpeechEvent::InputEnded(recording)).await.is_err() {
                tracing::debug!("Speech event receiver dropped");
            }
        });

        self.current = Some(Recording {
            finish: Some(finish_tx),
            handle,
        });
        tracing::debug!("Dictation {} started", recording);
        Ok(())
    }

    fn stop(&mut self) {
        self.finish(Finish::Stop);
    }

    fn abort(&mut self) {
        self.finish(Finish::Abort);
    }
}

impl Drop for CommandTranscriber {
    fn drop(&mut self) {
        self.abort();
    }
}
