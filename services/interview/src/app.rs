//! The console event loop.
//!
//! One task owns the [`InterviewSession`] and multiplexes console input, speech
//! events, conversation outcomes and countdown ticks. Network round trips run in
//! spawned tasks and report back through a channel, so the loop never blocks on
//! the interviewer.

use crate::console::{self, Command};
use anyhow::Result;
use interview_core::error::InterviewError;
use interview_core::message::Sender;
use interview_core::session_state::{InitOutcome, InterviewSession, InterviewState, TurnOutcome};
use interview_core::setup::{DURATION_RANGE_MINUTES, SessionSetup};
use interview_core::speech::SpeechEvent;
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch};

/// Result of a spawned conversation request.
pub enum Outcome {
    Init(InitOutcome),
    Turn(TurnOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Receivers the event loop waits on.
pub struct Inbox {
    outcomes: mpsc::Receiver<Outcome>,
    speech: mpsc::Receiver<SpeechEvent>,
    recording: mpsc::UnboundedReceiver<bool>,
    timer: watch::Receiver<u64>,
}

pub struct App<W> {
    session: InterviewSession,
    out: W,
    outcomes_tx: mpsc::Sender<Outcome>,
    auto_start: bool,
    // Visible messages already printed.
    rendered: usize,
    time_up_announced: bool,
}

impl<W: Write> App<W> {
    pub fn new(
        mut session: InterviewSession,
        out: W,
        speech: mpsc::Receiver<SpeechEvent>,
    ) -> (Self, Inbox) {
        let (outcomes_tx, outcomes) = mpsc::channel(8);
        let (recording_tx, recording) = mpsc::unbounded_channel();
        session.on_recording_changed(move |active| {
            let _ = recording_tx.send(active);
        });
        let timer = session.timer_updates();

        let app = Self {
            session,
            out,
            outcomes_tx,
            auto_start: false,
            rendered: 0,
            time_up_announced: false,
        };
        let inbox = Inbox {
            outcomes,
            speech,
            recording,
            timer,
        };
        (app, inbox)
    }

    /// Starts the interview as soon as the loop runs.
    pub fn with_auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn session(&self) -> &InterviewSession {
        &self.session
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    /// Runs until `/quit` or the end of input.
    ///
    /// Commands keep working while the interviewer is replying; only answers are
    /// turned away until the reply has arrived.
    pub async fn run<R>(&mut self, input: R, mut inbox: Inbox) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();

        writeln!(self.out, "Mock interview practice. Type /help for commands.")?;
        writeln!(self.out, "{}", console::render_setup(self.session.setup()))?;
        if self.auto_start && self.start_interview()? == Flow::Quit {
            return Ok(());
        }

        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => {
                        if self.handle_line(&line).await? == Flow::Quit {
                            break;
                        }
                    }
                    None => {
                        tracing::info!("Input closed, shutting down...");
                        break;
                    }
                },
                Some(outcome) = inbox.outcomes.recv() => self.apply(outcome).await?,
                Some(event) = inbox.speech.recv() => self.on_speech_event(event)?,
                Some(active) = inbox.recording.recv() => self.on_recording_changed(active)?,
                Ok(()) = inbox.timer.changed() => {
                    let remaining = *inbox.timer.borrow_and_update();
                    self.on_tick(remaining)?;
                }
                else => break,
            }
            self.out.flush()?;
        }
        Ok(())
    }

    async fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let Some(command) = console::parse_line(line) else {
            return Ok(Flow::Continue);
        };
        tracing::debug!(?command, "Console command");

        match command {
            Command::Quit => return Ok(Flow::Quit),
            Command::Help => writeln!(self.out, "{}", console::HELP)?,
            Command::Role(role) => self.edit_setup(|s| s.job_role = role)?,
            Command::Skills(skills) => self.edit_setup(|s| s.skills = skills)?,
            Command::Projects(projects) => self.edit_setup(|s| s.projects = projects)?,
            Command::Duration(arg) => match arg.parse::<u32>() {
                Ok(minutes) if DURATION_RANGE_MINUTES.contains(&minutes) => {
                    self.edit_setup(|s| s.duration_minutes = minutes)?
                }
                _ => writeln!(
                    self.out,
                    "Duration must be between {} and {} minutes.",
                    DURATION_RANGE_MINUTES.start(),
                    DURATION_RANGE_MINUTES.end()
                )?,
            },
            Command::Start => return self.start_interview(),
            Command::Answer(text) => self.submit(&text)?,
            Command::Send => {
                let draft = self.session.input_text().to_string();
                if draft.trim().is_empty() {
                    writeln!(self.out, "Nothing dictated yet. Use /record first.")?;
                } else {
                    self.submit(&draft)?;
                }
            }
            Command::Record => match self.session.toggle_recording() {
                Ok(()) => {}
                Err(InterviewError::InvalidState(_)) => writeln!(
                    self.out,
                    "Dictation is only available while the interviewer waits for your answer."
                )?,
                Err(_) => self.report_error()?,
            },
            Command::Voice => {
                let enabled = !self.session.auto_play();
                self.session.set_auto_play(enabled);
                let note = if self.session.speech_output_available() {
                    ""
                } else {
                    " (no voice is available on this system)"
                };
                writeln!(
                    self.out,
                    "Reading replies aloud: {}{note}",
                    if enabled { "on" } else { "off" }
                )?;
            }
            Command::Speak(arg) => self.speak(&arg).await?,
            Command::Stop => self.session.stop_speaking(),
            Command::Status => {
                let status = console::render_status(&self.session.snapshot(), self.session.setup());
                writeln!(self.out, "{status}")?;
            }
            Command::Restart => {
                self.session.restart();
                self.rendered = 0;
                self.time_up_announced = false;
                writeln!(self.out, "Interview reset. Your setup was kept:")?;
                writeln!(self.out, "{}", console::render_setup(self.session.setup()))?;
            }
            Command::Unknown(input) => writeln!(
                self.out,
                "Unknown command: {input}. Type /help for the list."
            )?,
        }
        Ok(Flow::Continue)
    }

    fn edit_setup(&mut self, edit: impl FnOnce(&mut SessionSetup)) -> Result<()> {
        let mut setup = self.session.setup().clone();
        edit(&mut setup);
        match self.session.update_setup(setup) {
            Ok(()) => writeln!(self.out, "{}", console::render_setup(self.session.setup()))?,
            Err(_) => writeln!(
                self.out,
                "The setup can only be changed before the interview starts. Type /restart first."
            )?,
        }
        Ok(())
    }

    fn start_interview(&mut self) -> Result<Flow> {
        match self.session.start() {
            Ok(request) => {
                self.rendered = 0;
                self.time_up_announced = false;
                writeln!(
                    self.out,
                    "Starting a {} minute interview for {}...",
                    self.session.setup().duration_minutes,
                    self.session.setup().job_role.trim()
                )?;
                let tx = self.outcomes_tx.clone();
                tokio::spawn(async move {
                    let outcome = request.run().await;
                    if tx.send(Outcome::Init(outcome)).await.is_err() {
                        tracing::warn!("Interview loop is gone, dropping initialization result");
                    }
                });
            }
            Err(InterviewError::InvalidState(_)) => {
                writeln!(self.out, "The interview is already running. Type /restart to start over.")?;
            }
            Err(e) => {
                self.report_error()?;
                if e.is_fatal() {
                    writeln!(self.out, "Configuration Error: the interview cannot start.")?;
                    return Ok(Flow::Quit);
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn submit(&mut self, text: &str) -> Result<()> {
        match self.session.submit_user_message(text) {
            Ok(request) => {
                self.render_new_messages()?;
                writeln!(self.out, "Interviewer is thinking...")?;
                let tx = self.outcomes_tx.clone();
                tokio::spawn(async move {
                    let outcome = request.run().await;
                    if tx.send(Outcome::Turn(outcome)).await.is_err() {
                        tracing::warn!("Interview loop is gone, dropping reply");
                    }
                });
            }
            Err(rejected) => {
                tracing::debug!("Answer ignored: {}", rejected);
                if let Some(notice) = console::rejection_notice(rejected) {
                    writeln!(self.out, "{notice}")?;
                }
            }
        }
        Ok(())
    }

    async fn speak(&mut self, arg: &str) -> Result<()> {
        if !self.session.speech_output_available() {
            writeln!(self.out, "No voice is available on this system.")?;
            return Ok(());
        }
        let target = arg
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| self.session.visible_messages().nth(index))
            .filter(|m| m.sender() == Sender::Ai)
            .map(|m| m.id());
        match target {
            Some(id) => {
                self.session.toggle_message_speech(id).await;
                self.report_error()?;
            }
            None => writeln!(self.out, "There is no interviewer message number {arg}.")?,
        }
        Ok(())
    }

    async fn apply(&mut self, outcome: Outcome) -> Result<()> {
        let applied = match outcome {
            Outcome::Init(outcome) => self.session.complete_initialize(outcome).await,
            Outcome::Turn(outcome) => self.session.complete_turn(outcome).await,
        };
        // A reply to an interview that was restarted meanwhile.
        if !applied {
            return Ok(());
        }
        self.render_new_messages()?;
        self.report_error()?;

        match self.session.state() {
            InterviewState::Completed => writeln!(self.out, "{}", console::COMPLETED_NOTICE)?,
            InterviewState::InProgress if !self.session.is_time_up() => writeln!(
                self.out,
                "({} left) Your answer:",
                console::format_timer(self.session.seconds_remaining())
            )?,
            InterviewState::NotStarted => writeln!(self.out, "Type /start to try again.")?,
            _ => {}
        }
        Ok(())
    }

    fn on_speech_event(&mut self, event: SpeechEvent) -> Result<()> {
        let heard = match &event {
            SpeechEvent::Transcript {
                text,
                is_final: true,
                ..
            } => Some(text.clone()),
            _ => None,
        };
        self.session.handle_speech_event(event);
        if let Some(text) = heard {
            if self.session.input_text() == text {
                writeln!(self.out, "Heard: \"{text}\" (type /send to submit it)")?;
            }
        }
        self.report_error()
    }

    fn on_recording_changed(&mut self, active: bool) -> Result<()> {
        if active {
            writeln!(self.out, "Listening... type /record again when you are done.")?;
        } else {
            writeln!(self.out, "Stopped listening.")?;
        }
        Ok(())
    }

    fn on_tick(&mut self, remaining: u64) -> Result<()> {
        if self.session.is_time_up() {
            if !self.time_up_announced {
                self.time_up_announced = true;
                writeln!(self.out, "{}", console::TIME_UP_NOTICE)?;
            }
        } else if self.session.state() == InterviewState::InProgress
            && remaining > 0
            && remaining % 60 == 0
        {
            writeln!(self.out, "({} left)", console::format_timer(remaining))?;
        }
        Ok(())
    }

    fn render_new_messages(&mut self) -> Result<()> {
        let lines: Vec<String> = self
            .session
            .visible_messages()
            .enumerate()
            .skip(self.rendered)
            .map(|(index, message)| console::render_message(index + 1, message))
            .collect();
        self.rendered += lines.len();
        for line in lines {
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }

    /// Prints the session's pending error once, then clears it.
    fn report_error(&mut self) -> Result<()> {
        if let Some(error) = self.session.error() {
            writeln!(self.out, "Error: {error}")?;
            self.session.clear_error();
        }
        Ok(())
    }
}
