//! Console presentation: command parsing and text rendering.
//!
//! Nothing here touches the session directly; the app loop turns commands into
//! session calls and feeds session state back through the render helpers.

use interview_core::error::SubmitRejected;
use interview_core::message::{Message, Sender};
use interview_core::session_state::{InterviewState, SessionSnapshot};
use interview_core::setup::SessionSetup;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Role(String),
    Skills(String),
    Projects(String),
    Duration(String),
    Start,
    /// Free text typed during the interview.
    Answer(String),
    /// Sends the dictated draft.
    Send,
    Record,
    Voice,
    Speak(String),
    Stop,
    Status,
    Restart,
    Help,
    Quit,
    Unknown(String),
}

/// Parses one input line. Blank lines yield `None`.
pub fn parse_line(line: &str) -> Option<Command> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(Command::Answer(line.to_string()));
    };

    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, arg.trim().to_string()),
        None => (rest, String::new()),
    };
    let command = match name.to_lowercase().as_str() {
        "role" => Command::Role(arg),
        "skills" => Command::Skills(arg),
        "projects" => Command::Projects(arg),
        "duration" => Command::Duration(arg),
        "start" => Command::Start,
        "send" => Command::Send,
        "record" | "mic" => Command::Record,
        "voice" => Command::Voice,
        "speak" => Command::Speak(arg),
        "stop" => Command::Stop,
        "status" => Command::Status,
        "restart" => Command::Restart,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => Command::Unknown(line.to_string()),
    };
    Some(command)
}

pub const HELP: &str = "\
Setup:
  /role <job role>        role you are interviewing for (required)
  /skills <skills>        key skills, comma separated
  /projects <overview>    projects to talk about
  /duration <minutes>     interview length, 3-60
  /start                  begin the interview
During the interview:
  <text>                  answer the current question
  /record                 start or stop dictation
  /send                   send the dictated answer
  /voice                  toggle reading replies aloud
  /speak <n>              read interviewer message n aloud (again to stop)
  /stop                   stop reading aloud
  /status                 show timer and settings
  /restart                abandon the interview and start over
  /quit                   exit";

/// Formats seconds as `MM:SS`.
pub fn format_timer(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// One transcript line. `number` is the message's position in the visible transcript.
pub fn render_message(number: usize, message: &Message) -> String {
    match message.sender() {
        Sender::Ai => format!("[{number}] Interviewer: {}", message.text()),
        Sender::User => format!("[{number}] You: {}", message.text()),
    }
}

pub fn render_setup(setup: &SessionSetup) -> String {
    let or_dash = |value: &str| {
        if value.trim().is_empty() {
            "-".to_string()
        } else {
            value.trim().to_string()
        }
    };
    format!(
        "Role: {}\nSkills: {}\nProjects: {}\nDuration: {} min",
        or_dash(&setup.job_role),
        or_dash(&setup.skills),
        or_dash(&setup.projects),
        setup.duration_minutes
    )
}

pub fn render_status(snapshot: &SessionSnapshot, setup: &SessionSetup) -> String {
    let state = match snapshot.state {
        InterviewState::NotStarted => "not started",
        InterviewState::LoadingSystemPrompt => "starting",
        InterviewState::InProgress if snapshot.seconds_remaining == 0 => "in progress (time's up)",
        InterviewState::InProgress => "in progress",
        InterviewState::Completed => "completed",
    };
    let on_off = |flag: bool| if flag { "on" } else { "off" };
    let mut lines = vec![
        format!("Interview: {state}"),
        format!("Time left: {}", format_timer(snapshot.seconds_remaining)),
        render_setup(setup),
        format!(
            "Read replies aloud: {}{}",
            on_off(snapshot.auto_play),
            if snapshot.speech_output_available { "" } else { " (no voice available)" }
        ),
        format!(
            "Dictation: {}",
            if snapshot.speech_input_available {
                on_off(snapshot.is_recording)
            } else {
                "unavailable"
            }
        ),
    ];
    if snapshot.is_loading {
        lines.push("Waiting for the interviewer...".to_string());
    }
    lines.join("\n")
}

/// Short explanation for an ignored answer, or nothing when silence is better.
pub fn rejection_notice(rejected: SubmitRejected) -> Option<&'static str> {
    match rejected {
        SubmitRejected::NotInProgress => {
            Some("The interview is not running. Set a /role and type /start to begin.")
        }
        SubmitRejected::ReplyPending => Some("Please wait for the interviewer to reply."),
        SubmitRejected::TimeUp => {
            Some("Time's up! Type /restart to practice again.")
        }
        SubmitRejected::EmptyMessage => None,
    }
}

pub const TIME_UP_NOTICE: &str =
    "Time's up! The interview has ended. Type /restart to start a new one.";
pub const COMPLETED_NOTICE: &str =
    "Interview complete. Type /restart to practice again or /quit to exit.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_an_answer() {
        assert_eq!(
            parse_line("  I would use a queue.  "),
            Some(Command::Answer("I would use a queue.".to_string()))
        );
        assert_eq!(parse_line("   "), None);
    }

    #[test]
    fn commands_take_the_rest_of_the_line() {
        assert_eq!(
            parse_line("/role Senior Backend Engineer"),
            Some(Command::Role("Senior Backend Engineer".to_string()))
        );
        assert_eq!(parse_line("/duration 15"), Some(Command::Duration("15".to_string())));
        assert_eq!(parse_line("/START"), Some(Command::Start));
        assert_eq!(parse_line("/speak 3"), Some(Command::Speak("3".to_string())));
        assert_eq!(parse_line("/exit"), Some(Command::Quit));
    }

    #[test]
    fn unknown_commands_are_reported_verbatim() {
        assert_eq!(
            parse_line("/dance now"),
            Some(Command::Unknown("/dance now".to_string()))
        );
    }

    #[test]
    fn timer_is_minutes_and_seconds() {
        assert_eq!(format_timer(600), "10:00");
        assert_eq!(format_timer(299), "04:59");
        assert_eq!(format_timer(0), "00:00");
    }

    #[test]
    fn status_mentions_time_up() {
        let snapshot = SessionSnapshot {
            state: InterviewState::InProgress,
            is_loading: false,
            error: None,
            seconds_remaining: 0,
            is_recording: false,
            speaking_message_id: None,
            auto_play: true,
            speech_input_available: false,
            speech_output_available: true,
        };
        let status = render_status(&snapshot, &SessionSetup::new("SRE", 5));

        assert!(status.contains("time's up"));
        assert!(status.contains("Time left: 00:00"));
        assert!(status.contains("Role: SRE"));
        assert!(status.contains("Dictation: unavailable"));
    }

    #[test]
    fn empty_answers_are_ignored_silently() {
        assert_eq!(rejection_notice(SubmitRejected::EmptyMessage), None);
        assert!(rejection_notice(SubmitRejected::ReplyPending).is_some());
    }
}
