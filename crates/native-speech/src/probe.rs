use interview_core::speech::SpeechCapabilities;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Text-to-speech programs tried in order when no explicit command is configured,
/// with the arguments each needs to block until playback has finished.
pub const SPEAKER_CANDIDATES: &[(&str, &[&str])] = &[
    ("say", &[]),
    ("espeak-ng", &[]),
    ("espeak", &[]),
    ("spd-say", &["-w"]),
];

/// A resolved program plus its leading arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl EngineCommand {
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a command line on whitespace. Quoting is not supported.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let program = words.next()?;
        Some(Self::new(program, words))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub(crate) fn to_command(&self) -> tokio::process::Command {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args);
        command
    }

    /// Same command with the program replaced by its location on `PATH`.
    fn resolve(self, path_var: &OsStr) -> Option<Self> {
        let program = find_program(&self.program, path_var)?;
        Some(Self { program, ..self })
    }
}

/// The speech programs found on this machine. Probed once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeechEngines {
    pub speaker: Option<EngineCommand>,
    pub transcriber: Option<EngineCommand>,
}

impl SpeechEngines {
    /// Probes the current `PATH`.
    pub fn probe(tts_command: Option<&str>, stt_command: Option<&str>) -> Self {
        let path_var = std::env::var_os("PATH").unwrap_or_default();
        Self::probe_in(&path_var, tts_command, stt_command)
    }

    pub fn probe_in(path_var: &OsStr, tts_command: Option<&str>, stt_command: Option<&str>) -> Self {
        let speaker = match tts_command.and_then(EngineCommand::parse) {
            Some(explicit) => {
                let resolved = explicit.clone().resolve(path_var);
                if resolved.is_none() {
                    tracing::warn!(
                        "TTS command {:?} not found, falling back to system voices",
                        explicit.program()
                    );
                }
                resolved.or_else(|| find_default_speaker(path_var))
            }
            None => find_default_speaker(path_var),
        };

        // Dictation has no system default; it only exists when configured.
        let transcriber = stt_command.and_then(EngineCommand::parse).and_then(|cmd| {
            let program = cmd.program().to_path_buf();
            let resolved = cmd.resolve(path_var);
            if resolved.is_none() {
                tracing::warn!("STT command {:?} not found, speech input disabled", program);
            }
            resolved
        });

        let engines = Self {
            speaker,
            transcriber,
        };
        tracing::info!("Speech engines:\n{}", engines.describe());
        engines
    }

    pub fn capabilities(&self) -> SpeechCapabilities {
        SpeechCapabilities {
            input: self.transcriber.is_some(),
            output: self.speaker.is_some(),
        }
    }

    /// Human readable summary, one line per capability.
    pub fn describe(&self) -> String {
        let line = |label: &str, engine: &Option<EngineCommand>| match engine {
            Some(cmd) => format!(" * {label}: {}", cmd.program().display()),
            None => format!(" * {label}: unavailable"),
        };
        [
            line("speech output", &self.speaker),
            line("speech input", &self.transcriber),
        ]
        .join("\n")
    }
}

fn find_default_speaker(path_var: &OsStr) -> Option<EngineCommand> {
    SPEAKER_CANDIDATES.iter().find_map(|(program, args)| {
        EngineCommand::new(*program, args.iter().copied()).resolve(path_var)
    })
}

/// Looks `program` up like a shell would. Anything containing a path separator
/// is checked as given.
pub fn find_program(program: &Path, path_var: &OsStr) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return is_executable(program).then(|| program.to_path_buf());
    }
    std::env::split_paths(path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::tempdir;

    fn install(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[test]
    fn first_available_system_voice_wins() {
        // --- Arrange ---
        let dir = tempdir().unwrap();
        install(dir.path(), "espeak");
        install(dir.path(), "spd-say");

        // --- Act ---
        let engines = SpeechEngines::probe_in(dir.path().as_os_str(), None, None);

        // --- Assert ---
        let speaker = engines.speaker.as_ref().expect("a speaker should be found");
        assert_eq!(speaker.program(), dir.path().join("espeak"));
        assert!(speaker.args().is_empty());
        assert_eq!(
            engines.capabilities(),
            SpeechCapabilities {
                input: false,
                output: true
            }
        );
    }

    #[test]
    fn spd_say_waits_for_playback() {
        let dir = tempdir().unwrap();
        install(dir.path(), "spd-say");

        let engines = SpeechEngines::probe_in(dir.path().as_os_str(), None, None);

        assert_eq!(engines.speaker.unwrap().args(), ["-w"]);
    }

    #[test]
    fn configured_commands_keep_their_arguments() {
        let dir = tempdir().unwrap();
        install(dir.path(), "my-tts");
        install(dir.path(), "dictate");

        let engines = SpeechEngines::probe_in(
            dir.path().as_os_str(),
            Some("my-tts --rate 180"),
            Some("dictate --lang en-US"),
        );

        let speaker = engines.speaker.unwrap();
        assert_eq!(speaker.program(), dir.path().join("my-tts"));
        assert_eq!(speaker.args(), ["--rate", "180"]);
        let transcriber = engines.transcriber.unwrap();
        assert_eq!(transcriber.args(), ["--lang", "en-US"]);
    }

    #[test]
    fn missing_programs_leave_capabilities_off() {
        let dir = tempdir().unwrap();
        // Present but not executable.
        fs::write(dir.path().join("say"), "").unwrap();

        let engines =
            SpeechEngines::probe_in(dir.path().as_os_str(), Some("nope"), Some("also-nope"));

        assert_eq!(engines.capabilities(), SpeechCapabilities::default());
        assert!(engines.describe().contains("speech output: unavailable"));
    }

    #[test]
    fn absolute_paths_are_checked_directly() {
        let dir = tempdir().unwrap();
        let tts = install(dir.path(), "custom-voice");

        let found = find_program(&tts, OsStr::new(""));

        assert_eq!(found, Some(tts));
    }

    #[test]
    fn blank_command_line_parses_to_nothing() {
        assert_eq!(EngineCommand::parse("   "), None);
    }
}
