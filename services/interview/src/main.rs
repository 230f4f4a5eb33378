use anyhow::{Context, Result};
use clap::Parser;
use interview_core::completion::CompletionDetector;
use interview_core::conversation::ConversationClient;
use interview_core::session_state::InterviewSession;
use interview_core::setup::{DEFAULT_DURATION_MINUTES, SessionSetup};
use interview_native_speech::{
    CommandSpeaker, CommandTranscriber, EVENT_CHANNEL_CAPACITY, SpeechEngines,
};
use interview_service::app::App;
use interview_service::config::{ChatProvider, Config};
use interview_service::gemini_adapter::GeminiAdapter;
use interview_service::openai_adapter::OpenAIAdapter;
use interview_service::prompt_loader::PromptSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing_subscriber::fmt::time::ChronoLocal;

/// Practice a job interview with an AI interviewer in the terminal.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Job role you are interviewing for
    #[arg(long)]
    role: Option<String>,
    /// Key skills, comma separated
    #[arg(long)]
    skills: Option<String>,
    /// Short overview of projects to discuss
    #[arg(long)]
    projects: Option<String>,
    /// Interview length in minutes
    #[arg(long, default_value_t = DEFAULT_DURATION_MINUTES, value_parser = clap::value_parser!(u32).range(3..=60))]
    duration: u32,
    /// Disable speech input and output
    #[arg(long)]
    no_voice: bool,
    /// Directory with prompt overrides (system_prompt.md, completion_markers.md)
    #[arg(long)]
    prompts_dir: Option<PathBuf>,
    /// Start the interview right away
    #[arg(long)]
    start: bool,
}

impl Cli {
    fn setup(&self) -> SessionSetup {
        SessionSetup::new(self.role.clone().unwrap_or_default(), self.duration)
            .with_skills(self.skills.clone().unwrap_or_default())
            .with_projects(self.projects.clone().unwrap_or_default())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Parse Command-Line Arguments ---
    let args = Cli::parse();

    // --- 2. Load Configuration ---
    // Without a credential nothing else can work, so this is the one fatal error.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration Error: {e}");
            eprintln!("Set the variable (or add it to a .env file) and run again.");
            std::process::exit(1);
        }
    };

    // --- 3. Initialize Logging ---
    // Logs go to stderr so they never interleave with the transcript.
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .with_writer(std::io::stderr)
        .init();

    tracing::info!(provider = ?config.provider, model = %config.chat_model, "Configuration loaded successfully. Starting interview service...");

    // --- 4. Load Prompts ---
    let prompts = match &args.prompts_dir {
        Some(dir) => PromptSet::load(dir).context("Failed to load prompt overrides")?,
        None => PromptSet::default(),
    };
    tracing::info!("Loaded {} prompt overrides.", prompts.len());

    // --- 5. Initialize the Conversation Client ---
    let client: Arc<dyn ConversationClient> = match config.provider {
        ChatProvider::Gemini => {
            let key = config
                .gemini_api_key
                .as_ref()
                .context("GEMINI_API_KEY must be set for gemini provider")?;
            Arc::new(GeminiAdapter::new(key, &config.chat_model)?)
        }
        ChatProvider::OpenAI => {
            let key = config
                .openai_api_key
                .as_ref()
                .context("OPENAI_API_KEY must be set for openai provider")?;
            Arc::new(OpenAIAdapter::new(key, &config.chat_model))
        }
    };

    // --- 6. Probe Speech Capabilities ---
    let engines = if args.no_voice {
        SpeechEngines::default()
    } else {
        SpeechEngines::probe(config.tts_command.as_deref(), config.stt_command.as_deref())
    };
    let capabilities = engines.capabilities();
    if !args.no_voice && !capabilities.output {
        tracing::warn!("No text-to-speech program found; replies will not be read aloud");
    }
    let (speech_tx, speech_rx) = tokio::sync::mpsc::channel(EVENT_CHANNEL_CAPACITY);

    // --- 7. Assemble the Session ---
    let mut session = InterviewSession::new(Some(client))
        .with_setup(args.setup())
        .with_auto_play(capabilities.output);
    if let Some(template) = prompts.system_prompt() {
        session = session.with_system_prompt(template);
    }
    if let Some(markers) = prompts.completion_markers() {
        session = session.with_completion_detector(CompletionDetector::with_markers(markers));
    }
    if let Some(command) = engines.speaker {
        session = session.with_speech_output(Box::new(CommandSpeaker::new(
            command,
            &config.speech_lang,
            speech_tx.clone(),
        )));
    }
    if let Some(command) = engines.transcriber {
        session = session.with_speech_input(Box::new(CommandTranscriber::new(
            command,
            &config.speech_lang,
            speech_tx.clone(),
        )));
    }
    drop(speech_tx);

    // --- 8. Run the Console Loop ---
    let (app, inbox) = App::new(session, std::io::stdout(), speech_rx);
    let mut app = app.with_auto_start(args.start);
    let stdin = BufReader::new(tokio::io::stdin());

    tokio::select! {
        result = app.run(stdin, inbox) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, shutting down...");
        }
    }

    tracing::info!("Interview service stopped.");
    Ok(())
}
