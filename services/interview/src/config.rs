//! Application Configuration Module
//!
//! This module centralizes the configuration for the interview service.
//! It loads settings from environment variables (and a `.env` file, if present)
//! and provides a single struct that is handed to the adapters at startup.

use secrecy::SecretString;
use std::env;
use std::str::FromStr;
use tracing::Level;

// --- Application Constants ---

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-preview-04-17";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_SPEECH_LANG: &str = "en-US";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatProvider {
    Gemini,
    OpenAI,
}

impl FromStr for ChatProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" => Ok(ChatProvider::Gemini),
            "openai" => Ok(ChatProvider::OpenAI),
            _ => Err(ConfigError::InvalidValue {
                var: "CHAT_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Holds all configuration loaded from the environment.
#[derive(Debug)]
pub struct Config {
    pub provider: ChatProvider,
    pub gemini_api_key: Option<SecretString>,
    pub openai_api_key: Option<SecretString>,
    pub chat_model: String,
    pub log_level: Level,
    pub tts_command: Option<String>,
    pub stt_command: Option<String>,
    pub speech_lang: String,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: String, value: String },
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `CHAT_PROVIDER`: "gemini" or "openai". Defaults to "gemini".
    // *   `GEMINI_API_KEY` (or `API_KEY`): Required if provider is "gemini".
    // *   `OPENAI_API_KEY`: Required if provider is "openai".
    // *   `CHAT_MODEL`: (Optional) Defaults to the provider's interview model.
    // *   `RUST_LOG`: (Optional) "TRACE", "DEBUG", "INFO", "WARN" or "ERROR". Defaults to "INFO".
    // *   `TTS_COMMAND`: (Optional) Text-to-speech program and arguments. Probed when unset.
    // *   `STT_COMMAND`: (Optional) Dictation command. Speech input is disabled when unset.
    // *   `SPEECH_LANG`: (Optional) Language handed to the speech programs. Defaults to "en-US".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let provider = match get("CHAT_PROVIDER") {
            Some(value) => value.parse()?,
            None => ChatProvider::Gemini,
        };

        let gemini_api_key = get("GEMINI_API_KEY")
            .or_else(|| get("API_KEY"))
            .map(SecretString::from);
        let openai_api_key = get("OPENAI_API_KEY").map(SecretString::from);

        let chat_model = get("CHAT_MODEL").unwrap_or_else(|| {
            match provider {
                ChatProvider::Gemini => DEFAULT_GEMINI_MODEL,
                ChatProvider::OpenAI => DEFAULT_OPENAI_MODEL,
            }
            .to_string()
        });

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = get("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidValue {
                var: "RUST_LOG".to_string(),
                value: log_level_str.clone(),
            })?;

        let config = Self {
            provider,
            gemini_api_key,
            openai_api_key,
            chat_model,
            log_level,
            tts_command: get("TTS_COMMAND"),
            stt_command: get("STT_COMMAND"),
            speech_lang: get("SPEECH_LANG").unwrap_or_else(|| DEFAULT_SPEECH_LANG.to_string()),
        };

        // Validate that the required API key is present for the selected provider.
        match config.provider {
            ChatProvider::Gemini if config.gemini_api_key.is_none() => {
                return Err(ConfigError::MissingVar(
                    "GEMINI_API_KEY must be set for gemini provider".to_string(),
                ));
            }
            ChatProvider::OpenAI if config.openai_api_key.is_none() => {
                return Err(ConfigError::MissingVar(
                    "OPENAI_API_KEY must be set for openai provider".to_string(),
                ));
            }
            _ => {}
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn gemini_is_the_default_provider() {
        let config = load(&[("GEMINI_API_KEY", "g-key")]).unwrap();

        assert_eq!(config.provider, ChatProvider::Gemini);
        assert_eq!(config.chat_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.speech_lang, "en-US");
        assert!(config.tts_command.is_none());
        assert_eq!(config.gemini_api_key.unwrap().expose_secret(), "g-key");
    }

    #[test]
    fn api_key_is_accepted_as_an_alias() {
        let config = load(&[("API_KEY", "alias-key")]).unwrap();
        assert_eq!(config.gemini_api_key.unwrap().expose_secret(), "alias-key");
    }

    #[test]
    fn missing_credential_is_reported() {
        let err = load(&[("CHAT_PROVIDER", "openai"), ("GEMINI_API_KEY", "g-key")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(msg) if msg.contains("OPENAI_API_KEY")));

        let err = load(&[("GEMINI_API_KEY", "   ")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(_)));
    }

    #[test]
    fn openai_gets_its_own_default_model() {
        let config = load(&[
            ("CHAT_PROVIDER", "OpenAI"),
            ("OPENAI_API_KEY", "o-key"),
            ("RUST_LOG", "debug"),
            ("STT_COMMAND", "dictate --lang en-US"),
        ])
        .unwrap();

        assert_eq!(config.provider, ChatProvider::OpenAI);
        assert_eq!(config.chat_model, DEFAULT_OPENAI_MODEL);
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.stt_command.as_deref(), Some("dictate --lang en-US"));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = load(&[("CHAT_PROVIDER", "claude"), ("GEMINI_API_KEY", "k")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == "CHAT_PROVIDER"));

        let err = load(&[("RUST_LOG", "chatty"), ("GEMINI_API_KEY", "k")]).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { var, .. } if var == "RUST_LOG"));
    }
}
