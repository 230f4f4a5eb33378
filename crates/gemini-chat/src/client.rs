use crate::client::stats::Stats;
use crate::error::GeminiError;
use crate::types::{ApiErrorBody, Content, GenerateContentRequest, GenerateContentResponse};
use secrecy::ExposeSecret;
use std::sync::{Arc, Mutex};

pub mod config;
mod consts;
pub mod stats;

/// A client for the Gemini `generateContent` endpoint.
///
/// Cloning is cheap: clones share the HTTP connection pool, configuration and
/// usage stats.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    config: Arc<config::Config>,
    stats: Arc<Mutex<Stats>>,
}

impl GeminiClient {
    pub fn new(config: config::Config) -> Result<Self, GeminiError> {
        if !config.has_api_key() {
            return Err(GeminiError::MissingApiKey);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            config: Arc::new(config),
            stats: Arc::new(Mutex::new(Stats::new())),
        })
    }

    pub fn config(&self) -> &config::Config {
        &self.config
    }

    /// Snapshot of the token usage so far.
    pub fn stats(&self) -> Stats {
        self.stats
            .lock()
            .map(|stats| stats.clone())
            .unwrap_or_default()
    }

    /// Opens a chat that sends `system_instruction` with every turn. No request is
    /// made until the first message.
    pub fn start_chat(&self, system_instruction: &str) -> Chat {
        Chat {
            client: self.clone(),
            system_instruction: Content::system(system_instruction),
            history: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Makes one `generateContent` call.
    pub async fn generate_content(
        &self,
        system_instruction: Option<&Content>,
        contents: &[Content],
    ) -> Result<GenerateContentResponse, GeminiError> {
        let body = GenerateContentRequest {
            system_instruction,
            contents,
            generation_config: self.config.generation(),
        };

        tracing::debug!(
            model = self.config.model(),
            turns = contents.len(),
            "Sending generateContent request"
        );

        let response = self
            .http
            .post(self.config.generate_content_url())
            .header(consts::API_KEY_HEADER, self.config.api_key().expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            // Prefer the service's own message; fall back to the raw body.
            let message = match serde_json::from_str::<ApiErrorBody>(&raw) {
                Ok(body) => body.error.message,
                Err(_) if raw.trim().is_empty() => status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
                Err(_) => raw.trim().to_string(),
            };
            tracing::error!("Gemini API returned {}: {}", status, message);
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed = response.json::<GenerateContentResponse>().await?;
        if let Some(usage) = &parsed.usage_metadata {
            if let Ok(mut stats) = self.stats.lock() {
                stats.update_usage(
                    usage.total_token_count,
                    usage.prompt_token_count,
                    usage.candidates_token_count,
                );
            }
        }
        Ok(parsed)
    }
}

/// A multi-turn conversation. The history is resent on every turn and only grows
/// when a turn succeeds, so a failed message can simply be sent again.
pub struct Chat {
    client: GeminiClient,
    system_instruction: Content,
    history: tokio::sync::Mutex<Vec<Content>>,
}

impl Chat {
    /// Sends one user message and returns the model's reply text.
    pub async fn send_message(&self, text: &str) -> Result<String, GeminiError> {
        // Held across the request so concurrent sends cannot interleave turns.
        let mut history = self.history.lock().await;

        let mut contents = history.clone();
        contents.push(Content::user(text));

        let response = self
            .client
            .generate_content(Some(&self.system_instruction), &contents)
            .await?;

        let reply = match response.text() {
            Some(reply) => reply,
            None => {
                return Err(match response.block_reason() {
                    Some(reason) => GeminiError::Blocked(reason.to_string()),
                    None => GeminiError::EmptyResponse,
                });
            }
        };

        contents.push(Content::model(&reply));
        *history = contents;
        Ok(reply)
    }

    /// The turns exchanged so far, oldest first.
    pub async fn history(&self) -> Vec<Content> {
        self.history.lock().await.clone()
    }

    pub fn system_instruction(&self) -> &Content {
        &self.system_instruction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_requires_an_api_key() {
        let config = config::Config::builder().with_api_key("").build();
        assert!(matches!(
            GeminiClient::new(config),
            Err(GeminiError::MissingApiKey)
        ));
    }

    #[tokio::test]
    async fn new_chat_starts_with_empty_history() {
        let client = GeminiClient::new(config::Config::builder().with_api_key("k").build()).unwrap();
        let chat = client.start_chat("You are an interviewer.");

        assert!(chat.history().await.is_empty());
        assert_eq!(chat.system_instruction().text(), "You are an interviewer.");
        assert_eq!(client.stats().requests(), 0);
    }
}
