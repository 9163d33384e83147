//! OpenAI-compatible chat-completions client used for answer synthesis.
//!
//! Sends one `POST {base_url}/chat/completions` per question. There is no
//! retry: a rate limit or server error surfaces immediately as
//! [`RelayError::Answer`] and the webhook call fails with a 500.
//!
//! The request timeout is optional (`answer.timeout_secs`). When unset the
//! call waits for the backend, leaving any deadline to the hosting
//! infrastructure.

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use crate::config::AnswerConfig;
use crate::error::{RelayError, Result};

pub struct CompletionClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    api_key: SecretString,
}

impl CompletionClient {
    pub fn new(config: &AnswerConfig, api_key: SecretString) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder.build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            api_key,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Runs a single-turn completion and returns the assistant's text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RelayError::answer(format!(
                "completion API error {}: {}",
                status, body_text
            )));
        }

        let parsed: ChatResponse = response.json().await?;
        parse_chat_response(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn parse_chat_response(resp: ChatResponse) -> Result<String> {
    resp.choices
        .into_iter()
        .next()
        .map(|c| c.message.content.unwrap_or_default())
        .ok_or_else(|| RelayError::answer("Invalid completion response: no choices"))
}
