//! LINE reply client.
//!
//! Sends one text message per call to `POST {api_base}/v2/bot/message/reply`
//! using the channel access token. Reply tokens are single-use and expire
//! shortly after the webhook is delivered, so there is no retry.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::config::LineConfig;
use crate::error::{RelayError, Result};
use crate::models::OutboundReply;
use crate::traits::ReplySender;

/// Maximum length of a LINE text message, in characters.
pub const MAX_TEXT_CHARS: usize = 5000;

pub struct LineReplyClient {
    http: reqwest::Client,
    api_base: String,
    access_token: SecretString,
}

impl LineReplyClient {
    pub fn new(config: &LineConfig, access_token: SecretString) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| RelayError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            access_token,
        })
    }
}

#[async_trait]
impl ReplySender for LineReplyClient {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<()> {
        let text = truncate_chars(text, MAX_TEXT_CHARS);
        let body = OutboundReply::text(reply_token, text);

        let response = self
            .http
            .post(format!("{}/v2/bot/message/reply", self.api_base))
            .bearer_auth(self.access_token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Reply {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body_text = response.text().await.unwrap_or_default();
        Err(RelayError::Reply {
            status: Some(status.as_u16()),
            message: body_text,
        })
    }
}

/// Cuts `text` to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => {
            tracing::warn!(
                chars = text.chars().count(),
                limit = max,
                "reply text truncated to platform limit"
            );
            &text[..idx]
        }
        None => text,
    }
}
