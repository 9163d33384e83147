//! LINE webhook payload model.
//!
//! A webhook call carries a batch of events. The whole body is parsed up
//! front so that a malformed payload is rejected before any event runs.
//! Event kinds the relay does not act on still parse (as their own variant
//! or as [`Event::Other`]) so that new platform event types never turn a
//! valid delivery into a 400.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::error::Category;

use crate::error::Result;

/// Top-level webhook request body.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookBody {
    /// Bot user ID that received the events.
    #[serde(default)]
    pub destination: String,
    pub events: Vec<Event>,
}

/// Parses a verified request body.
pub fn parse_body(body: &[u8]) -> Result<WebhookBody> {
    Ok(serde_json::from_slice(body)?)
}

/// Coarse class of a parse failure, safe to log.
///
/// The error's `Display` can quote string values from the body, so logs use
/// this together with the line and column instead.
pub fn error_category(err: &serde_json::Error) -> &'static str {
    match err.classify() {
        Category::Io => "io",
        Category::Syntax => "syntax",
        Category::Data => "data",
        Category::Eof => "eof",
    }
}

/// One inbound webhook event, tagged by its `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    Message(MessageEvent),
    Follow(ReplyableEvent),
    Unfollow(EventMeta),
    Join(ReplyableEvent),
    Leave(EventMeta),
    Postback(PostbackEvent),
    /// Any event type the relay does not model.
    #[serde(other)]
    Other,
}

impl Event {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Message(_) => "message",
            Event::Follow(_) => "follow",
            Event::Unfollow(_) => "unfollow",
            Event::Join(_) => "join",
            Event::Leave(_) => "leave",
            Event::Postback(_) => "postback",
            Event::Other => "other",
        }
    }

    pub fn meta(&self) -> Option<&EventMeta> {
        match self {
            Event::Message(e) => Some(&e.meta),
            Event::Follow(e) | Event::Join(e) => Some(&e.meta),
            Event::Unfollow(meta) | Event::Leave(meta) => Some(meta),
            Event::Postback(e) => Some(&e.meta),
            Event::Other => None,
        }
    }

    /// Kind of conversation the event came from (`user`, `group`, `room`),
    /// or `-` when the event carries no source.
    pub fn source_kind(&self) -> &'static str {
        self.meta()
            .and_then(|m| m.source.as_ref())
            .map_or("-", Source::kind)
    }
}

/// Fields shared by every event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub webhook_event_id: Option<String>,
    #[serde(default)]
    pub delivery_context: DeliveryContext,
    #[serde(default)]
    pub source: Option<Source>,
}

impl EventMeta {
    /// Event time, or `None` when the platform sent no timestamp.
    pub fn occurred_at(&self) -> Option<DateTime<Utc>> {
        if self.timestamp <= 0 {
            return None;
        }
        DateTime::from_timestamp_millis(self.timestamp)
    }

    pub fn is_redelivery(&self) -> bool {
        self.delivery_context.is_redelivery
    }
}

/// Channel state at the time of the event.
///
/// In `standby` mode another module owns the conversation and the event
/// carries no reply token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Mode {
    #[default]
    Active,
    Standby,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryContext {
    #[serde(default)]
    pub is_redelivery: bool,
}

/// Where an event originated.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Source {
    User {
        user_id: String,
    },
    Group {
        group_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
    Room {
        room_id: String,
        #[serde(default)]
        user_id: Option<String>,
    },
    #[serde(other)]
    Other,
}

impl Source {
    pub fn kind(&self) -> &'static str {
        match self {
            Source::User { .. } => "user",
            Source::Group { .. } => "group",
            Source::Room { .. } => "room",
            Source::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    #[serde(default)]
    pub reply_token: Option<String>,
    pub message: MessageContent,
}

/// Message payload of a [`MessageEvent`].
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MessageContent {
    Text { id: String, text: String },
    /// Images, stickers, locations and every other non-text message.
    #[serde(other)]
    Other,
}

/// Follow and join events, which carry a reply token but no content.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyableEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    #[serde(default)]
    pub reply_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostbackEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    #[serde(default)]
    pub reply_token: Option<String>,
    pub postback: Postback,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postback {
    pub data: String,
}
