//! Core data types that flow between retrieval, synthesis and delivery.

use serde::Serialize;

/// A chunk of indexed text retrieved as context for a question.
#[derive(Debug, Clone)]
pub struct ContextChunk {
    pub document_id: String,
    pub title: Option<String>,
    /// FTS5 rank negated so that higher is better.
    pub score: f64,
    pub text: String,
}

/// Reply payload for the LINE reply endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundReply {
    pub reply_token: String,
    pub messages: Vec<TextMessage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TextMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
}

impl OutboundReply {
    pub fn text(reply_token: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            reply_token: reply_token.into(),
            messages: vec![TextMessage {
                kind: "text",
                text: text.into(),
            }],
        }
    }
}

/// What happened to the events of one webhook call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Text messages answered and handed to the reply sender.
    pub replied: usize,
    /// Text messages answered but whose reply the platform rejected.
    pub reply_failures: usize,
    /// Events with no handler.
    pub ignored: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_reply_wire_shape() {
        let reply = OutboundReply::text("tok", "Hello world.");
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "replyToken": "tok",
                "messages": [{"type": "text", "text": "Hello world."}]
            })
        );
    }
}
