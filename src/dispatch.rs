//! Routes parsed webhook events to their handler.
//!
//! Routing is an exhaustive match over [`Event`]: only active-mode text
//! messages with a reply token are answered. Everything else is an explicit
//! no-op that is counted and logged at debug level.
//!
//! Events run sequentially in delivery order. An answer-service failure
//! aborts the batch and is returned to the caller (the webhook then fails
//! with a 500). A rejected reply is logged and counted; the batch goes on,
//! because the platform expects the delivery to be acknowledged either way.

use chrono::SecondsFormat;
use std::sync::Arc;

use crate::answer::QueryRelay;
use crate::error::Result;
use crate::models::DispatchReport;
use crate::traits::ReplySender;
use crate::webhook::{Event, EventMeta, MessageContent, MessageEvent, Mode};

/// What the dispatcher decided to do with one event.
#[derive(Debug, PartialEq, Eq)]
pub enum Route<'a> {
    Answer { reply_token: &'a str, text: &'a str },
    Ignore(&'static str),
}

/// Decides how `event` is handled.
pub fn route(event: &Event) -> Route<'_> {
    match event {
        Event::Message(MessageEvent {
            meta,
            reply_token,
            message,
        }) => match (message, meta.mode, reply_token.as_deref()) {
            (MessageContent::Text { text, .. }, Mode::Active, Some(reply_token)) => {
                Route::Answer {
                    reply_token,
                    text: text.as_str(),
                }
            }
            (MessageContent::Text { .. }, Mode::Active, None) => Route::Ignore("no reply token"),
            (MessageContent::Text { .. }, Mode::Standby | Mode::Unknown, _) => {
                Route::Ignore("channel not active")
            }
            (MessageContent::Other, _, _) => Route::Ignore("non-text message"),
        },
        Event::Follow(_) => Route::Ignore("follow"),
        Event::Unfollow(_) => Route::Ignore("unfollow"),
        Event::Join(_) => Route::Ignore("join"),
        Event::Leave(_) => Route::Ignore("leave"),
        Event::Postback(_) => Route::Ignore("postback"),
        Event::Other => Route::Ignore("unsupported event type"),
    }
}

/// Event time as RFC 3339 with milliseconds, `-` when unknown.
fn event_time(meta: Option<&EventMeta>) -> String {
    meta.and_then(EventMeta::occurred_at)
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| "-".to_string())
}

/// Runs the answer-then-reply flow for each routable event.
#[derive(Clone)]
pub struct Dispatcher {
    relay: QueryRelay,
    sender: Arc<dyn ReplySender>,
}

impl Dispatcher {
    pub fn new(relay: QueryRelay, sender: Arc<dyn ReplySender>) -> Self {
        Self { relay, sender }
    }

    pub async fn dispatch(&self, events: &[Event]) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();

        for (index, event) in events.iter().enumerate() {
            let meta = event.meta();
            let event_id = meta
                .and_then(|m| m.webhook_event_id.as_deref())
                .unwrap_or("-");
            let source = event.source_kind();
            let occurred_at = event_time(meta);

            if meta.is_some_and(|m| m.is_redelivery()) {
                tracing::info!(index, event_id, %occurred_at, "processing redelivered event");
            }

            match route(event) {
                Route::Answer { reply_token, text } => {
                    tracing::debug!(
                        index,
                        event_id,
                        source,
                        %occurred_at,
                        chars = text.chars().count(),
                        "answering"
                    );
                    let answer = self.relay.answer(text).await?;

                    match self.sender.reply(reply_token, &answer).await {
                        Ok(()) => report.replied += 1,
                        Err(e) => {
                            tracing::error!(index, event_id, source, error = %e, "reply failed");
                            report.reply_failures += 1;
                        }
                    }
                }
                Route::Ignore(reason) => {
                    tracing::debug!(
                        index,
                        event_id,
                        source,
                        %occurred_at,
                        kind = event.kind(),
                        reason,
                        "ignored"
                    );
                    report.ignored += 1;
                }
            }
        }

        Ok(report)
    }
}
