//! Seams to the two external collaborators.
//!
//! The relay owns none of the heavy lifting: answers come from an
//! [`AnswerService`] and replies leave through a [`ReplySender`]. The HTTP
//! layer only sees these traits, so tests (and alternative backends) can
//! swap either side without touching the request path.
//!
//! # Architecture
//!
//! ```text
//!            POST /callback
//!                  │
//!                  ▼
//!         ┌──────────────────┐
//!         │    Dispatcher    │
//!         └───┬──────────┬───┘
//!             ▼          ▼
//!   ┌───────────────┐ ┌──────────────┐
//!   │ AnswerService │ │ ReplySender  │
//!   │ index + LLM   │ │ LINE reply   │
//!   └───────────────┘ └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust
//! use async_trait::async_trait;
//! use answer_relay::error::Result;
//! use answer_relay::traits::AnswerService;
//!
//! pub struct EchoService;
//!
//! #[async_trait]
//! impl AnswerService for EchoService {
//!     fn name(&self) -> &str { "echo" }
//!
//!     async fn query(&self, text: &str) -> Result<String> {
//!         Ok(text.to_string())
//!     }
//! }
//! ```

use async_trait::async_trait;

use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════
// AnswerService
// ═══════════════════════════════════════════════════════════════════════

/// A question-answering backend.
///
/// Implementations must be safe to call concurrently: the same instance is
/// shared by every in-flight request and is never mutated after startup.
#[async_trait]
pub trait AnswerService: Send + Sync {
    /// Identifier used in logs (e.g. `"index"`).
    fn name(&self) -> &str;

    /// Produces a free-text answer for `text`.
    ///
    /// The text is passed through untouched, including the empty string.
    /// Errors are returned as-is; callers do not retry.
    async fn query(&self, text: &str) -> Result<String>;
}

// ═══════════════════════════════════════════════════════════════════════
// ReplySender
// ═══════════════════════════════════════════════════════════════════════

/// Delivers a single text reply to a conversation.
#[async_trait]
pub trait ReplySender: Send + Sync {
    /// Sends `text` to the conversation addressed by `reply_token`.
    ///
    /// Exactly one delivery attempt is made. Success means the platform
    /// accepted the request; delivery to the user is not tracked.
    async fn reply(&self, reply_token: &str, text: &str) -> Result<()>;
}
