//! # Answer Relay
//!
//! A LINE webhook relay that answers chat messages from a pre-built
//! retrieval index.
//!
//! The relay verifies each signed webhook call, picks out the text messages,
//! asks an answer service (retrieval over the index plus one completion
//! call) and sends the answer back through the LINE reply API. Index
//! construction happens elsewhere; the relay opens the index read-only.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌────────────┐   ┌─────────────┐
//! │   LINE   │──▶│ /callback │──▶│ Dispatcher │──▶│ QueryRelay  │
//! │ webhook  │   │ verify +  │   │ per event  │   │ index + LLM │
//! └──────────┘   │ parse     │   └─────┬──────┘   └─────────────┘
//!                └───────────┘         ▼
//!                                ┌────────────┐
//!                                │ LINE reply │
//!                                └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENAI_API_KEY=... OA_CHANNEL_ACCESS_TOKEN=... OA_CHANNEL_SECRET=...
//! relay ask "How do I reset my password?"   # query the index locally
//! relay sign payload.json                   # signature for a test webhook
//! relay serve                               # start the webhook server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and secrets |
//! | [`error`] | Shared error type and HTTP status mapping |
//! | [`signature`] | Webhook signature verification |
//! | [`webhook`] | Webhook payload model |
//! | [`dispatch`] | Event routing |
//! | [`answer`] | Query relay and index-backed answer service |
//! | [`search`] | Context retrieval from the index |
//! | [`completion`] | Chat-completions client |
//! | [`reply`] | LINE reply client |
//! | [`server`] | HTTP endpoints |
//! | [`traits`] | Collaborator traits |
//! | [`db`] | Read-only index connection |

pub mod answer;
pub mod completion;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod reply;
pub mod search;
pub mod server;
pub mod signature;
pub mod traits;
pub mod webhook;
