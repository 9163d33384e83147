//! Error type shared by every stage of the callback pipeline.
//!
//! Each boundary (verification, parsing, querying, replying) returns a
//! [`RelayError`], and the HTTP layer picks the response status from the
//! variant via [`RelayError::status`].

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Convenience alias for results carrying a [`RelayError`].
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The `x-line-signature` header was absent or not valid UTF-8.
    #[error("missing x-line-signature header")]
    MissingSignature,

    /// The signature did not match the request body.
    #[error("invalid webhook signature")]
    InvalidSignature,

    /// The verified body could not be parsed as a webhook payload.
    #[error("malformed webhook body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    /// The retrieval index could not be queried.
    #[error("index error: {0}")]
    Index(#[from] sqlx::Error),

    /// The answer backend failed or was unreachable.
    #[error("answer service error: {message}")]
    Answer {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The messaging platform rejected or never received the reply.
    #[error("reply rejected (status {status:?}): {message}")]
    Reply {
        status: Option<u16>,
        message: String,
    },

    /// Invalid or incomplete process configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Builds an [`RelayError::Answer`] without an underlying cause.
    pub fn answer(message: impl Into<String>) -> Self {
        Self::Answer {
            message: message.into(),
            source: None,
        }
    }

    /// HTTP status returned to the platform for this failure.
    ///
    /// Authentication and payload problems are client errors; everything
    /// else collapses to a generic 500.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingSignature | Self::InvalidSignature | Self::MalformedBody(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Index(_) | Self::Answer { .. } | Self::Reply { .. } | Self::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<reqwest::Error> for RelayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Answer {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        // Internal details stay in the logs; the platform only sees the class.
        let body = match self.status() {
            StatusCode::BAD_REQUEST => "Bad Request",
            _ => "Internal Server Error",
        };
        (self.status(), body).into_response()
    }
}
