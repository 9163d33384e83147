//! Webhook HTTP server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Liveness probe, always `200 OK` |
//! | `POST` | `/callback` | LINE webhook receiver |
//!
//! # Callback flow
//!
//! ```text
//! RECEIVED ──bad signature──▶ REJECTED (400)
//!    │
//!    ▼
//! VERIFIED ──bad JSON──▶ 400
//!    │
//!    ▼
//! DISPATCHED ─▶ per event: ANSWERED → REPLIED | IGNORED
//!    │
//!    ▼
//! RESPONDED (200 "OK", or 500 if the answer service failed)
//! ```
//!
//! Every failure is a [`RelayError`] returned from the handler; panics are
//! converted to 500 responses by `CatchPanicLayer`, so no request can take
//! the process down.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Router,
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::answer::{IndexAnswerService, QueryRelay};
use crate::config::{Config, Secrets};
use crate::dispatch::Dispatcher;
use crate::error::{RelayError, Result};
use crate::reply::LineReplyClient;
use crate::signature::{self, SIGNATURE_HEADER};
use crate::webhook;

/// Shared, read-only state passed to the route handlers.
#[derive(Clone)]
pub struct AppState {
    channel_secret: Arc<SecretString>,
    dispatcher: Dispatcher,
}

impl AppState {
    pub fn new(channel_secret: SecretString, dispatcher: Dispatcher) -> Self {
        Self {
            channel_secret: Arc::new(channel_secret),
            dispatcher,
        }
    }
}

/// Builds the application router. Exposed separately so tests can drive it
/// without binding a socket.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/callback", post(handle_callback))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Starts the webhook server and runs until Ctrl-C or SIGTERM.
///
/// All process-wide state (index pool, HTTP clients, secrets) is built here
/// once, before the listener is bound, so a broken configuration never
/// serves traffic.
pub async fn run_server(config: &Config, secrets: Secrets) -> anyhow::Result<()> {
    let answer_service =
        IndexAnswerService::from_config(config, secrets.openai_api_key.clone()).await?;
    let reply_client =
        LineReplyClient::new(&config.line, secrets.channel_access_token.clone())?;

    let dispatcher = Dispatcher::new(
        QueryRelay::new(Arc::new(answer_service)),
        Arc::new(reply_client),
    );
    let app = router(AppState::new(secrets.channel_secret, dispatcher));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "webhook server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("webhook server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}

// ============ GET /health ============

/// Handler for `GET /health`. Touches no other component.
async fn handle_health() -> &'static str {
    "OK"
}

// ============ POST /callback ============

/// Handler for `POST /callback`.
async fn handle_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str> {
    let request_id = uuid::Uuid::new_v4();
    let span = tracing::info_span!("callback", %request_id, bytes = body.len());

    process_callback(&state, &headers, &body)
        .instrument(span)
        .await
        .map(|()| "OK")
}

async fn process_callback(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<()> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            tracing::warn!("webhook signature missing");
            RelayError::MissingSignature
        })?;

    signature::verify(
        state.channel_secret.expose_secret().as_bytes(),
        body,
        signature,
    )
    .inspect_err(|_| {
        tracing::warn!("webhook signature rejected; check the channel secret");
    })?;

    let payload = webhook::parse_body(body).inspect_err(|e| {
        if let RelayError::MalformedBody(err) = e {
            tracing::warn!(
                category = webhook::error_category(err),
                line = err.line(),
                column = err.column(),
                bytes = body.len(),
                "malformed webhook body"
            );
        }
    })?;

    tracing::debug!(
        destination = %payload.destination,
        events = payload.events.len(),
        "webhook verified"
    );

    match state.dispatcher.dispatch(&payload.events).await {
        Ok(report) => {
            tracing::info!(
                replied = report.replied,
                reply_failures = report.reply_failures,
                ignored = report.ignored,
                "callback handled"
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "callback failed");
            Err(e)
        }
    }
}
