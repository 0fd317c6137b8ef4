//! Webhook endpoint handlers.
//!
//! Requests to the webhook route pass through [`require_line_signature`]
//! before any handler sees the body. The handler then only:
//! 1. Parses the verified payload
//! 2. Enqueues each event to RabbitMQ
//! 3. Returns immediately

use std::error::Error as StdError;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use http_body_util::LengthLimitError;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{Config, ConfigError};
use crate::line::WebhookPayload;
use crate::queue::{Publisher, QueuedEvent};
use crate::web::signature::{SignatureVerifier, SIGNATURE_HEADER};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub verifier: Arc<SignatureVerifier>,
    pub publisher: Publisher,
}

impl AppState {
    /// Build state from loaded configuration.
    ///
    /// Fails if the configured secret cannot authenticate anything.
    pub fn new(config: Config, publisher: Publisher) -> Result<Self, ConfigError> {
        let verifier = SignatureVerifier::new(config.channel_secret.clone())?;

        Ok(Self {
            config: Arc::new(config),
            verifier: Arc::new(verifier),
            publisher,
        })
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Signature Middleware
// =============================================================================

/// Webhook response.
#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_queued: Option<usize>,
}

impl WebhookResponse {
    fn status(status: &'static str) -> Self {
        Self {
            status,
            events_queued: None,
        }
    }
}

/// Reject any request whose `x-line-signature` does not match its body.
///
/// The body is buffered once, verified byte-for-byte, and handed to the next
/// layer unchanged. Every verification failure gets the same response.
pub async fn require_line_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    let raw_body = match to_bytes(body, state.config.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) if exceeds_length_limit(&e) => {
            warn!(
                error = %e,
                max_body_bytes = state.config.max_body_bytes,
                "line_webhook_body_too_large"
            );
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(WebhookResponse::status("payload_too_large")),
            )
                .into_response();
        }
        Err(e) => {
            warn!(error = %e, "line_webhook_body_unreadable");
            return (
                StatusCode::BAD_REQUEST,
                Json(WebhookResponse::status("invalid_body")),
            )
                .into_response();
        }
    };

    let header = parts.headers.get(SIGNATURE_HEADER);

    if !state.verifier.verify_header(&raw_body, header) {
        warn!(
            has_signature = header.is_some(),
            body_length = raw_body.len(),
            "line_signature_invalid"
        );
        return (
            StatusCode::UNAUTHORIZED,
            Json(WebhookResponse::status("unauthorized")),
        )
            .into_response();
    }

    next.run(Request::from_parts(parts, Body::from(raw_body))).await
}

/// Whether a body read failed because it hit the size limit.
fn exceeds_length_limit(err: &axum::Error) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err as &(dyn StdError + 'static));
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

// =============================================================================
// LINE Webhook
// =============================================================================

/// LINE webhook endpoint.
///
/// The signature has already been checked by the middleware. Events that do
/// not have the expected shape are skipped; a broker failure returns 500 so
/// LINE can redeliver.
///
/// Events are published one at a time, so a failure part-way through a batch
/// leaves the earlier events queued and LINE's redelivery publishes them
/// again. Consumers must deduplicate on the message id, which is the
/// `webhookEventId`.
pub async fn line_webhook(State(state): State<AppState>, raw_body: Bytes) -> impl IntoResponse {
    let payload = match WebhookPayload::from_slice(&raw_body) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, body_length = raw_body.len(), "line_webhook_invalid_payload");
            return (
                StatusCode::BAD_REQUEST,
                Json(WebhookResponse::status("invalid_payload")),
            );
        }
    };

    info!(
        destination = ?payload.destination,
        event_count = payload.events.len(),
        "line_webhook_received"
    );

    let mut queued = 0;

    for (raw, typed) in payload.events.iter().zip(payload.typed_events()) {
        let event = match typed {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "line_event_skipped");
                continue;
            }
        };

        let envelope = QueuedEvent::new(&event, raw.clone(), payload.destination.clone());

        if let Err(e) = state.publisher.publish_event(&envelope).await {
            error!(
                error = %e,
                message_id = %envelope.message_id(),
                "line_event_publish_failed"
            );
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(WebhookResponse::status("error")),
            );
        }

        queued += 1;
    }

    info!(events_queued = queued, "line_webhook_enqueued");

    (
        StatusCode::OK,
        Json(WebhookResponse {
            status: "ok",
            events_queued: Some(queued),
        }),
    )
}
