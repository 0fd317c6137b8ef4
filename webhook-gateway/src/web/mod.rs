//! Web server module for handling inbound LINE webhooks.
//!
//! This module provides a thin web server that:
//! - Verifies the `x-line-signature` of every webhook against the raw body
//! - Immediately enqueues verified events to RabbitMQ
//! - Rejects everything else with a uniform 401
//!
//! What happens to an event after it is queued is not this server's concern.

pub mod handlers;
pub mod signature;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    health, line_webhook, require_line_signature, AppState, HealthResponse, WebhookResponse,
};
pub use signature::{sign, verify, SignatureVerifier, SIGNATURE_HEADER, SIGNATURE_SCHEMES};

/// Path LINE delivers webhooks to.
pub const WEBHOOK_PATH: &str = "/webhook";

/// Build the application router.
///
/// The signature check is layered on the webhook route only, so health checks
/// stay unauthenticated.
pub fn router(state: AppState) -> Router {
    let webhook = Router::new()
        .route(WEBHOOK_PATH, post(line_webhook))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_line_signature,
        ))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes));

    Router::new()
        .route("/health", get(health))
        .merge(webhook)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
