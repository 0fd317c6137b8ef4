//! Safety Bus webhook gateway.
//!
//! This library provides shared modules for the two binaries:
//! - `safetybus-gateway`: Web server that authenticates LINE webhooks and
//!   enqueues verified events
//! - `safetybus-smoke`: Signs payloads and probes a deployed gateway
//!
//! ## Architecture
//!
//! ```text
//! LINE → Web Server (x-line-signature check) → line_events queue → consumers
//! ```

pub mod config;
pub mod line;
pub mod queue;
pub mod smoke;
pub mod web;

// Re-export commonly used types
pub use config::{ChannelSecret, Config, ConfigError};
pub use line::{Event, EventKind, WebhookPayload};
pub use queue::{Publisher, QueuedEvent, LINE_EVENTS_QUEUE};
pub use web::{router, AppState, SignatureVerifier};
