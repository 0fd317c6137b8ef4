//! Queue module for RabbitMQ operations.
//!
//! Business logic for verified LINE events runs outside this gateway. The
//! gateway only hands each verified event to a durable queue.
//!
//! ## Architecture
//!
//! ```text
//! LINE → Web Server (verify signature) → line_events queue → downstream consumers
//! ```

pub mod publisher;
pub mod types;

pub use publisher::Publisher;
pub use types::{QueuedEvent, LINE_EVENTS_QUEUE};
