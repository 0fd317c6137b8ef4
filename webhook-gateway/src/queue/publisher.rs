//! Async RabbitMQ publisher for verified events.
//!
//! The publisher connects lazily on first use and is shared across request
//! handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use lapin::{
    options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::types::{QueuedEvent, LINE_EVENTS_QUEUE};

/// Async RabbitMQ publisher with connection management.
///
/// Reconnects automatically when the cached channel is no longer connected.
#[derive(Clone)]
pub struct Publisher {
    inner: Arc<PublisherInner>,
}

struct PublisherInner {
    url: String,
    link: Mutex<Option<Link>>,
}

/// An open connection and its confirm-mode channel.
///
/// The connection is held so it can be closed on shutdown.
struct Link {
    connection: Connection,
    channel: Channel,
}

impl Publisher {
    /// Create a new publisher with the given RabbitMQ URL.
    ///
    /// No connection is made until the first publish.
    pub fn new(url: String) -> Self {
        Self {
            inner: Arc::new(PublisherInner {
                url,
                link: Mutex::new(None),
            }),
        }
    }

    /// Return a connected channel, opening a new link if needed.
    async fn channel(&self) -> Result<Channel> {
        let mut link = self.inner.link.lock().await;

        if let Some(current) = link.as_ref() {
            if current.channel.status().connected() {
                return Ok(current.channel.clone());
            }
            warn!("rabbitmq_publisher_link_lost");
        }

        let fresh = self.open_link().await?;
        let channel = fresh.channel.clone();
        *link = Some(fresh);

        Ok(channel)
    }

    async fn open_link(&self) -> Result<Link> {
        info!("rabbitmq_publisher_connecting");

        let connection = Connection::connect(&self.inner.url, ConnectionProperties::default())
            .await
            .context("Failed to connect to RabbitMQ")?;

        let channel = connection
            .create_channel()
            .await
            .context("Failed to create channel")?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .context("Failed to enable publisher confirms")?;

        channel
            .queue_declare(
                LINE_EVENTS_QUEUE,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .context("Failed to declare line events queue")?;

        info!(queue = LINE_EVENTS_QUEUE, "rabbitmq_publisher_connected");

        Ok(Link {
            connection,
            channel,
        })
    }

    /// Publish a verified event to the line_events queue.
    pub async fn publish_event(&self, event: &QueuedEvent) -> Result<()> {
        let channel = self.channel().await?;

        let body = serde_json::to_vec(event).context("Failed to serialize event")?;
        let message_id = event.message_id();

        let confirmation = channel
            .basic_publish(
                "",
                LINE_EVENTS_QUEUE,
                BasicPublishOptions::default(),
                &body,
                BasicProperties::default()
                    .with_delivery_mode(2) // Persistent
                    .with_content_type("application/json".into())
                    .with_message_id(message_id.clone().into()),
            )
            .await
            .context("Failed to publish to line events queue")?
            .await
            .context("Failed to confirm publish")?;

        if confirmation.is_nack() {
            anyhow::bail!("Broker rejected event {}", message_id);
        }

        info!(
            queue = LINE_EVENTS_QUEUE,
            message_id = %message_id,
            event_type = %event.event_type,
            body_length = body.len(),
            "rabbitmq_event_published"
        );

        Ok(())
    }

    /// Close the link, if one is open.
    pub async fn close(&self) {
        let Some(link) = self.inner.link.lock().await.take() else {
            return;
        };

        if let Err(e) = link.channel.close(200, "Normal shutdown").await {
            warn!(error = %e, "rabbitmq_channel_close_error");
        }
        if let Err(e) = link.connection.close(200, "Normal shutdown").await {
            warn!(error = %e, "rabbitmq_connection_close_error");
        }

        info!("rabbitmq_publisher_closed");
    }
}
