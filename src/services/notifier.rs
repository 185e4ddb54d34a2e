use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::order::{OrderPaidEvent, ShipAssembledEvent};
use crate::messaging::{codec, HandlerError, Message, MessageHandler, WireEvent};

// ============================================================================
// Fan-out Notifier
// ============================================================================
//
// Observes OrderPaid and ShipAssembled in its own consumer groups and turns
// each into a plain-text message for the user. Never touches order state.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Where rendered notifications go.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, user_id: &str, text: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the log.
#[derive(Debug, Default)]
pub struct LoggingSink;

#[async_trait]
impl NotificationSink for LoggingSink {
    async fn send(&self, user_id: &str, text: &str) -> Result<(), NotifyError> {
        tracing::info!(user_id, text, "🔔 Notification");
        Ok(())
    }
}

/// An event that can be rendered for its user.
pub trait Notification: WireEvent {
    fn order_id(&self) -> &str;

    fn recipient(&self) -> &str;

    fn render(&self) -> String;
}

impl Notification for OrderPaidEvent {
    fn order_id(&self) -> &str {
        &self.order_id
    }

    fn recipient(&self) -> &str {
        &self.user_id
    }

    fn render(&self) -> String {
        format!(
            "💳 Order {} is paid\nPayment method: {}\nTransaction: {}",
            self.order_id, self.payment_method, self.transaction_id
        )
    }
}

impl Notification for ShipAssembledEvent {
    fn order_id(&self) -> &str {
        &self.order_id
    }

    fn recipient(&self) -> &str {
        &self.user_id
    }

    fn render(&self) -> String {
        format!(
            "🚀 Your ship for order {} is assembled\nBuild time: {}s",
            self.order_id, self.build_time_seconds
        )
    }
}

pub struct Notifier<E> {
    sink: Arc<dyn NotificationSink>,
    _event: PhantomData<fn() -> E>,
}

impl<E: Notification> Notifier<E> {
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self {
            sink,
            _event: PhantomData,
        }
    }
}

#[async_trait]
impl<E: Notification + 'static> MessageHandler for Notifier<E> {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let event: E = codec::decode(&message.payload)?;
        if event.order_id().is_empty() {
            return Err(HandlerError::Malformed(format!("{} with empty order_id", E::NAME)));
        }

        tracing::debug!(
            topic = %message.topic,
            offset = message.offset,
            order_id = %event.order_id(),
            event = E::NAME,
            "📨 Received event for notification"
        );

        self.sink
            .send(event.recipient(), &event.render())
            .await
            .map_err(HandlerError::retry)
    }
}
