use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the checkout pipeline.
///
/// Emission is best-effort audit: a full channel or dropped receiver is
/// logged and ignored, never surfaced to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    ProvisionalOrderCreated { order_number: String },
    ProvisionalOrderRolledBack { order_number: String },

    // Cart events
    CartItemAdded { user_id: Uuid, book_id: Uuid },
    CartItemRemoved { user_id: Uuid, book_id: Uuid },
    CartCleared(Uuid),
    GuestCartTransferred { user_id: Uuid, transferred: usize, failed: usize },

    // Payment events
    PaymentIntentCreated { user_id: Uuid, amount: Decimal, currency: String },
    PaymentInitialized { reference: String, gateway: String },
    PaymentInitializationFailed { reference: String, gateway: String },
    BankTransferPending { order_id: Uuid },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, propagating channel failures.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event; failures are logged and swallowed.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.sender.send(event.clone()).await {
            warn!(?event, "failed to emit event: {}", e);
        }
    }
}

/// Drains the event channel, logging each event.
///
/// Downstream consumers (email, webhooks, analytics) are external; this
/// service only records that the action happened.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(order_id) => info!(%order_id, "order created"),
            Event::GuestCartTransferred { user_id, transferred, failed } => {
                info!(%user_id, transferred, failed, "guest cart transferred")
            }
            Event::PaymentInitializationFailed { reference, gateway } => {
                warn!(%reference, %gateway, "payment initialization failed")
            }
            other => info!(event = ?other, "event"),
        }
    }
    info!("event channel closed; processor exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        // Must not panic or error out.
        sender.send_or_log(Event::CartCleared(Uuid::new_v4())).await;
    }

    #[tokio::test]
    async fn send_delivers_event() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let order_id = Uuid::new_v4();
        sender.send(Event::OrderCreated(order_id)).await.unwrap();
        match rx.recv().await {
            Some(Event::OrderCreated(id)) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
