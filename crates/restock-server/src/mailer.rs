//! The outbound side of notifications.
//!
//! Delivery is left to an external mail service; this consumer drains the
//! back-in-stock topic and logs each message it would hand over.

use restock_core::event::BackInStockEvent;
use tokio::{
  sync::broadcast::{self, error::RecvError},
  task::JoinHandle,
};

/// Drain `events` until the bus closes.
pub fn spawn(mut events: broadcast::Receiver<BackInStockEvent>) -> JoinHandle<()> {
  tokio::spawn(async move {
    loop {
      match events.recv().await {
        Ok(event) => deliver(&event),
        Err(RecvError::Lagged(missed)) => {
          tracing::warn!(missed, "mail consumer lagged; notifications dropped");
        }
        Err(RecvError::Closed) => break,
      }
    }
  })
}

fn deliver(event: &BackInStockEvent) {
  tracing::info!(
    to = %event.email_address,
    subject = %event.subject(),
    subscription_id = %event.subscription.subscription_id,
    vars = %event.template_vars(),
    "back-in-stock e-mail queued"
  );
}
