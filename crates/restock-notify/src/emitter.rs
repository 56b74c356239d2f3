//! The notification emitter: one [`BackInStockEvent`] per subscription that
//! moves to `Notified`. Rendering and sending belong to whoever consumes it.

use restock_core::{event::BackInStockEvent, host::Variant, subscription::Subscription};

use crate::bus::{PublishError, Topic};

/// Where back-in-stock events are handed off.
pub trait NotificationSink: Send + Sync {
  /// Publish `event`. An `Ok` means at least one consumer accepted it.
  fn publish(&self, event: BackInStockEvent) -> Result<(), PublishError>;
}

impl NotificationSink for Topic<BackInStockEvent> {
  fn publish(&self, event: BackInStockEvent) -> Result<(), PublishError> {
    Topic::publish(self, event).map(|_| ())
  }
}

/// Builds and publishes notification events.
#[derive(Debug, Clone)]
pub struct Emitter<N> {
  sink: N,
}

impl<N: NotificationSink> Emitter<N> {
  pub fn new(sink: N) -> Self { Self { sink } }

  /// Publish the `updated` event for `subscription`, addressed to its e-mail.
  pub fn emit(&self, subscription: Subscription, variant: Variant) -> Result<(), PublishError> {
    let event = BackInStockEvent::updated(subscription, variant);
    let subscription_id = event.subscription.subscription_id;
    let variant_id      = event.variant.variant_id;
    self.sink.publish(event)?;
    tracing::debug!(%subscription_id, %variant_id, "back-in-stock event published");
    Ok(())
  }
}
