//! In-process publish/subscribe, one typed topic per event payload.
//!
//! Built on `tokio::sync::broadcast`: every receiver sees every event
//! published after it subscribed. A receiver that falls more than the
//! topic capacity behind observes a lag and skips ahead.

use restock_core::event::{BackInStockEvent, StockMovementEvent};
use thiserror::Error;
use tokio::sync::broadcast;

/// Default number of undelivered events a topic buffers per receiver.
pub const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum PublishError {
  /// Nothing was listening, so the event went nowhere.
  #[error("no subscribers for {0}")]
  NoSubscribers(&'static str),
}

/// A broadcast channel for events of type `E`.
///
/// Cloning is cheap; all clones publish to the same receivers.
#[derive(Debug)]
pub struct Topic<E> {
  tx: broadcast::Sender<E>,
}

impl<E> Clone for Topic<E> {
  fn clone(&self) -> Self { Self { tx: self.tx.clone() } }
}

impl<E: Clone + Send + 'static> Topic<E> {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity);
    Self { tx }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<E> { self.tx.subscribe() }

  /// Hand `event` to every current subscriber. Returns how many received it;
  /// fails if there were none.
  pub fn publish(&self, event: E) -> Result<usize, PublishError> {
    self
      .tx
      .send(event)
      .map_err(|_| PublishError::NoSubscribers(std::any::type_name::<E>()))
  }

  pub fn subscriber_count(&self) -> usize { self.tx.receiver_count() }
}

/// The topics the notifier publishes to and consumes from.
#[derive(Debug, Clone)]
pub struct EventBus {
  /// Inbound: inventory changed in the host.
  pub stock_movements: Topic<StockMovementEvent>,
  /// Outbound: a subscriber should be e-mailed.
  pub back_in_stock:   Topic<BackInStockEvent>,
}

impl EventBus {
  pub fn new(capacity: usize) -> Self {
    Self {
      stock_movements: Topic::new(capacity),
      back_in_stock:   Topic::new(capacity),
    }
  }
}

impl Default for EventBus {
  fn default() -> Self { Self::new(DEFAULT_CAPACITY) }
}
