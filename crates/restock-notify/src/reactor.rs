//! The stock-event reactor: turns "inventory went up" into "subscribers get
//! notified".
//!
//! For each variant named in a [`StockMovementEvent`], independently:
//!
//! 1. re-read the stock figures from the catalog (never from the event);
//! 2. compute saleable stock, aborting the variant if it is unusable;
//! 3. stop if nothing is saleable;
//! 4. fetch active subscriptions oldest first, capped at the saleable
//!    quantity when `limit_email_to_stock` is on;
//! 5. notify each one, isolating failures.
//!
//! Variants of one event run concurrently. A subscription cannot be notified
//! twice: only `Created` rows are selected and the lifecycle claims each one
//! for the duration of its transition.

use std::{collections::HashSet, ops::AddAssign, sync::Arc};

use restock_core::{
  event::StockMovementEvent, host::VariantCatalog, store::{PageOptions, SubscriptionStore},
};
use tokio::{
  sync::broadcast::{self, error::RecvError},
  task::{JoinHandle, JoinSet},
};
use uuid::Uuid;

use crate::{Error, EventBus, LifecycleService, Result, emitter::NotificationSink};

/// What one event (or one variant of it) led to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReactorReport {
  /// Subscriptions moved to `Notified`.
  pub notified:         usize,
  /// Subscriptions selected but found already handled.
  pub skipped:          usize,
  /// Subscriptions whose transition failed; they stay `Created`.
  pub failed:           usize,
  /// Variants whose processing was abandoned before notifying anyone.
  pub variants_aborted: usize,
}

impl AddAssign for ReactorReport {
  fn add_assign(&mut self, rhs: Self) {
    self.notified += rhs.notified;
    self.skipped += rhs.skipped;
    self.failed += rhs.failed;
    self.variants_aborted += rhs.variants_aborted;
  }
}

impl ReactorReport {
  fn aborted() -> Self { Self { variants_aborted: 1, ..Default::default() } }
}

/// Consumes stock movements and drives lifecycle transitions.
///
/// Cloning is cheap; clones share the lifecycle service.
pub struct Reactor<S, C, N> {
  lifecycle: Arc<LifecycleService<S, C, N>>,
}

impl<S, C, N> Clone for Reactor<S, C, N> {
  fn clone(&self) -> Self { Self { lifecycle: self.lifecycle.clone() } }
}

impl<S, C, N> Reactor<S, C, N>
where
  S: SubscriptionStore + 'static,
  C: VariantCatalog + 'static,
  N: NotificationSink + 'static,
{
  pub fn new(lifecycle: Arc<LifecycleService<S, C, N>>) -> Self { Self { lifecycle } }

  /// Subscribe to `bus` and run the consumer loop for the life of the
  /// process. Returns `None`, registering nothing, when e-mail is disabled.
  pub fn start(self, bus: &EventBus) -> Option<JoinHandle<()>> {
    if !self.lifecycle.config().enable_email {
      tracing::info!("e-mail disabled; back-in-stock reactor not started");
      return None;
    }
    Some(self.spawn(bus.stock_movements.subscribe()))
  }

  /// Run the consumer loop on `events`. Each event is handled on its own
  /// task so a slow event never holds up delivery of the next.
  ///
  /// The loop ends once every sender of the topic is dropped. Events already
  /// received are processed to completion before the returned handle
  /// resolves, so awaiting it after dropping the bus drains in-flight work.
  pub fn spawn(self, mut events: broadcast::Receiver<StockMovementEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
      let mut in_flight = JoinSet::new();
      loop {
        tokio::select! {
          received = events.recv() => match received {
            Ok(event) => {
              let this = self.clone();
              in_flight.spawn(async move {
                let report = this.handle(&event).await;
                tracing::info!(
                  channel = %event.channel,
                  variants = event.variant_ids.len(),
                  notified = report.notified,
                  skipped = report.skipped,
                  failed = report.failed,
                  aborted = report.variants_aborted,
                  "stock movement processed"
                );
              });
            }
            Err(RecvError::Lagged(missed)) => {
              tracing::warn!(missed, "stock movement consumer lagged; events dropped");
            }
            Err(RecvError::Closed) => {
              tracing::debug!("stock movement bus closed");
              break;
            }
          },
          Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
            log_join(joined);
          }
        }
      }

      while let Some(joined) = in_flight.join_next().await {
        log_join(joined);
      }
      tracing::debug!("stock movement consumer drained");
    })
  }

  /// Process one event to completion.
  pub async fn handle(&self, event: &StockMovementEvent) -> ReactorReport {
    let mut seen = HashSet::new();
    let mut tasks = JoinSet::new();
    for &variant_id in &event.variant_ids {
      if !seen.insert(variant_id) {
        continue;
      }
      let this = self.clone();
      tasks.spawn(async move { this.handle_variant(variant_id).await });
    }

    let mut report = ReactorReport::default();
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok(variant_report) => report += variant_report,
        Err(e) => {
          tracing::error!(error = %e, "variant task panicked");
          report += ReactorReport::aborted();
        }
      }
    }
    report
  }

  /// Steps 1–5 for a single variant. Never fails; problems are logged with
  /// the variant and subscription ids and counted in the report.
  pub async fn handle_variant(&self, variant_id: Uuid) -> ReactorReport {
    let subscriptions = match self.select(variant_id).await {
      Ok(subscriptions) => subscriptions,
      Err(e) => {
        tracing::error!(%variant_id, error = %e, "abandoning variant");
        return ReactorReport::aborted();
      }
    };

    let mut report = ReactorReport::default();
    for subscription_id in subscriptions {
      match self.lifecycle.notify(subscription_id).await {
        Ok(Some(_)) => report.notified += 1,
        Ok(None) => report.skipped += 1,
        Err(e) => {
          tracing::error!(
            %variant_id,
            %subscription_id,
            error = %e,
            "failed to notify subscriber"
          );
          report.failed += 1;
        }
      }
    }
    report
  }

  /// The ids of the subscriptions to notify for `variant_id`, oldest first.
  async fn select(&self, variant_id: Uuid) -> Result<Vec<Uuid>> {
    let level = self
      .lifecycle
      .stock_level(variant_id)
      .await?
      .ok_or(Error::VariantNotFound(variant_id))?;
    let saleable = level.saleable().ok_or(Error::InvalidStock(variant_id))?;

    if saleable < 1 {
      tracing::debug!(%variant_id, saleable, "nothing saleable");
      return Ok(Vec::new());
    }

    let config = self.lifecycle.config();
    let take = if config.limit_email_to_stock {
      usize::try_from(saleable).unwrap_or(usize::MAX)
    } else {
      config.max_page_size
    };

    // Pages are capped at `max_page_size`; a larger stock cap is reached by
    // reading consecutive pages, still oldest first.
    let mut selected = Vec::new();
    let mut active = 0;
    while selected.len() < take {
      let chunk = (take - selected.len()).min(config.max_page_size);
      let options = PageOptions { skip: Some(selected.len()), ..PageOptions::fifo(chunk) };
      let page = self
        .lifecycle
        .find_active_for_variant(variant_id, &options)
        .await?;
      let fetched = page.items.len();
      active = page.total_items;
      selected.extend(page.items.into_iter().map(|s| s.subscription_id));
      if fetched == 0 || fetched < chunk {
        break;
      }
    }

    tracing::debug!(
      %variant_id,
      saleable,
      selected = selected.len(),
      active,
      "selected subscribers"
    );
    Ok(selected)
  }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
  if let Err(e) = joined {
    tracing::error!(error = %e, "stock movement task panicked");
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use restock_core::{
    NotifierConfig,
    event::BackInStockEvent,
    host::{RequestContext, StockLevel, VariantRecord},
    subscription::{Subscription, SubscriptionStatus},
  };
  use restock_store_sqlite::SqliteStore;

  use super::*;
  use crate::{CreateResult, bus::PublishError};

  /// Records every event; refuses those addressed to `reject`.
  #[derive(Default)]
  struct RecordingSink {
    reject: Option<String>,
    sent:   Mutex<Vec<BackInStockEvent>>,
  }

  impl NotificationSink for Arc<RecordingSink> {
    fn publish(&self, event: BackInStockEvent) -> Result<(), PublishError> {
      if self.reject.as_deref() == Some(event.email_address.as_str()) {
        return Err(PublishError::NoSubscribers("rejected"));
      }
      self.sent.lock().unwrap().push(event);
      Ok(())
    }
  }

  impl RecordingSink {
    fn recipients(&self) -> Vec<String> {
      self.sent.lock().unwrap().iter().map(|e| e.email_address.clone()).collect()
    }
  }

  struct Harness {
    store:   Arc<SqliteStore>,
    sink:    Arc<RecordingSink>,
    reactor: Reactor<SqliteStore, SqliteStore, Arc<RecordingSink>>,
  }

  impl Harness {
    async fn new(config: NotifierConfig, sink: RecordingSink) -> Self {
      let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
      let sink = Arc::new(sink);
      let lifecycle = Arc::new(LifecycleService::new(
        store.clone(),
        store.clone(),
        sink.clone(),
        config,
      ));
      Self { store, sink, reactor: Reactor::new(lifecycle) }
    }

    async fn variant(&self, stock: StockLevel) -> Uuid {
      let variant_id = Uuid::new_v4();
      self.set_stock(variant_id, stock).await;
      variant_id
    }

    async fn set_stock(&self, variant_id: Uuid, stock: StockLevel) {
      self
        .store
        .upsert_variant(VariantRecord {
          variant_id,
          sku: "SKU".into(),
          name: "Tent".into(),
          stock,
        })
        .await
        .unwrap();
    }

    async fn subscribe(&self, variant_id: Uuid, email: &str) -> Subscription {
      let res = self
        .reactor
        .lifecycle
        .create(&RequestContext::new("default"), Some(email), variant_id)
        .await
        .unwrap();
      match res {
        CreateResult::Created(s) => s,
        other => panic!("expected created, got {other:?}"),
      }
    }

    async fn status(&self, sub: &Subscription) -> SubscriptionStatus {
      self
        .reactor
        .lifecycle
        .find_one(sub.subscription_id)
        .await
        .unwrap()
        .unwrap()
        .status
    }

    async fn react(&self, variant_ids: Vec<Uuid>) -> ReactorReport {
      self
        .reactor
        .handle(&StockMovementEvent { channel: "default".into(), variant_ids })
        .await
    }
  }

  fn on_hand(n: i64) -> StockLevel {
    StockLevel { on_hand: n, allocated: 0, out_of_stock_threshold: 0 }
  }

  #[tokio::test]
  async fn capped_notification_picks_the_earliest_subscribers() {
    let h = Harness::new(NotifierConfig::default(), RecordingSink::default()).await;
    let v = h.variant(on_hand(0)).await;
    let mut subs = vec![];
    for i in 0..5 {
      subs.push(h.subscribe(v, &format!("u{i}@x.com")).await);
    }

    h.set_stock(v, on_hand(2)).await;
    let report = h.react(vec![v]).await;
    assert_eq!(report.notified, 2);

    assert_eq!(h.sink.recipients(), ["u0@x.com", "u1@x.com"]);
    for (i, sub) in subs.iter().enumerate() {
      let expected = if i < 2 { SubscriptionStatus::Notified } else { SubscriptionStatus::Created };
      assert_eq!(h.status(sub).await, expected, "subscriber {i}");
    }
  }

  #[tokio::test]
  async fn stock_cap_above_page_size_still_reaches_the_earliest_subscribers() {
    let config = NotifierConfig { max_page_size: 2, ..Default::default() };
    let h = Harness::new(config, RecordingSink::default()).await;
    let v = h.variant(on_hand(0)).await;
    let mut subs = vec![];
    for i in 0..6 {
      subs.push(h.subscribe(v, &format!("u{i}@x.com")).await);
    }

    h.set_stock(v, on_hand(5)).await;
    let report = h.react(vec![v]).await;
    assert_eq!(report.notified, 5);

    assert_eq!(h.sink.recipients(), ["u0@x.com", "u1@x.com", "u2@x.com", "u3@x.com", "u4@x.com"]);
    assert_eq!(h.status(&subs[5]).await, SubscriptionStatus::Created);
  }

  #[tokio::test]
  async fn uncapped_notification_reaches_everyone() {
    let config = NotifierConfig { limit_email_to_stock: false, ..Default::default() };
    let h = Harness::new(config, RecordingSink::default()).await;
    let v = h.variant(on_hand(0)).await;
    for i in 0..4 {
      h.subscribe(v, &format!("u{i}@x.com")).await;
    }

    h.set_stock(v, on_hand(1)).await;
    let report = h.react(vec![v]).await;
    assert_eq!(report.notified, 4);
    assert_eq!(h.sink.recipients().len(), 4);
  }

  #[tokio::test]
  async fn allocated_and_threshold_reduce_the_cap() {
    let h = Harness::new(NotifierConfig::default(), RecordingSink::default()).await;
    let v = h.variant(on_hand(0)).await;
    for i in 0..5 {
      h.subscribe(v, &format!("u{i}@x.com")).await;
    }

    h.set_stock(v, StockLevel { on_hand: 6, allocated: 2, out_of_stock_threshold: 1 }).await;
    assert_eq!(h.react(vec![v]).await.notified, 3);
  }

  #[tokio::test]
  async fn no_saleable_stock_notifies_nobody() {
    let h = Harness::new(NotifierConfig::default(), RecordingSink::default()).await;
    let v = h.variant(on_hand(0)).await;
    let sub = h.subscribe(v, "a@x.com").await;

    h.set_stock(v, StockLevel { on_hand: 3, allocated: 2, out_of_stock_threshold: 1 }).await;
    let report = h.react(vec![v]).await;

    assert_eq!(report, ReactorReport::default());
    assert!(h.sink.recipients().is_empty());
    assert_eq!(h.status(&sub).await, SubscriptionStatus::Created);
  }

  #[tokio::test]
  async fn one_failing_subscriber_does_not_stop_the_rest() {
    let sink = RecordingSink { reject: Some("u1@x.com".into()), ..Default::default() };
    let h = Harness::new(NotifierConfig::default(), sink).await;
    let v = h.variant(on_hand(0)).await;
    let mut subs = vec![];
    for i in 0..3 {
      subs.push(h.subscribe(v, &format!("u{i}@x.com")).await);
    }

    h.set_stock(v, on_hand(3)).await;
    let report = h.react(vec![v]).await;
    assert_eq!(report.notified, 2);
    assert_eq!(report.failed, 1);

    assert_eq!(h.status(&subs[0]).await, SubscriptionStatus::Notified);
    assert_eq!(h.status(&subs[1]).await, SubscriptionStatus::Created);
    assert_eq!(h.status(&subs[2]).await, SubscriptionStatus::Notified);
  }

  #[tokio::test]
  async fn unusable_stock_aborts_only_that_variant() {
    let h = Harness::new(NotifierConfig::default(), RecordingSink::default()).await;
    let broken = h.variant(on_hand(0)).await;
    let healthy = h.variant(on_hand(0)).await;
    let stuck = h.subscribe(broken, "a@x.com").await;
    h.subscribe(healthy, "b@x.com").await;

    h.set_stock(broken, StockLevel {
      on_hand:                i64::MIN,
      allocated:              1,
      out_of_stock_threshold: 0,
    })
    .await;
    h.set_stock(healthy, on_hand(1)).await;

    let report = h.react(vec![broken, healthy, Uuid::new_v4()]).await;
    assert_eq!(report.variants_aborted, 2);
    assert_eq!(report.notified, 1);
    assert_eq!(h.sink.recipients(), ["b@x.com"]);
    assert_eq!(h.status(&stuck).await, SubscriptionStatus::Created);
  }

  #[tokio::test]
  async fn repeated_variant_ids_are_processed_once() {
    let config = NotifierConfig { limit_email_to_stock: false, ..Default::default() };
    let h = Harness::new(config, RecordingSink::default()).await;
    let v = h.variant(on_hand(5)).await;
    h.subscribe(v, "a@x.com").await;

    let report = h.react(vec![v, v, v]).await;
    assert_eq!(report.notified, 1);
    assert_eq!(h.sink.recipients().len(), 1);
  }

  #[tokio::test]
  async fn concurrent_events_notify_each_subscriber_once() {
    let config = NotifierConfig { limit_email_to_stock: false, ..Default::default() };
    let h = Harness::new(config, RecordingSink::default()).await;
    let v = h.variant(on_hand(10)).await;
    for i in 0..6 {
      h.subscribe(v, &format!("u{i}@x.com")).await;
    }

    let (a, b) = tokio::join!(h.react(vec![v]), h.react(vec![v]));
    assert_eq!(a.notified + b.notified, 6);
    assert_eq!(a.failed + b.failed, 0);

    let mut recipients = h.sink.recipients();
    recipients.sort();
    recipients.dedup();
    assert_eq!(recipients.len(), 6);
    assert_eq!(h.sink.recipients().len(), 6);
  }

  #[tokio::test]
  async fn closing_the_bus_drains_received_events() {
    let h = Harness::new(NotifierConfig::default(), RecordingSink::default()).await;
    let v = h.variant(on_hand(0)).await;
    let sub = h.subscribe(v, "a@x.com").await;
    h.set_stock(v, on_hand(1)).await;

    let bus = EventBus::default();
    let consumer = h.reactor.clone().spawn(bus.stock_movements.subscribe());
    bus
      .stock_movements
      .publish(StockMovementEvent { channel: "default".into(), variant_ids: vec![v] })
      .unwrap();
    drop(bus);

    tokio::time::timeout(std::time::Duration::from_secs(5), consumer)
      .await
      .expect("consumer finishes once the bus is closed")
      .unwrap();
    assert_eq!(h.status(&sub).await, SubscriptionStatus::Notified);
    assert_eq!(h.sink.recipients(), ["a@x.com"]);
  }

  #[tokio::test]
  async fn start_registers_nothing_when_email_disabled() {
    let config = NotifierConfig { enable_email: false, ..Default::default() };
    let h = Harness::new(config, RecordingSink::default()).await;
    let bus = EventBus::default();
    assert!(h.reactor.clone().start(&bus).is_none());
    assert_eq!(bus.stock_movements.subscriber_count(), 0);
  }
}
