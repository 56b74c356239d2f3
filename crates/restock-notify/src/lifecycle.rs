//! Subscription lifecycle: creating subscriptions and moving them between
//! states.
//!
//! ```text
//! Created ──notify──▶ Notified ──(purchase, external)──▶ Converted
//! ```
//!
//! The only transition driven here is `Created -> Notified`, and it always
//! publishes a [`BackInStockEvent`](restock_core::event::BackInStockEvent).
//! The event is published first; the new status is persisted only once the
//! publish was accepted, so a subscriber is never left `Notified` without a
//! notification having gone out.

use std::{
  collections::HashSet,
  sync::{Arc, Mutex, PoisonError},
};

use restock_core::{
  NotifierConfig,
  host::{RequestContext, StockLevel, VariantCatalog},
  store::{Page, PageOptions, SubscriptionStore},
  subscription::{NewSubscription, Subscription, SubscriptionStatus},
};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  emitter::{Emitter, NotificationSink},
};

// ─── Create results ──────────────────────────────────────────────────────────

/// Stable codes for the expected ways `create` can be turned down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorCode {
  #[serde(rename = "EMAIL_REQUIRED_ERROR")]
  EmailRequired,
  #[serde(rename = "BACK_IN_STOCK_ALREADY_SUBSCRIBED_ERROR")]
  AlreadySubscribed,
  #[serde(rename = "VARIANT_NOT_FOUND_ERROR")]
  VariantNotFound,
}

/// A business-level rejection, returned as a value rather than raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResult {
  pub error_code: ErrorCode,
  pub message:    String,
}

impl ErrorResult {
  fn new(error_code: ErrorCode, message: impl Into<String>) -> Self {
    Self { error_code, message: message.into() }
  }
}

/// Outcome of [`LifecycleService::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateResult {
  Created(Subscription),
  Rejected(ErrorResult),
}

impl CreateResult {
  pub fn error_code(&self) -> Option<ErrorCode> {
    match self {
      Self::Created(_) => None,
      Self::Rejected(r) => Some(r.error_code),
    }
  }
}

// ─── In-flight claims ────────────────────────────────────────────────────────

/// Held while a subscription is being moved to `Notified`; releases on drop.
struct Claim<'a> {
  in_flight:       &'a Mutex<HashSet<Uuid>>,
  subscription_id: Uuid,
}

impl Drop for Claim<'_> {
  fn drop(&mut self) {
    self
      .in_flight
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&self.subscription_id);
  }
}

// ─── Service ─────────────────────────────────────────────────────────────────

/// Business rules for subscriptions, over any store and catalog.
pub struct LifecycleService<S, C, N> {
  store:     Arc<S>,
  catalog:   Arc<C>,
  emitter:   Emitter<N>,
  config:    NotifierConfig,
  in_flight: Mutex<HashSet<Uuid>>,
}

impl<S, C, N> LifecycleService<S, C, N>
where
  S: SubscriptionStore,
  C: VariantCatalog,
  N: NotificationSink,
{
  pub fn new(store: Arc<S>, catalog: Arc<C>, sink: N, config: NotifierConfig) -> Self {
    Self {
      store,
      catalog,
      emitter: Emitter::new(sink),
      config,
      in_flight: Mutex::new(HashSet::new()),
    }
  }

  pub fn config(&self) -> &NotifierConfig { &self.config }

  // ── Reads ─────────────────────────────────────────────────────────────────

  pub async fn find_one(&self, subscription_id: Uuid) -> Result<Option<Subscription>> {
    self
      .store
      .find_subscription(subscription_id)
      .await
      .map_err(Error::store)
  }

  /// List subscriptions; `take` is capped at the configured page size.
  pub async fn find_all(&self, options: &PageOptions) -> Result<Page<Subscription>> {
    let options = self.clamped(options);
    self
      .store
      .list_subscriptions(&options)
      .await
      .map_err(Error::store)
  }

  /// Active subscriptions for `variant_id`; `take` is capped at the
  /// configured page size.
  pub async fn find_active_for_variant(
    &self,
    variant_id: Uuid,
    options: &PageOptions,
  ) -> Result<Page<Subscription>> {
    let options = self.clamped(options);
    self
      .store
      .find_active_for_variant(variant_id, &options)
      .await
      .map_err(Error::store)
  }

  pub async fn find_active_for_variant_and_email(
    &self,
    ctx: &RequestContext,
    variant_id: Uuid,
    email: &str,
  ) -> Result<Option<Subscription>> {
    self
      .store
      .find_active_for_variant_and_email(&ctx.channel, variant_id, email.trim())
      .await
      .map_err(Error::store)
  }

  /// Current stock figures for `variant_id`, straight from the catalog.
  pub async fn stock_level(&self, variant_id: Uuid) -> Result<Option<StockLevel>> {
    self
      .catalog
      .stock_level(variant_id)
      .await
      .map_err(Error::store)
  }

  fn clamped(&self, options: &PageOptions) -> PageOptions {
    PageOptions {
      take: Some(self.config.clamp_take(options.take)),
      ..options.clone()
    }
  }

  // ── Create ────────────────────────────────────────────────────────────────

  /// Subscribe `email` (or the session customer's address) to `variant_id`
  /// in the context's channel.
  ///
  /// Missing e-mail, unknown variant, and an existing active subscription
  /// come back as [`CreateResult::Rejected`]. A missing session when one is
  /// required is [`Error::Forbidden`], raised before anything is written.
  #[tracing::instrument(skip(self, ctx, email), fields(channel = %ctx.channel))]
  pub async fn create(
    &self,
    ctx: &RequestContext,
    email: Option<&str>,
    variant_id: Uuid,
  ) -> Result<CreateResult> {
    if !self.config.allow_subscription_without_session && ctx.session.is_none() {
      return Err(Error::Forbidden);
    }

    let customer = ctx.customer();
    let email = email
      .map(str::trim)
      .filter(|e| !e.is_empty())
      .or_else(|| customer.map(|c| c.email_address.as_str()));
    let Some(email) = email else {
      return Ok(CreateResult::Rejected(ErrorResult::new(
        ErrorCode::EmailRequired,
        "Email is required!",
      )));
    };

    let variant = self
      .catalog
      .find_variant(variant_id)
      .await
      .map_err(Error::store)?;
    if variant.is_none() {
      return Ok(CreateResult::Rejected(ErrorResult::new(
        ErrorCode::VariantNotFound,
        format!("Variant {variant_id} not found"),
      )));
    }

    let existing = self
      .store
      .find_active_for_variant_and_email(&ctx.channel, variant_id, email)
      .await
      .map_err(Error::store)?;
    if existing.is_some() {
      return Ok(already_subscribed());
    }

    let input = NewSubscription {
      variant_id,
      channel: ctx.channel.clone(),
      customer_id: customer.map(|c| c.customer_id),
      email: email.to_owned(),
    };

    // The store's uniqueness constraint settles a race with a concurrent
    // create that passed the check above.
    match self.store.insert_subscription(input).await.map_err(Error::store)? {
      Some(subscription) => {
        tracing::info!(
          subscription_id = %subscription.subscription_id,
          "subscription created"
        );
        Ok(CreateResult::Created(subscription))
      }
      None => Ok(already_subscribed()),
    }
  }

  // ── Transitions ───────────────────────────────────────────────────────────

  /// Set a subscription's status.
  ///
  /// Moving to `Notified` publishes a back-in-stock event before the status
  /// is written, and fails with [`Error::EmailDisabled`] when e-mail is
  /// switched off. Other targets are written directly.
  #[tracing::instrument(skip(self))]
  pub async fn update_status(
    &self,
    subscription_id: Uuid,
    status: SubscriptionStatus,
  ) -> Result<Subscription> {
    if status != SubscriptionStatus::Notified {
      return self
        .store
        .set_status(subscription_id, None, status)
        .await
        .map_err(Error::store)?
        .ok_or(Error::SubscriptionNotFound(subscription_id));
    }

    let current = self
      .find_one(subscription_id)
      .await?
      .ok_or(Error::SubscriptionNotFound(subscription_id))?;
    self.ensure_email_enabled()?;
    let _claim = self
      .claim(subscription_id)
      .ok_or(Error::TransitionInProgress(subscription_id))?;

    self.publish(current.clone()).await?;

    let updated = self
      .store
      .set_status(subscription_id, Some(current.status), SubscriptionStatus::Notified)
      .await
      .map_err(Error::store)?;
    match updated {
      Some(subscription) => Ok(subscription),
      None => {
        let now = self
          .find_one(subscription_id)
          .await?
          .ok_or(Error::SubscriptionNotFound(subscription_id))?;
        tracing::warn!(
          %subscription_id,
          status = %now.status,
          "status changed while notifying; event already published"
        );
        Err(Error::StatusChanged { subscription_id, status: now.status })
      }
    }
  }

  /// `update_status(id, Notified)` for a subscription that is still active.
  ///
  /// Returns `None` without publishing if the subscription is no longer
  /// `Created` or another task is already transitioning it.
  pub async fn notify(&self, subscription_id: Uuid) -> Result<Option<Subscription>> {
    self.ensure_email_enabled()?;
    let Some(_claim) = self.claim(subscription_id) else {
      return Ok(None);
    };

    let current = self
      .find_one(subscription_id)
      .await?
      .ok_or(Error::SubscriptionNotFound(subscription_id))?;
    if !current.is_active() {
      return Ok(None);
    }

    self.publish(current).await?;

    self
      .store
      .set_status(
        subscription_id,
        Some(SubscriptionStatus::Created),
        SubscriptionStatus::Notified,
      )
      .await
      .map_err(Error::store)
  }

  fn ensure_email_enabled(&self) -> Result<()> {
    if self.config.enable_email {
      Ok(())
    } else {
      Err(Error::EmailDisabled)
    }
  }

  fn claim(&self, subscription_id: Uuid) -> Option<Claim<'_>> {
    let inserted = self
      .in_flight
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(subscription_id);
    inserted.then_some(Claim { in_flight: &self.in_flight, subscription_id })
  }

  /// Resolve the variant and publish the back-in-stock event carrying the
  /// pre-transition `subscription`.
  async fn publish(&self, subscription: Subscription) -> Result<()> {
    let variant = self
      .catalog
      .find_variant(subscription.variant_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::VariantNotFound(subscription.variant_id))?;
    self.emitter.emit(subscription, variant)?;
    Ok(())
  }
}

fn already_subscribed() -> CreateResult {
  CreateResult::Rejected(ErrorResult::new(ErrorCode::AlreadySubscribed, "Already subscribed!"))
}
