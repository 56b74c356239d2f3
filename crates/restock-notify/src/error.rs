//! Error type for `restock-notify`.
//!
//! Expected business outcomes of `create` are not errors; they come back as
//! [`crate::CreateResult::Rejected`]. Everything here is a fault.

use restock_core::subscription::SubscriptionStatus;
use thiserror::Error;
use uuid::Uuid;

use crate::bus::PublishError;

#[derive(Debug, Error)]
pub enum Error {
  /// A session is required to subscribe and none was presented.
  #[error("you are not currently authorized to perform this action")]
  Forbidden,

  #[error("subscription not found: {0}")]
  SubscriptionNotFound(Uuid),

  /// A transition to `Notified` was attempted while e-mail is switched off.
  #[error("email notification disabled")]
  EmailDisabled,

  /// A subscription points at a variant the catalog no longer knows.
  #[error("variant not found: {0}")]
  VariantNotFound(Uuid),

  /// Saleable stock could not be computed as a usable number.
  #[error("saleable stock for variant {0} is not a usable number")]
  InvalidStock(Uuid),

  #[error("subscription {0} is already being transitioned")]
  TransitionInProgress(Uuid),

  /// The row moved to another status while a notification was going out.
  /// The event has already been published.
  #[error("subscription {subscription_id} changed to {status} during the transition")]
  StatusChanged { subscription_id: Uuid, status: SubscriptionStatus },

  #[error("publish failed: {0}")]
  Publish(#[from] PublishError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
