//! Subscription: a request to be e-mailed when a variant is back in stock.
//!
//! A subscription is created in the `Created` state and moves forward only.
//! This crate never deletes one; the only mutation is a status transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Status ──────────────────────────────────────────────────────────────────

/// The state of a subscription.
///
/// `Created` is the only *active* state. `Notified` is reached when the
/// variant came back in stock and an e-mail event was published. `Converted`
/// is set by a purchase-completion collaborator outside this workspace.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::IntoStaticStr,
)]
pub enum SubscriptionStatus {
  Created,
  Notified,
  Converted,
}

impl SubscriptionStatus {
  /// The string stored in the `status` column.
  pub fn as_str(self) -> &'static str { self.into() }

  /// Decode a persisted status. Anything other than the three known names is
  /// a data-integrity fault.
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownStatus(s.to_owned()))
  }

  pub fn is_active(self) -> bool { matches!(self, Self::Created) }
}

// ─── Subscription ────────────────────────────────────────────────────────────

/// A persisted back-in-stock subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
  pub subscription_id: Uuid,
  pub status:          SubscriptionStatus,
  /// The watched variant; never changes after creation.
  pub variant_id:      Uuid,
  /// The sales channel the subscription was made in; never changes.
  pub channel:         String,
  /// Absent for guest subscriptions.
  pub customer_id:     Option<Uuid>,
  pub email:           String,
  pub created_at:      DateTime<Utc>,
  /// Bumped on every status transition.
  pub updated_at:      DateTime<Utc>,
}

impl Subscription {
  pub fn is_active(&self) -> bool { self.status.is_active() }
}

// ─── NewSubscription ─────────────────────────────────────────────────────────

/// Input to [`crate::store::SubscriptionStore::insert_subscription`].
/// The id, status, and timestamps are always assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubscription {
  pub variant_id:  Uuid,
  pub channel:     String,
  pub customer_id: Option<Uuid>,
  pub email:       String,
}
