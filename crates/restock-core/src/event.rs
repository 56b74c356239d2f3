//! Event payloads crossing the notifier boundary.
//!
//! [`StockMovementEvent`] comes in from the host whenever inventory changes.
//! [`BackInStockEvent`] goes out once per subscription that moved to
//! `Notified`; an external mail system renders and sends it.

use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::{host::Variant, subscription::Subscription};

/// Inventory changed for one or more variants.
///
/// Only the ids are trusted; stock figures are always re-read from the
/// catalog because the event may be stale or partial.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMovementEvent {
  pub channel:     String,
  pub variant_ids: Vec<Uuid>,
}

/// The kind of change a [`BackInStockEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
  Updated,
}

/// A subscriber should be told their variant is available again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackInStockEvent {
  /// The subscription as it was before the transition.
  pub subscription:  Subscription,
  pub variant:       Variant,
  pub kind:          EventKind,
  pub email_address: String,
}

impl BackInStockEvent {
  pub fn updated(subscription: Subscription, variant: Variant) -> Self {
    let email_address = subscription.email.clone();
    Self { subscription, variant, kind: EventKind::Updated, email_address }
  }

  /// Subject line for the outgoing e-mail.
  pub fn subject(&self) -> String {
    format!("{} - Back in Stock!", self.variant.name)
  }

  /// Variables handed to the external template renderer.
  pub fn template_vars(&self) -> serde_json::Value {
    json!({
      "productVariant": {
        "id":   self.variant.variant_id,
        "sku":  self.variant.sku,
        "name": self.variant.name,
      },
      "channel": self.subscription.channel,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::Utc;

  use super::*;
  use crate::subscription::SubscriptionStatus;

  fn event() -> BackInStockEvent {
    let variant_id = Uuid::new_v4();
    let now = Utc::now();
    BackInStockEvent::updated(
      Subscription {
        subscription_id: Uuid::new_v4(),
        status:          SubscriptionStatus::Created,
        variant_id,
        channel:         "default".into(),
        customer_id:     None,
        email:           "a@x.com".into(),
        created_at:      now,
        updated_at:      now,
      },
      Variant { variant_id, sku: "L2201308".into(), name: "Laptop 13 inch 8GB".into() },
    )
  }

  #[test]
  fn recipient_is_the_subscription_email() {
    let ev = event();
    assert_eq!(ev.email_address, "a@x.com");
    assert_eq!(ev.kind, EventKind::Updated);
  }

  #[test]
  fn subject_names_the_variant() {
    assert_eq!(event().subject(), "Laptop 13 inch 8GB - Back in Stock!");
  }

  #[test]
  fn template_vars_carry_variant_fields() {
    let vars = event().template_vars();
    assert_eq!(vars["productVariant"]["sku"], "L2201308");
    assert_eq!(vars["channel"], "default");
  }
}
