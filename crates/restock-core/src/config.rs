//! Notifier options.
//!
//! Built once at process start and handed by value to every component that
//! needs it. Missing keys fall back to the defaults below.

use serde::Deserialize;

/// Runtime options for subscription handling and notification.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
  /// Global kill switch for the `Created -> Notified` transition. When off,
  /// that transition is rejected rather than stranding subscribers in
  /// `Notified` with no e-mail sent.
  pub enable_email:                       bool,
  /// Notify only as many subscribers as there is saleable stock (oldest
  /// first). When off, every active subscriber is notified.
  pub limit_email_to_stock:               bool,
  /// Accept `create` calls that carry no session.
  pub allow_subscription_without_session: bool,
  /// Ceiling on any single page of subscriptions, including the "unbounded"
  /// fetch done when `limit_email_to_stock` is off.
  pub max_page_size:                      usize,
}

impl Default for NotifierConfig {
  fn default() -> Self {
    Self {
      enable_email:                       true,
      limit_email_to_stock:               true,
      allow_subscription_without_session: true,
      max_page_size:                      1000,
    }
  }
}

impl NotifierConfig {
  /// Clamp a requested page size to `max_page_size`. `None` means "as many
  /// as allowed".
  pub fn clamp_take(&self, take: Option<usize>) -> usize {
    take.map_or(self.max_page_size, |t| t.min(self.max_page_size))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn partial_input_keeps_defaults() {
    let cfg: NotifierConfig =
      serde_json::from_str(r#"{"limit_email_to_stock": false}"#).unwrap();
    assert!(cfg.enable_email);
    assert!(!cfg.limit_email_to_stock);
    assert!(cfg.allow_subscription_without_session);
    assert_eq!(cfg.max_page_size, 1000);
  }

  #[test]
  fn clamp_take_caps_at_max_page_size() {
    let cfg = NotifierConfig { max_page_size: 50, ..Default::default() };
    assert_eq!(cfg.clamp_take(None), 50);
    assert_eq!(cfg.clamp_take(Some(10)), 10);
    assert_eq!(cfg.clamp_take(Some(500)), 50);
  }
}
