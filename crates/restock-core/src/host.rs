//! Capabilities owned by the host shop platform.
//!
//! The notifier never manages catalog or identity data itself; it reads them
//! through [`VariantCatalog`] and [`IdentityProvider`]. A standalone
//! deployment backs both with the same storage as the subscriptions.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Variants ────────────────────────────────────────────────────────────────

/// A display-ready product variant. `name` is already localised by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
  pub variant_id: Uuid,
  pub sku:        String,
  pub name:       String,
}

/// Raw inventory numbers for a variant, read from the source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLevel {
  pub on_hand:                i64,
  /// Reserved by placed but unfulfilled orders.
  pub allocated:              i64,
  /// Safety margin below which the variant counts as out of stock.
  pub out_of_stock_threshold: i64,
}

impl StockLevel {
  /// `on_hand - allocated - out_of_stock_threshold`.
  ///
  /// Returns `None` when the result is not representable; callers must treat
  /// that as an unusable stock figure rather than guessing.
  pub fn saleable(&self) -> Option<i64> {
    self
      .on_hand
      .checked_sub(self.allocated)?
      .checked_sub(self.out_of_stock_threshold)
  }
}

/// Input to [`VariantCatalog::upsert_variant`]: the host pushing its current
/// view of a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantRecord {
  pub variant_id: Uuid,
  pub sku:        String,
  pub name:       String,
  pub stock:      StockLevel,
}

/// Read access to the host catalog, plus the sync hook the host uses to keep
/// it current.
pub trait VariantCatalog: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Resolve a variant by id. Returns `None` if it does not exist.
  fn find_variant(
    &self,
    variant_id: Uuid,
  ) -> impl Future<Output = Result<Option<Variant>, Self::Error>> + Send + '_;

  /// Resolve several variants at once; unknown ids are silently omitted.
  fn find_variants<'a>(
    &'a self,
    variant_ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<Variant>, Self::Error>> + Send + 'a;

  /// Current inventory numbers for a variant. `None` if it does not exist.
  fn stock_level(
    &self,
    variant_id: Uuid,
  ) -> impl Future<Output = Result<Option<StockLevel>, Self::Error>> + Send + '_;

  /// Insert or replace a variant and its stock figures.
  fn upsert_variant(
    &self,
    record: VariantRecord,
  ) -> impl Future<Output = Result<Variant, Self::Error>> + Send + '_;
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// A registered shop customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
  pub customer_id:   Uuid,
  pub email_address: String,
}

/// A shop session. Anonymous sessions exist (e.g. a guest with a cart) and
/// carry no customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub token:    String,
  pub customer: Option<Customer>,
}

/// Session resolution, owned by the host.
pub trait IdentityProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Look up a session by its bearer token.
  fn resolve_session<'a>(
    &'a self,
    token: &'a str,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + 'a;

  /// Open a new session. With an e-mail address the session belongs to the
  /// customer registered under it (created on first use); without one it is
  /// anonymous.
  fn open_session(
    &self,
    customer_email: Option<String>,
  ) -> impl Future<Output = Result<Session, Self::Error>> + Send + '_;
}

// ─── Request context ─────────────────────────────────────────────────────────

/// Who is asking, and in which channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
  pub channel: String,
  pub session: Option<Session>,
}

impl RequestContext {
  pub fn new(channel: impl Into<String>) -> Self {
    Self { channel: channel.into(), session: None }
  }

  pub fn with_session(mut self, session: Session) -> Self {
    self.session = Some(session);
    self
  }

  /// The registered customer behind the session, if any.
  pub fn customer(&self) -> Option<&Customer> {
    self.session.as_ref().and_then(|s| s.customer.as_ref())
  }
}
