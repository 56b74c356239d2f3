//! The `SubscriptionStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `restock-store-sqlite`).
//! Higher layers (`restock-notify`, `restock-api`) depend on this abstraction,
//! not on any concrete backend. The store owns no business rules.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::subscription::{NewSubscription, Subscription, SubscriptionStatus};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Columns a subscription list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortField {
  CreatedAt,
  UpdatedAt,
  Email,
  Status,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
  #[default]
  Asc,
  Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
  pub field: SortField,
  pub order: SortOrder,
}

impl Sort {
  /// Oldest first, the order subscribers are notified in.
  pub const FIFO: Sort = Sort { field: SortField::CreatedAt, order: SortOrder::Asc };
}

/// Equality filters; every field that is set must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
  pub status:     Option<SubscriptionStatus>,
  pub email:      Option<String>,
  pub channel:    Option<String>,
  pub variant_id: Option<Uuid>,
}

/// Pagination, sorting, and filtering for list queries.
///
/// Backends break ties on insertion order, so rows with identical timestamps
/// still come back oldest first under [`Sort::FIFO`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageOptions {
  pub skip:   Option<usize>,
  pub take:   Option<usize>,
  pub sort:   Option<Sort>,
  pub filter: SubscriptionFilter,
}

impl PageOptions {
  /// The first `take` rows, oldest first.
  pub fn fifo(take: usize) -> Self {
    Self { take: Some(take), sort: Some(Sort::FIFO), ..Default::default() }
  }
}

/// One page of results plus the number of rows matching the filter overall.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
  pub items:       Vec<T>,
  pub total_items: usize,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a subscription storage backend.
///
/// Backends must guarantee that at most one `Created` subscription exists per
/// `(variant_id, channel, email)`, as a storage constraint rather than a
/// read-then-write check.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait SubscriptionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Persist a new subscription in the `Created` state.
  ///
  /// Returns `None`, writing nothing, if an active subscription already
  /// exists for the same variant, channel, and e-mail.
  fn insert_subscription(
    &self,
    input: NewSubscription,
  ) -> impl Future<Output = Result<Option<Subscription>, Self::Error>> + Send + '_;

  /// Move a subscription to `status` and bump `updated_at`.
  ///
  /// With `expected` set, the write only happens if the current status still
  /// equals it. Returns `None` if the subscription does not exist or the
  /// expectation failed.
  fn set_status(
    &self,
    subscription_id: Uuid,
    expected: Option<SubscriptionStatus>,
    status: SubscriptionStatus,
  ) -> impl Future<Output = Result<Option<Subscription>, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// Retrieve a subscription by id. Returns `None` if not found.
  fn find_subscription(
    &self,
    subscription_id: Uuid,
  ) -> impl Future<Output = Result<Option<Subscription>, Self::Error>> + Send + '_;

  /// List subscriptions with generic paging, sorting, and filtering.
  fn list_subscriptions<'a>(
    &'a self,
    options: &'a PageOptions,
  ) -> impl Future<Output = Result<Page<Subscription>, Self::Error>> + Send + 'a;

  /// Active (`Created`) subscriptions for one variant. Any status filter in
  /// `options` is overridden.
  fn find_active_for_variant<'a>(
    &'a self,
    variant_id: Uuid,
    options: &'a PageOptions,
  ) -> impl Future<Output = Result<Page<Subscription>, Self::Error>> + Send + 'a;

  /// The active subscription for a variant and e-mail within one channel, if
  /// any. The same e-mail may hold independent subscriptions per channel.
  fn find_active_for_variant_and_email<'a>(
    &'a self,
    channel: &'a str,
    variant_id: Uuid,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Subscription>, Self::Error>> + Send + 'a;
}
