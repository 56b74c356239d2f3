//! JSON HTTP API for the back-in-stock notifier.
//!
//! Exposes an axum [`Router`] with two faces:
//!
//! - `/shop/*`: what a storefront calls on behalf of a shopper. The channel
//!   comes from the `x-channel` header and the session from
//!   `Authorization: Bearer <token>`.
//! - `/admin/*`: back-office queries, status changes, and the hooks the host
//!   uses to push catalog and stock changes. Requires HTTP Basic auth.
//!
//! TLS and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! let state = AppState::new(store, bus.clone(), notifier, "default", auth);
//! Reactor::new(state.lifecycle.clone()).start(&bus);
//! axum::serve(listener, restock_api::router(state)).await?;
//! ```

pub mod admin;
pub mod auth;
pub mod context;
pub mod error;
pub mod shop;


use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post, put},
};
use restock_core::{
  NotifierConfig,
  event::BackInStockEvent,
  host::{IdentityProvider, VariantCatalog},
  store::SubscriptionStore,
};
use restock_notify::{EventBus, LifecycleService, Topic};

pub use auth::AuthConfig;
pub use error::ApiError;

/// Everything the API needs from the host side, in one backend.
///
/// Implemented automatically for any type providing all three capabilities,
/// such as `restock_store_sqlite::SqliteStore`.
pub trait Backend: SubscriptionStore + VariantCatalog + IdentityProvider + 'static {}

impl<T> Backend for T where T: SubscriptionStore + VariantCatalog + IdentityProvider + 'static {}

/// The lifecycle service as wired by the API: notifications go out on the
/// bus's back-in-stock topic.
pub type Lifecycle<S> = LifecycleService<S, S, Topic<BackInStockEvent>>;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub backend:         Arc<S>,
  pub lifecycle:       Arc<Lifecycle<S>>,
  pub bus:             EventBus,
  /// Channel assumed when a request carries no `x-channel` header.
  pub default_channel: Arc<str>,
  pub auth:            Arc<AuthConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      backend:         self.backend.clone(),
      lifecycle:       self.lifecycle.clone(),
      bus:             self.bus.clone(),
      default_channel: self.default_channel.clone(),
      auth:            self.auth.clone(),
    }
  }
}

impl<S: Backend> AppState<S> {
  pub fn new(
    backend: Arc<S>,
    bus: EventBus,
    notifier: NotifierConfig,
    default_channel: impl Into<Arc<str>>,
    auth: AuthConfig,
  ) -> Self {
    let lifecycle = LifecycleService::new(
      backend.clone(),
      backend.clone(),
      bus.back_in_stock.clone(),
      notifier,
    );
    Self {
      backend,
      lifecycle: Arc::new(lifecycle),
      bus,
      default_channel: default_channel.into(),
      auth: Arc::new(auth),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn router<S: Backend>(state: AppState<S>) -> Router<()> {
  Router::new()
    // Shop
    .route("/shop/sessions", post(shop::open_session::<S>))
    .route("/shop/subscriptions", post(shop::create::<S>))
    .route("/shop/subscriptions/active", get(shop::find_active::<S>))
    // Admin
    .route("/admin/subscriptions", get(admin::list::<S>))
    .route(
      "/admin/subscriptions/{id}",
      get(admin::get_one::<S>).patch(admin::update_status::<S>),
    )
    .route("/admin/variants/{id}", put(admin::upsert_variant::<S>))
    .route("/admin/variants/{id}/subscriptions", get(admin::list_for_variant::<S>))
    .route("/admin/stock-movements", post(admin::stock_movement::<S>))
    .with_state(state)
}
