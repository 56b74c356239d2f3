//! Handlers for `/admin` endpoints. Every handler requires Basic auth.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/admin/subscriptions` | `?skip&take&sort=createdAt\|updatedAt\|email\|status&order=asc\|desc&status&email&channel&variant_id` |
//! | `GET`   | `/admin/subscriptions/{id}` | 404 if not found |
//! | `PATCH` | `/admin/subscriptions/{id}` | Body: `{"status":"Notified"}` |
//! | `GET`   | `/admin/variants/{id}/subscriptions` | Active only, oldest first; `?skip&take` |
//! | `PUT`   | `/admin/variants/{id}` | Host sync: variant and stock figures; announces a stock movement |
//! | `POST`  | `/admin/stock-movements` | Body: `{"variant_ids":[…]}` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use restock_core::{
  event::StockMovementEvent,
  host::{RequestContext, StockLevel, Variant, VariantCatalog, VariantRecord},
  store::{Page, PageOptions, Sort, SortField, SortOrder, SubscriptionFilter},
  subscription::{Subscription, SubscriptionStatus},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, Backend, auth::Authenticated, context::ShopContext, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub skip:       Option<usize>,
  pub take:       Option<usize>,
  pub sort:       Option<SortField>,
  pub order:      Option<SortOrder>,
  pub status:     Option<SubscriptionStatus>,
  pub email:      Option<String>,
  pub channel:    Option<String>,
  pub variant_id: Option<Uuid>,
}

impl ListParams {
  fn into_options(self) -> PageOptions {
    PageOptions {
      skip:   self.skip,
      take:   self.take,
      sort:   self.sort.map(|field| Sort { field, order: self.order.unwrap_or_default() }),
      filter: SubscriptionFilter {
        status:     self.status,
        email:      self.email,
        channel:    self.channel,
        variant_id: self.variant_id,
      },
    }
  }
}

/// `GET /admin/subscriptions`
pub async fn list<S: Backend>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Page<Subscription>>, ApiError> {
  let page = state.lifecycle.find_all(&params.into_options()).await?;
  Ok(Json(page))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /admin/subscriptions/{id}`
pub async fn get_one<S: Backend>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Subscription>, ApiError> {
  let subscription = state
    .lifecycle
    .find_one(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("subscription {id} not found")))?;
  Ok(Json(subscription))
}

// ─── Update status ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub status: SubscriptionStatus,
}

/// `PATCH /admin/subscriptions/{id}`
pub async fn update_status<S: Backend>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<UpdateBody>,
) -> Result<Json<Subscription>, ApiError> {
  let subscription = state.lifecycle.update_status(id, body.status).await?;
  Ok(Json(subscription))
}

// ─── Active for variant ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct VariantListParams {
  pub skip: Option<usize>,
  pub take: Option<usize>,
}

/// `GET /admin/variants/{id}/subscriptions`
pub async fn list_for_variant<S: Backend>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  Path(variant_id): Path<Uuid>,
  Query(params): Query<VariantListParams>,
) -> Result<Json<Page<Subscription>>, ApiError> {
  let options = PageOptions {
    skip: params.skip,
    take: params.take,
    sort: Some(Sort::FIFO),
    ..Default::default()
  };
  let page = state
    .lifecycle
    .find_active_for_variant(variant_id, &options)
    .await?;
  Ok(Json(page))
}

// ─── Host sync ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VariantBody {
  pub sku:   String,
  pub name:  String,
  pub stock: StockLevel,
}

/// `PUT /admin/variants/{id}`
///
/// Stores the variant and its current stock figures, then announces a stock
/// movement so waiting subscribers are considered.
pub async fn upsert_variant<S: Backend>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  ShopContext(ctx): ShopContext,
  Path(variant_id): Path<Uuid>,
  Json(body): Json<VariantBody>,
) -> Result<Json<Variant>, ApiError> {
  let variant = state
    .backend
    .upsert_variant(VariantRecord {
      variant_id,
      sku: body.sku,
      name: body.name,
      stock: body.stock,
    })
    .await
    .map_err(ApiError::store)?;

  announce(&state, &ctx, vec![variant_id]);
  Ok(Json(variant))
}

#[derive(Debug, Deserialize)]
pub struct MovementBody {
  pub variant_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct MovementAccepted {
  /// How many consumers received the movement; zero when nothing listens.
  pub receivers: usize,
}

/// `POST /admin/stock-movements`
pub async fn stock_movement<S: Backend>(
  _: Authenticated,
  State(state): State<AppState<S>>,
  ShopContext(ctx): ShopContext,
  Json(body): Json<MovementBody>,
) -> Result<impl IntoResponse, ApiError> {
  if body.variant_ids.is_empty() {
    return Err(ApiError::BadRequest("variant_ids must not be empty".into()));
  }
  let receivers = announce(&state, &ctx, body.variant_ids);
  Ok((StatusCode::ACCEPTED, Json(MovementAccepted { receivers })))
}

/// Publish a stock movement in the request's channel. With e-mail disabled
/// the reactor is not running and nothing receives it, which is fine.
fn announce<S>(state: &AppState<S>, ctx: &RequestContext, variant_ids: Vec<Uuid>) -> usize {
  let event = StockMovementEvent { channel: ctx.channel.clone(), variant_ids };
  match state.bus.stock_movements.publish(event) {
    Ok(receivers) => receivers,
    Err(e) => {
      tracing::debug!(error = %e, "stock movement not observed");
      0
    }
  }
}
