//! Handlers for `/shop` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/shop/sessions` | Body: `{"email":"a@x.com"}` or `{}` for a guest |
//! | `POST` | `/shop/subscriptions` | Body: `{"variant_id":"…","email":"…"}`; e-mail defaults to the session customer's |
//! | `GET`  | `/shop/subscriptions/active` | `?variant_id=…[&email=…]`; `null` when none |

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use restock_core::{host::IdentityProvider, subscription::Subscription};
use restock_notify::CreateResult;
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, Backend, context::ShopContext, error::ApiError};

// ─── Sessions ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct SessionBody {
  pub email: Option<String>,
}

/// `POST /shop/sessions`
pub async fn open_session<S: Backend>(
  State(state): State<AppState<S>>,
  Json(body): Json<SessionBody>,
) -> Result<impl IntoResponse, ApiError> {
  let email = body
    .email
    .map(|e| e.trim().to_owned())
    .filter(|e| !e.is_empty());
  let session = state
    .backend
    .open_session(email)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(session)))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub variant_id: Uuid,
  pub email:      Option<String>,
}

/// `POST /shop/subscriptions`
pub async fn create<S: Backend>(
  State(state): State<AppState<S>>,
  ShopContext(ctx): ShopContext,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError> {
  match state
    .lifecycle
    .create(&ctx, body.email.as_deref(), body.variant_id)
    .await?
  {
    CreateResult::Created(subscription) => Ok((StatusCode::CREATED, Json(subscription))),
    CreateResult::Rejected(rejection) => Err(ApiError::Rejected(rejection)),
  }
}

// ─── Find active ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ActiveParams {
  pub variant_id: Uuid,
  pub email:      Option<String>,
}

/// `GET /shop/subscriptions/active?variant_id=…[&email=…]`
pub async fn find_active<S: Backend>(
  State(state): State<AppState<S>>,
  ShopContext(ctx): ShopContext,
  Query(params): Query<ActiveParams>,
) -> Result<Json<Option<Subscription>>, ApiError> {
  let email = params
    .email
    .or_else(|| ctx.customer().map(|c| c.email_address.clone()))
    .ok_or_else(|| ApiError::BadRequest("email is required without a customer session".into()))?;

  let found = state
    .lifecycle
    .find_active_for_variant_and_email(&ctx, params.variant_id, &email)
    .await?;
  Ok(Json(found))
}
