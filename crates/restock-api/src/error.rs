//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body has the same shape as a rejected create:
//! `{"errorCode": "...", "message": "..."}`.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use restock_notify::{ErrorCode, ErrorResult};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// Admin credentials missing or wrong.
  #[error("unauthorized")]
  Unauthorized,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// An expected business outcome of `create`.
  #[error("{}", .0.message)]
  Rejected(ErrorResult),

  #[error(transparent)]
  Notify(#[from] restock_notify::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  /// HTTP status and stable error code.
  fn classify(&self) -> (StatusCode, &'static str) {
    use restock_notify::Error as N;
    match self {
      Self::Unauthorized => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
      Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
      Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
      Self::Rejected(r) => match r.error_code {
        ErrorCode::EmailRequired => (StatusCode::BAD_REQUEST, "EMAIL_REQUIRED_ERROR"),
        ErrorCode::AlreadySubscribed => {
          (StatusCode::CONFLICT, "BACK_IN_STOCK_ALREADY_SUBSCRIBED_ERROR")
        }
        ErrorCode::VariantNotFound => (StatusCode::NOT_FOUND, "VARIANT_NOT_FOUND_ERROR"),
      },
      Self::Notify(e) => match e {
        N::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
        N::SubscriptionNotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        N::EmailDisabled => (StatusCode::INTERNAL_SERVER_ERROR, "EMAIL_DISABLED"),
        N::TransitionInProgress(_) | N::StatusChanged { .. } => (StatusCode::CONFLICT, "CONFLICT"),
        N::Publish(_) => (StatusCode::SERVICE_UNAVAILABLE, "INTERNAL"),
        N::VariantNotFound(_) | N::InvalidStock(_) | N::Store(_) => {
          (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL")
        }
      },
      Self::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code) = self.classify();
    if status.is_server_error() {
      tracing::error!(error = %self, code, "request failed");
    }

    let body = Json(json!({ "errorCode": code, "message": self.to_string() }));
    let mut res = (status, body).into_response();
    if matches!(self, Self::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"restock\""),
      );
    }
    res
  }
}
