//! Builds the [`RequestContext`] a shop request runs in.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use restock_core::host::{IdentityProvider, RequestContext};

use crate::{AppState, Backend, error::ApiError};

/// Header naming the sales channel. Absent means the configured default.
pub const CHANNEL_HEADER: &str = "x-channel";

/// The channel and session of the current shop request.
///
/// An unknown bearer token is treated like no token at all: the request
/// proceeds anonymously and the session policy decides what it may do.
pub struct ShopContext(pub RequestContext);

fn bearer(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

fn channel<'a>(headers: &'a HeaderMap, default: &'a str) -> &'a str {
  headers
    .get(CHANNEL_HEADER)
    .and_then(|v| v.to_str().ok())
    .map(str::trim)
    .filter(|c| !c.is_empty())
    .unwrap_or(default)
}

impl<S: Backend> FromRequestParts<AppState<S>> for ShopContext {
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let mut ctx = RequestContext::new(channel(&parts.headers, &state.default_channel));

    if let Some(token) = bearer(&parts.headers) {
      match state.backend.resolve_session(token).await.map_err(ApiError::store)? {
        Some(session) => ctx = ctx.with_session(session),
        None => tracing::debug!("unknown session token; continuing anonymously"),
      }
    }
    Ok(ShopContext(ctx))
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  #[test]
  fn channel_falls_back_to_default() {
    let mut headers = HeaderMap::new();
    assert_eq!(channel(&headers, "default"), "default");

    headers.insert(CHANNEL_HEADER, HeaderValue::from_static("eu"));
    assert_eq!(channel(&headers, "default"), "eu");

    headers.insert(CHANNEL_HEADER, HeaderValue::from_static("  "));
    assert_eq!(channel(&headers, "default"), "default");
  }

  #[test]
  fn bearer_token_is_extracted() {
    let mut headers = HeaderMap::new();
    assert_eq!(bearer(&headers), None);

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
    assert_eq!(bearer(&headers), None);

    headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc123"));
    assert_eq!(bearer(&headers), Some("abc123"));
  }
}
