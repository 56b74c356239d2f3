//! Error type for `restock-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] restock_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A session row points at a customer that no longer exists.
  #[error("customer not found: {0}")]
  CustomerNotFound(uuid::Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
