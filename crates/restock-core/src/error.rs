//! Error types for `restock-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A persisted status string is not one of the three known states.
  #[error("unknown subscription status: {0:?}")]
  UnknownStatus(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
