//! SQLite backend for the back-in-stock notifier.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Besides subscriptions, the same file
//! holds the host-side variant and session tables used by a standalone
//! deployment.

mod encode;
mod host;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
