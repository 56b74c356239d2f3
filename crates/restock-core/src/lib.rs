//! Core types and trait definitions for the back-in-stock notifier.
//!
//! No HTTP or database dependencies. Every other crate in the workspace
//! depends on this one.

// Trait futures spell out their `Send` bounds explicitly.
#![allow(async_fn_in_trait)]

pub mod config;
pub mod error;
pub mod event;
pub mod host;
pub mod store;
pub mod subscription;

pub use config::NotifierConfig;
pub use error::{Error, Result};
