//! Back-in-stock workflow: subscription lifecycle, the stock-event reactor,
//! and the notification emitter, wired together over an in-process event bus.
//!
//! # Wiring
//!
//! ```rust,ignore
//! let bus       = EventBus::default();
//! let lifecycle = Arc::new(LifecycleService::new(store.clone(), store, bus.back_in_stock.clone(), config));
//! Reactor::new(lifecycle.clone()).start(&bus);
//! ```

pub mod bus;
pub mod emitter;
pub mod error;
pub mod lifecycle;
pub mod reactor;

pub use bus::{EventBus, Topic};
pub use error::{Error, Result};
pub use lifecycle::{CreateResult, ErrorCode, ErrorResult, LifecycleService};
pub use reactor::{Reactor, ReactorReport};
