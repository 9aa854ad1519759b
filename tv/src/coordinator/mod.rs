//! Coordinator - the single owner of volume state
//!
//! Runs as one task fed through a channel:
//! - runtime messages are routed to exactly one response
//! - tab lifecycle notifications are reconciled against the state cache
//! - undelivered page commands are retried by a periodic sweep
//!
//! Popup notifications go out on a broadcast channel.

mod config;
mod core;
mod delivery;
mod handle;
mod messages;
mod reconcile;
mod router;

pub use config::CoordinatorConfig;
pub use core::Coordinator;
pub use handle::CoordinatorHandle;
pub use messages::{CoordEvent, CoordRequest, CoordinatorError, CoordinatorMetrics};
