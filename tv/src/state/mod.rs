//! Volume state: the in-memory cache and its write-behind persister

mod cache;
mod persist;

pub use cache::{HydrateSummary, StateCache};
pub use persist::Persister;
