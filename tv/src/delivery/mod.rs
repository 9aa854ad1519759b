//! Outbound page commands: the port abstraction and the retry queue

mod config;
mod memory;
mod port;
mod queue;

pub use config::DeliveryConfig;
pub use memory::MemoryTabPort;
pub use port::{DeliveryError, TabPort};
pub use queue::{DeliveryQueue, EnqueueOutcome, QueueEntry, QueuePolicy, SweepBatch};
