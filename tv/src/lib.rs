//! TabVolume - per-tab browser volume coordinator
//!
//! The background half of a browser extension that gives every tab its own
//! volume. Pages, the popup and the browser cannot call each other directly;
//! every interaction is an asynchronous message with no delivery guarantee.
//! The coordinator owns all volume state, reconciles tab lifecycle events
//! with it, and keeps retrying page commands until the page is ready.
//!
//! # Modules
//!
//! - [`domain`] - volume records, tab events, page commands, validators
//! - [`state`] - in-memory state cache with write-behind persistence
//! - [`delivery`] - tab port abstraction and the bounded retry queue
//! - [`protocol`] - inbound runtime messages and their responses
//! - [`coordinator`] - the single task that owns and mutates state
//! - [`ipc`] - native messaging bridge to the browser
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod delivery;
pub mod domain;
pub mod ipc;
pub mod protocol;
pub mod state;

pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorHandle};
pub use domain::{TabCommand, TabEvent, TabId, VolumeRecord};
