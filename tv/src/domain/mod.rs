//! Domain types for the volume coordinator
//!
//! - [`VolumeRecord`] - the only persisted entity
//! - [`TabCommand`] - commands delivered to a page's audio controller
//! - [`TabEvent`] - tab lifecycle notifications from the browser
//! - [`validate`] - predicates gating every value that crosses the process boundary

mod command;
mod record;
mod tab;
pub mod validate;

pub use command::{CommandReply, TabCommand};
pub use record::{DEFAULT_VOLUME, RecordDraft, VolumeRecord, VolumeUpdate};
pub use tab::{LoadStatus, TabEvent, TabId, TabInfo, TabPhase};
