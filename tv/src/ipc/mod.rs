//! Native messaging bridge between the browser and the coordinator
//!
//! - [`framing`] - length-prefixed JSON frames on stdio
//! - [`messages`] - the frame types
//! - [`bridge`] - the [`BridgePort`] tab port and the [`NativeHost`] pump

pub mod bridge;
pub mod framing;
pub mod messages;

pub use bridge::{BridgePort, NativeHost};
pub use framing::{BridgeError, MAX_FRAME_BYTES, MAX_INBOUND_FRAME_BYTES, read_frame, read_frame_within, write_frame};
pub use messages::{HostInbound, HostOutbound};
