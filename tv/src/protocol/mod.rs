//! Runtime message protocol between extension contexts and the coordinator

mod request;
mod response;

pub use request::{ACTIONS, MessageSender, Request, RequestError, check_tab_id, volume_update};
pub use response::{AudibleTab, Response};
