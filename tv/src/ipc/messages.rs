//! Frames exchanged with the extension's background shim

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coordinator::CoordEvent;
use crate::domain::{TabCommand, TabEvent, TabId, TabInfo};
use crate::protocol::MessageSender;

/// Browser -> host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostInbound {
    /// Tab lifecycle notification
    TabEvent { event: TabEvent },

    /// Runtime message to route
    Request {
        id: u64,
        #[serde(default)]
        sender: MessageSender,
        message: Value,
    },

    /// Answer to a `tabCommand`
    CommandResult {
        id: u64,
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        response: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },

    /// Answer to a `queryTabs`
    TabsResult { id: u64, tabs: Vec<TabInfo> },

    /// Stop the host
    Shutdown,
}

/// Host -> browser
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostOutbound {
    /// Response to a routed request
    Response { id: u64, body: Value },

    /// Deliver a command to a page
    #[serde(rename_all = "camelCase")]
    TabCommand { id: u64, tab_id: TabId, command: TabCommand },

    /// Ask for the live tab list
    QueryTabs { id: u64 },

    /// Popup notification
    Broadcast { event: CoordEvent },
}
