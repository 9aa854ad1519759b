//! Native messaging host: the coordinator's link to the browser
//!
//! The extension's background shim forwards tab events and runtime messages
//! over stdio and relays the page commands the coordinator emits. Outbound
//! calls are correlated by id and resolved by the matching result frame.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::coordinator::CoordinatorHandle;
use crate::delivery::{DeliveryError, TabPort};
use crate::domain::{CommandReply, TabCommand, TabId, TabInfo};

use super::framing::{BridgeError, MAX_INBOUND_FRAME_BYTES, read_frame_within, write_frame};
use super::messages::{HostInbound, HostOutbound};

/// Error text the browser reports when no content script listens in a tab
const NO_RECEIVER_MARKERS: &[&str] = &["Receiving end does not exist", "Could not establish connection"];

type CommandSlot = (TabId, oneshot::Sender<Result<CommandReply, DeliveryError>>);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// [`TabPort`] over the stdio pipe
#[derive(Debug)]
pub struct BridgePort {
    out_tx: Mutex<Option<mpsc::UnboundedSender<HostOutbound>>>,
    next_id: AtomicU64,
    commands: Mutex<HashMap<u64, CommandSlot>>,
    tab_queries: Mutex<HashMap<u64, oneshot::Sender<Vec<TabInfo>>>>,
}

/// Removes a pending call when its future is dropped (timeout or cancel)
struct PendingGuard<'a> {
    port: &'a BridgePort,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        lock(&self.port.commands).remove(&self.id);
        lock(&self.port.tab_queries).remove(&self.id);
    }
}

impl BridgePort {
    /// Create the port and the receiver of frames it wants written
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<HostOutbound>) {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let port = Arc::new(Self {
            out_tx: Mutex::new(Some(out_tx)),
            next_id: AtomicU64::new(1),
            commands: Mutex::new(HashMap::new()),
            tab_queries: Mutex::new(HashMap::new()),
        });
        (port, out_rx)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Queue a frame for the writer; false once the port is closed
    pub fn emit(&self, frame: HostOutbound) -> bool {
        match lock(&self.out_tx).as_ref() {
            Some(tx) => tx.send(frame).is_ok(),
            None => false,
        }
    }

    /// Resolve a `tabCommand` from its `commandResult`
    pub fn resolve_command(&self, id: u64, ok: bool, response: Option<Value>, error: Option<String>) {
        let Some((tab_id, slot)) = lock(&self.commands).remove(&id) else {
            debug!(id, "BridgePort::resolve_command: no pending call");
            return;
        };

        let result = if ok {
            Ok(response
                .and_then(|v| serde_json::from_value::<CommandReply>(v).ok())
                .unwrap_or_else(CommandReply::ok))
        } else {
            let error = error.unwrap_or_else(|| "unknown error".to_string());
            if NO_RECEIVER_MARKERS.iter().any(|m| error.contains(m)) {
                Err(DeliveryError::NoReceiver(tab_id))
            } else {
                Err(DeliveryError::Channel(error))
            }
        };
        let _ = slot.send(result);
    }

    /// Resolve a `queryTabs` from its `tabsResult`
    pub fn resolve_tabs(&self, id: u64, tabs: Vec<TabInfo>) {
        match lock(&self.tab_queries).remove(&id) {
            Some(slot) => {
                let _ = slot.send(tabs);
            }
            None => debug!(id, "BridgePort::resolve_tabs: no pending call"),
        }
    }

    /// Stop emitting and fail every pending call
    pub fn close(&self) {
        debug!("BridgePort::close: called");
        lock(&self.out_tx).take();
        lock(&self.commands).clear();
        lock(&self.tab_queries).clear();
    }

    /// Number of calls awaiting a result frame
    pub fn pending_calls(&self) -> usize {
        lock(&self.commands).len() + lock(&self.tab_queries).len()
    }
}

#[async_trait]
impl TabPort for BridgePort {
    async fn send_command(&self, tab_id: TabId, command: &TabCommand) -> Result<CommandReply, DeliveryError> {
        let id = self.next_id();
        debug!(id, %tab_id, action = command.action(), "BridgePort::send_command: called");
        let (tx, rx) = oneshot::channel();
        lock(&self.commands).insert(id, (tab_id, tx));
        let _guard = PendingGuard { port: self, id };

        let frame = HostOutbound::TabCommand {
            id,
            tab_id,
            command: command.clone(),
        };
        if !self.emit(frame) {
            return Err(DeliveryError::Disconnected);
        }
        rx.await.unwrap_or(Err(DeliveryError::Disconnected))
    }

    async fn query_tabs(&self) -> Result<Vec<TabInfo>, DeliveryError> {
        let id = self.next_id();
        debug!(id, "BridgePort::query_tabs: called");
        let (tx, rx) = oneshot::channel();
        lock(&self.tab_queries).insert(id, tx);
        let _guard = PendingGuard { port: self, id };

        if !self.emit(HostOutbound::QueryTabs { id }) {
            return Err(DeliveryError::Disconnected);
        }
        rx.await.map_err(|_| DeliveryError::Disconnected)
    }
}

/// Pumps frames between the browser pipe and the coordinator
pub struct NativeHost {
    handle: CoordinatorHandle,
    port: Arc<BridgePort>,
    out_rx: mpsc::UnboundedReceiver<HostOutbound>,
    inbound_limit: usize,
}

impl NativeHost {
    /// Create a host over a coordinator that was built with `port`
    pub fn new(handle: CoordinatorHandle, port: Arc<BridgePort>, out_rx: mpsc::UnboundedReceiver<HostOutbound>) -> Self {
        Self {
            handle,
            port,
            out_rx,
            inbound_limit: MAX_INBOUND_FRAME_BYTES,
        }
    }

    /// Cap inbound frames below the browser's own limit
    pub fn with_inbound_limit(mut self, max_bytes: usize) -> Self {
        self.inbound_limit = max_bytes;
        self
    }

    /// Run until the browser closes the pipe or sends `shutdown`
    ///
    /// The coordinator is asked to stop on the way out.
    pub async fn run<R, W>(self, mut reader: R, mut writer: W) -> Result<(), BridgeError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let Self {
            handle,
            port,
            mut out_rx,
            inbound_limit,
        } = self;
        info!("Native host started");

        let writer_task = tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                if let Err(e) = write_frame(&mut writer, &frame).await {
                    warn!(error = %e, "Failed to write frame to browser");
                    break;
                }
            }
            debug!("NativeHost: writer stopped");
        });

        let forwarder = tokio::spawn(forward_events(handle.subscribe(), port.clone()));

        let result = read_loop(&mut reader, inbound_limit, &handle, &port).await;

        forwarder.abort();
        if let Err(e) = handle.shutdown().await {
            debug!(error = %e, "NativeHost: coordinator already stopped");
        }
        port.close();
        let _ = writer_task.await;

        info!("Native host stopped");
        result
    }
}

async fn read_loop<R>(
    reader: &mut R,
    inbound_limit: usize,
    handle: &CoordinatorHandle,
    port: &Arc<BridgePort>,
) -> Result<(), BridgeError>
where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = match read_frame_within::<_, HostInbound>(reader, inbound_limit).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                info!("Browser closed the pipe");
                return Ok(());
            }
            Err(BridgeError::Json(e)) => {
                warn!(error = %e, "Skipping undecodable frame");
                continue;
            }
            Err(e @ BridgeError::FrameTooLarge { .. }) => {
                warn!(error = %e, "Skipping oversized frame");
                continue;
            }
            Err(e) => return Err(e),
        };

        match frame {
            HostInbound::TabEvent { event } => {
                handle.tab_event(event).await.map_err(|_| BridgeError::CoordinatorGone)?;
            }

            HostInbound::Request { id, sender, message } => {
                let reply_rx = handle
                    .submit(sender, message)
                    .await
                    .map_err(|_| BridgeError::CoordinatorGone)?;
                let port = port.clone();
                tokio::spawn(async move {
                    match reply_rx.await {
                        Ok(Some(body)) => {
                            port.emit(HostOutbound::Response { id, body });
                        }
                        Ok(None) => debug!(id, "read_loop: request dropped without response"),
                        Err(_) => debug!(id, "read_loop: coordinator stopped before responding"),
                    }
                });
            }

            HostInbound::CommandResult {
                id,
                ok,
                response,
                error,
            } => port.resolve_command(id, ok, response, error),

            HostInbound::TabsResult { id, tabs } => port.resolve_tabs(id, tabs),

            HostInbound::Shutdown => {
                info!("Browser requested shutdown");
                return Ok(());
            }
        }
    }
}

async fn forward_events(mut events: broadcast::Receiver<crate::coordinator::CoordEvent>, port: Arc<BridgePort>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                if !port.emit(HostOutbound::Broadcast { event }) {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Popup notifications lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
