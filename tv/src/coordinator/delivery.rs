//! Outbound command delivery and the retry sweep

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::delivery::{DeliveryError, EnqueueOutcome, QueueEntry};
use crate::domain::{CommandReply, TabCommand, TabId};

use super::core::Coordinator;

impl Coordinator {
    /// One delivery attempt bounded by the send timeout
    pub(super) async fn send_once(&self, tab_id: TabId, command: &TabCommand) -> Result<CommandReply, DeliveryError> {
        let timeout = self.delivery.send_timeout();
        match tokio::time::timeout(timeout, self.port.send_command(tab_id, command)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(timeout)),
        }
    }

    /// Deliver now, or queue for retry when the page is not ready
    ///
    /// Failures never reach the caller. Only idempotent commands are queued.
    pub(super) async fn send(&mut self, tab_id: TabId, command: TabCommand) {
        debug!(%tab_id, ?command, "Coordinator::send: called");
        match self.send_once(tab_id, &command).await {
            Ok(_) => {
                debug!(%tab_id, action = command.action(), "Command delivered");
                self.metrics.commands_delivered += 1;
            }
            Err(e) if e.is_retryable() && command.is_idempotent() => {
                debug!(%tab_id, error = %e, "Coordinator::send: delivery failed, queueing");
                self.enqueue(QueueEntry::first_failure(tab_id, command, Instant::now()));
            }
            Err(e) => {
                warn!(%tab_id, action = command.action(), error = %e, "Dropping undeliverable command");
            }
        }
    }

    fn enqueue(&mut self, entry: QueueEntry) {
        let tab_id = entry.destination;
        match self.queue.enqueue(entry) {
            EnqueueOutcome::Queued { depth } => {
                debug!(%tab_id, depth, "Coordinator::enqueue: queued");
                self.metrics.commands_queued += 1;
            }
            EnqueueOutcome::DroppedFull => {
                warn!(%tab_id, max_pending = self.queue.policy().max_pending, "Delivery queue full, dropping command");
                self.metrics.dropped_queue_full += 1;
            }
        }
    }

    /// Periodic pass over every destination
    pub(super) async fn sweep(&mut self) {
        let destinations = self.queue.destinations();
        if destinations.is_empty() {
            return;
        }
        debug!(count = destinations.len(), "Coordinator::sweep: called");
        for tab_id in destinations {
            self.drain_destination(tab_id, false).await;
        }
    }

    /// Readiness flush: retry everything queued for one tab, young entries included
    pub(super) async fn flush_destination(&mut self, tab_id: TabId) {
        debug!(%tab_id, "Coordinator::flush_destination: called");
        self.drain_destination(tab_id, true).await;
    }

    /// Retry one destination's eligible entries, oldest first
    ///
    /// The first failure ends the pass for this destination: the failed entry
    /// is put back with its attempt count bumped, and the entries behind it go
    /// back untouched, so order is kept.
    async fn drain_destination(&mut self, tab_id: TabId, include_young: bool) {
        let batch = self.queue.take_due(tab_id, Instant::now(), include_young);
        if batch.expired > 0 || batch.exhausted > 0 {
            info!(
                %tab_id,
                expired = batch.expired,
                exhausted = batch.exhausted,
                "Discarded stale queued commands"
            );
        }
        self.metrics.dropped_expired += batch.expired as u64;
        self.metrics.dropped_exhausted += batch.exhausted as u64;

        let expiry = self.queue.policy().expiry;
        let mut due = batch.due.into_iter();
        while let Some(mut entry) = due.next() {
            if entry.age(Instant::now()) >= expiry {
                debug!(%tab_id, "Coordinator::drain_destination: entry expired mid-pass");
                self.metrics.dropped_expired += 1;
                continue;
            }

            self.metrics.retries_attempted += 1;
            match self.send_once(tab_id, &entry.command).await {
                Ok(_) => {
                    debug!(%tab_id, attempt = entry.attempt + 1, action = entry.command.action(), "Queued command delivered");
                    self.metrics.commands_delivered += 1;
                }
                Err(e) if e.is_retryable() => {
                    entry.attempt += 1;
                    debug!(%tab_id, attempt = entry.attempt, error = %e, "Coordinator::drain_destination: retry failed");
                    let mut remaining = vec![entry];
                    remaining.extend(due);
                    self.queue.restore(tab_id, remaining);
                    return;
                }
                Err(e) => {
                    let dropped = 1 + due.len() + self.queue.discard(tab_id);
                    warn!(%tab_id, dropped, error = %e, "Dropping queued commands");
                    return;
                }
            }
        }
    }
}
