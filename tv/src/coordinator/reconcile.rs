//! Tab lifecycle reconciliation
//!
//! Per-tab phases: unknown, audible, silent. A removed tab is forgotten.

use tracing::{debug, info};

use crate::domain::validate::{is_valid_tab_id, normalize_page_address};
use crate::domain::{RecordDraft, TabEvent, TabId, TabPhase};

use super::core::{Coordinator, TrackedTab};
use super::messages::{CoordEvent, CoordRequest};

impl Coordinator {
    pub(super) async fn handle_tab_event(&mut self, event: TabEvent) {
        debug!(tab_id = %event.tab_id(), kind = event.kind(), "Coordinator::handle_tab_event: called");
        if !is_valid_tab_id(event.tab_id()) {
            debug!(tab_id = %event.tab_id(), "Coordinator::handle_tab_event: ignoring invalid tab id");
            return;
        }
        self.metrics.events_handled += 1;

        match event {
            TabEvent::Created { tab } => {
                self.tab_created(tab.id, tab.url.as_deref());
                if tab.audible {
                    self.audio_started(tab.id);
                }
            }

            TabEvent::Updated {
                tab_id, url, audible, ..
            } => {
                if let Some(url) = url {
                    self.navigated(tab_id, &url).await;
                }
                match audible {
                    Some(true) => self.audio_started(tab_id),
                    Some(false) => self.audio_stopped(tab_id),
                    None => {}
                }
            }

            TabEvent::Removed { tab_id } => self.tab_removed(tab_id),

            TabEvent::Activated { tab_id } => {
                debug!(%tab_id, "Coordinator::handle_tab_event: tab activated");
            }
        }
    }

    /// A new tab lifetime; ids are reused across sessions
    ///
    /// The page's remembered record wins over anything held under the id.
    /// Without one, a leftover tab entry is dropped so the tab starts from
    /// defaults.
    fn tab_created(&mut self, tab_id: TabId, url: Option<&str>) {
        let address = url.and_then(normalize_page_address);
        self.tabs.insert(
            tab_id,
            TrackedTab {
                phase: TabPhase::default(),
                address: address.clone(),
            },
        );

        let adopted = address
            .as_deref()
            .and_then(|address| self.cache.adopt_address(tab_id, address));
        match adopted {
            Some(record) => {
                debug!(%tab_id, volume = record.volume, "Coordinator::tab_created: adopted page record");
                self.emit(CoordEvent::RecordChanged { tab_id, record });
            }
            None => {
                if self.cache.evict(tab_id).is_some() {
                    debug!(%tab_id, "Coordinator::tab_created: dropped leftover tab entry");
                }
            }
        }
    }

    /// unknown/silent -> audible
    fn audio_started(&mut self, tab_id: TabId) {
        let tracked = self.tabs.entry(tab_id).or_default();
        if tracked.phase == TabPhase::Audible {
            debug!(%tab_id, "Coordinator::audio_started: already audible");
            return;
        }
        tracked.phase = TabPhase::Audible;
        let address = tracked.address.clone();

        let record = self.cache.put(tab_id, &RecordDraft::has_audio(true), address.as_deref());
        info!(%tab_id, volume = record.volume, muted = record.muted, "Tab started playing audio");

        self.emit(CoordEvent::AudibleChanged { tab_id, audible: true });
        self.emit(CoordEvent::RecordChanged { tab_id, record });

        let delay = self.delivery.settle_delay();
        let tx = self.sender();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(CoordRequest::SettleElapsed { tab_id }).await;
        });
    }

    /// audible -> silent; the record is kept
    fn audio_stopped(&mut self, tab_id: TabId) {
        let tracked = self.tabs.entry(tab_id).or_default();
        let was_audible = tracked.phase == TabPhase::Audible;
        tracked.phase = TabPhase::Silent;
        if was_audible {
            debug!(%tab_id, "Coordinator::audio_stopped: tab went silent");
            self.emit(CoordEvent::AudibleChanged { tab_id, audible: false });
        }
    }

    /// Push the tab's current state once the page has had time to set up
    pub(super) async fn settle_elapsed(&mut self, tab_id: TabId) {
        if !self.tabs.contains_key(&tab_id) {
            debug!(%tab_id, "Coordinator::settle_elapsed: tab gone");
            return;
        }
        let Some(command) = self.cache.lookup(tab_id).map(|r| r.state_command()) else {
            return;
        };
        debug!(%tab_id, ?command, "Coordinator::settle_elapsed: delivering state");
        self.send(tab_id, command).await;
    }

    /// Address change while the tab stays open
    async fn navigated(&mut self, tab_id: TabId, url: &str) {
        let address = normalize_page_address(url);
        let tracked = self.tabs.entry(tab_id).or_default();
        if tracked.address == address {
            return;
        }
        tracked.address = address.clone();
        let audible = tracked.phase == TabPhase::Audible;

        let Some(address) = address else {
            debug!(%tab_id, "Coordinator::navigated: page address not tracked");
            return;
        };
        let Some(record) = self.cache.adopt_address(tab_id, &address) else {
            return;
        };

        info!(%tab_id, %address, volume = record.volume, "Adopted remembered volume for page");
        let command = record.state_command();
        self.emit(CoordEvent::RecordChanged { tab_id, record });
        if audible {
            self.send(tab_id, command).await;
        }
    }

    /// any -> removed
    fn tab_removed(&mut self, tab_id: TabId) {
        let was_tracked = self.tabs.remove(&tab_id).is_some();
        let evicted = self.cache.evict(tab_id).is_some();
        let discarded = self.queue.discard(tab_id);
        debug!(%tab_id, was_tracked, evicted, discarded, "Coordinator::tab_removed: called");
        self.emit(CoordEvent::TabRemoved { tab_id });
    }
}
