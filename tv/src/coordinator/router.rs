//! Request routing: one response per authorized runtime message

use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::validate::is_valid_tab_id;
use crate::domain::{RecordDraft, TabCommand, TabId, TabPhase, VolumeUpdate};
use crate::protocol::{AudibleTab, MessageSender, Request, RequestError, Response, check_tab_id, volume_update};

use super::core::Coordinator;
use super::messages::CoordEvent;

impl Coordinator {
    /// Route one message; `None` for senders that get no answer
    pub(super) async fn handle_message(&mut self, sender: MessageSender, message: Value) -> Option<Response> {
        if !self.config.accepts(sender.id.as_deref()) {
            warn!(sender_id = ?sender.id, "Dropping message from unauthorized sender");
            self.metrics.requests_dropped += 1;
            return None;
        }

        let result = match Request::parse(&message) {
            Ok(request) => {
                debug!(action = request.action(), "Coordinator::handle_message: routing");
                self.route(&sender, request).await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(response) => {
                self.metrics.requests_handled += 1;
                Some(response)
            }
            Err(e) => {
                debug!(error = %e, "Coordinator::handle_message: request rejected");
                self.metrics.requests_rejected += 1;
                Some(Response::from(e))
            }
        }
    }

    async fn route(&mut self, sender: &MessageSender, request: Request) -> Result<Response, RequestError> {
        match request {
            Request::ContentScriptReady => {
                let tab_id = sender.tab_id()?;
                self.flush_destination(tab_id).await;
                Ok(Response::ok())
            }

            Request::GetAudibleTabs => self.audible_tabs().await,

            Request::UpdateTabVolume {
                tab_id,
                volume,
                muted,
                previous_volume,
            } => {
                let tab_id = check_tab_id(tab_id)?;
                let update = volume_update(volume, muted, previous_volume)?;
                self.update_volume(tab_id, update).await;
                Ok(Response::ok())
            }

            Request::GetAudioStatus => {
                let tab_id = sender.tab_id()?;
                let address = self.address_for(tab_id, sender.tab_url());
                let record = self.cache.get(tab_id, address.as_deref());
                Ok(Response::audio_status(&record))
            }

            Request::UpdateTabStatus { has_audio } => {
                let tab_id = sender.tab_id()?;
                self.apply_draft(tab_id, &RecordDraft::has_audio(has_audio), sender.tab_url());
                Ok(Response::ok())
            }

            Request::TogglePlayback { tab_id } => {
                let tab_id = check_tab_id(tab_id)?;
                self.toggle_playback(tab_id).await
            }

            Request::GetTabVolume { tab_id } => {
                let tab_id = check_tab_id(tab_id)?;
                let address = self.address_for(tab_id, None);
                let record = self.cache.get(tab_id, address.as_deref());
                Ok(Response::Record { success: true, record })
            }

            Request::ResetTabVolume { tab_id } => {
                let tab_id = check_tab_id(tab_id)?;
                self.reset_volume(tab_id).await;
                Ok(Response::ok())
            }

            Request::UpdatePlaybackState { is_playing } => {
                let tab_id = sender.tab_id()?;
                self.apply_draft(tab_id, &RecordDraft::is_playing(is_playing), sender.tab_url());
                Ok(Response::ok())
            }
        }
    }

    /// Tracked address for a tab, else the one the caller saw
    fn address_for(&self, tab_id: TabId, fallback: Option<&str>) -> Option<String> {
        self.tabs
            .get(&tab_id)
            .and_then(|t| t.address.clone())
            .or_else(|| fallback.map(str::to_string))
    }

    fn apply_draft(&mut self, tab_id: TabId, draft: &RecordDraft, page_url: Option<&str>) {
        let address = self.address_for(tab_id, page_url);
        let record = self.cache.put(tab_id, draft, address.as_deref());
        self.emit(CoordEvent::RecordChanged { tab_id, record });
    }

    async fn audible_tabs(&mut self) -> Result<Response, RequestError> {
        let timeout = self.delivery.send_timeout();
        let live = match tokio::time::timeout(timeout, self.port.query_tabs()).await {
            Ok(result) => result?,
            Err(_) => return Err(crate::delivery::DeliveryError::Timeout(timeout).into()),
        };

        let mut tabs = Vec::new();
        for tab in live {
            if !is_valid_tab_id(tab.id) {
                continue;
            }
            let marked_audible = self.tabs.get(&tab.id).is_some_and(|t| t.phase == TabPhase::Audible);
            if !(self.cache.contains(tab.id) || marked_audible || tab.audible) {
                continue;
            }
            let address = self.address_for(tab.id, tab.url.as_deref());
            let record = self.cache.get(tab.id, address.as_deref());
            tabs.push(AudibleTab { tab, record });
        }

        debug!(count = tabs.len(), "Coordinator::audible_tabs: listing");
        Ok(Response::Tabs { tabs })
    }

    async fn update_volume(&mut self, tab_id: TabId, update: VolumeUpdate) {
        debug!(%tab_id, ?update, "Coordinator::update_volume: called");
        let address = self.address_for(tab_id, None);
        let mut record = self.cache.get(tab_id, address.as_deref());
        let command = record.apply_update(&update);
        if record.page_address.is_none() {
            record.page_address = address;
        }

        self.cache.store(tab_id, record.clone());
        self.emit(CoordEvent::RecordChanged { tab_id, record });
        self.send(tab_id, command).await;
    }

    async fn reset_volume(&mut self, tab_id: TabId) {
        debug!(%tab_id, "Coordinator::reset_volume: called");
        let address = self.address_for(tab_id, None);
        let mut record = self.cache.get(tab_id, address.as_deref());
        let command = record.reset();
        if record.page_address.is_none() {
            record.page_address = address;
        }

        self.cache.store(tab_id, record.clone());
        self.emit(CoordEvent::RecordChanged { tab_id, record });
        self.send(tab_id, command).await;
    }

    /// Play/pause goes out once; toggles are never retried
    async fn toggle_playback(&mut self, tab_id: TabId) -> Result<Response, RequestError> {
        debug!(%tab_id, "Coordinator::toggle_playback: called");
        let reply = self.send_once(tab_id, &TabCommand::PlayPauseAudio).await?;
        self.metrics.commands_delivered += 1;
        let is_playing = reply.is_playing.unwrap_or(false);

        // the tab may have closed while we waited
        if self.cache.contains(tab_id) {
            self.apply_draft(tab_id, &RecordDraft::is_playing(is_playing), None);
        }
        Ok(Response::Playback {
            success: reply.success,
            is_playing,
        })
    }
}
