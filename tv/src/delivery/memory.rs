//! In-process TabPort with scriptable reachability

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::{CommandReply, TabCommand, TabId, TabInfo};

use super::port::{DeliveryError, TabPort};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fake browser: a tab list plus per-tab controller behavior
///
/// Tabs start unreachable (no page controller loaded). A silent tab accepts
/// the message but never answers.
#[derive(Debug, Default)]
pub struct MemoryTabPort {
    tabs: Mutex<Vec<TabInfo>>,
    reachable: Mutex<HashSet<TabId>>,
    silent: Mutex<HashSet<TabId>>,
    playing: Mutex<HashMap<TabId, bool>>,
    attempts: Mutex<Vec<(TabId, TabCommand)>>,
    delivered: Mutex<Vec<(TabId, TabCommand)>>,
    disconnected: AtomicBool,
}

impl MemoryTabPort {
    /// Create a port with no tabs
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a live tab
    pub fn upsert_tab(&self, tab: TabInfo) {
        let mut tabs = lock(&self.tabs);
        tabs.retain(|t| t.id != tab.id);
        tabs.push(tab);
    }

    /// Mark whether the tab's page controller is loaded
    pub fn set_reachable(&self, tab_id: TabId, reachable: bool) {
        debug!(%tab_id, reachable, "MemoryTabPort::set_reachable: called");
        let mut set = lock(&self.reachable);
        if reachable {
            set.insert(tab_id);
        } else {
            set.remove(&tab_id);
        }
    }

    /// Make the tab swallow messages without answering
    pub fn set_silent(&self, tab_id: TabId, silent: bool) {
        let mut set = lock(&self.silent);
        if silent {
            set.insert(tab_id);
        } else {
            set.remove(&tab_id);
        }
    }

    /// Fail every call as if the host went away
    pub fn set_disconnected(&self, disconnected: bool) {
        self.disconnected.store(disconnected, Ordering::SeqCst);
    }

    /// Every command that reached a page, in order
    pub fn delivered(&self) -> Vec<(TabId, TabCommand)> {
        lock(&self.delivered).clone()
    }

    /// Commands that reached one tab, in order
    pub fn delivered_to(&self, tab_id: TabId) -> Vec<TabCommand> {
        lock(&self.delivered)
            .iter()
            .filter(|(id, _)| *id == tab_id)
            .map(|(_, command)| command.clone())
            .collect()
    }

    /// Number of send attempts made to one tab, successful or not
    pub fn attempts_to(&self, tab_id: TabId) -> usize {
        lock(&self.attempts).iter().filter(|(id, _)| *id == tab_id).count()
    }

    /// Forget recorded attempts and deliveries
    pub fn clear_log(&self) {
        lock(&self.attempts).clear();
        lock(&self.delivered).clear();
    }
}

#[async_trait]
impl TabPort for MemoryTabPort {
    async fn send_command(&self, tab_id: TabId, command: &TabCommand) -> Result<CommandReply, DeliveryError> {
        debug!(%tab_id, action = command.action(), "MemoryTabPort::send_command: called");
        lock(&self.attempts).push((tab_id, command.clone()));

        if self.disconnected.load(Ordering::SeqCst) {
            return Err(DeliveryError::Disconnected);
        }
        if lock(&self.silent).contains(&tab_id) {
            return std::future::pending().await;
        }
        if !lock(&self.reachable).contains(&tab_id) {
            return Err(DeliveryError::NoReceiver(tab_id));
        }

        lock(&self.delivered).push((tab_id, command.clone()));

        let reply = match command {
            TabCommand::SetVolume { volume } => CommandReply {
                success: true,
                volume: Some(f64::from(*volume)),
                ..Default::default()
            },
            TabCommand::ToggleMute { .. } => CommandReply::ok(),
            TabCommand::PlayPauseAudio => {
                let mut playing = lock(&self.playing);
                let now_playing = !playing.get(&tab_id).copied().unwrap_or(true);
                playing.insert(tab_id, now_playing);
                CommandReply {
                    success: true,
                    is_playing: Some(now_playing),
                    ..Default::default()
                }
            }
        };
        Ok(reply)
    }

    async fn query_tabs(&self) -> Result<Vec<TabInfo>, DeliveryError> {
        debug!("MemoryTabPort::query_tabs: called");
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(DeliveryError::Disconnected);
        }
        Ok(lock(&self.tabs).clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_unreachable_tab_reports_no_receiver() {
        let port = MemoryTabPort::new();
        let result = port.send_command(3, &TabCommand::SetVolume { volume: 50 }).await;
        assert_eq!(result, Err(DeliveryError::NoReceiver(3)));
        assert_eq!(port.attempts_to(3), 1);
        assert!(port.delivered().is_empty());
    }

    #[tokio::test]
    async fn test_play_pause_toggles() {
        let port = MemoryTabPort::new();
        port.set_reachable(1, true);

        let first = port.send_command(1, &TabCommand::PlayPauseAudio).await.unwrap();
        let second = port.send_command(1, &TabCommand::PlayPauseAudio).await.unwrap();
        assert_eq!(first.is_playing, Some(false));
        assert_eq!(second.is_playing, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_tab_never_answers() {
        let port = MemoryTabPort::new();
        port.set_reachable(1, true);
        port.set_silent(1, true);

        let result = tokio::time::timeout(Duration::from_secs(5), port.send_command(1, &TabCommand::PlayPauseAudio)).await;
        assert!(result.is_err());
    }
}
