//! Registry of browser tabs reachable through the native-messaging channel.
//!
//! The host cannot enumerate browser tabs on its own; tabs become known when
//! a message arrives from them or the extension reports `TAB_UPDATED`, and
//! are forgotten on `TAB_REMOVED`. Notifications are queued on an outbound
//! channel that the host writes to the extension.

use std::collections::BTreeSet;

use async_trait::async_trait;
use mindhit_core::TabNotifier;
use mindhit_domain::{MindhitError, OutboundNotification, Result, TabId, TabNotification};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::trace;

pub struct TabRegistry {
    tabs: RwLock<BTreeSet<TabId>>,
    outbound: mpsc::Sender<OutboundNotification>,
}

impl TabRegistry {
    pub fn new(outbound: mpsc::Sender<OutboundNotification>) -> Self {
        Self { tabs: RwLock::new(BTreeSet::new()), outbound }
    }

    pub fn contains(&self, tab: TabId) -> bool {
        self.tabs.read().contains(&tab)
    }

    pub fn len(&self) -> usize {
        self.tabs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.read().is_empty()
    }
}

#[async_trait]
impl TabNotifier for TabRegistry {
    async fn open_tabs(&self) -> Result<Vec<TabId>> {
        Ok(self.tabs.read().iter().copied().collect())
    }

    async fn notify_tab(&self, tab: TabId, notification: TabNotification) -> Result<()> {
        if !self.contains(tab) {
            return Err(MindhitError::NotFound(format!("tab {tab} is not registered")));
        }

        self.outbound
            .send(OutboundNotification { tab_id: tab, notification })
            .await
            .map_err(|_| MindhitError::Internal("outbound notification channel closed".into()))?;

        trace!(tab_id = %tab, ?notification, "Notification queued");
        Ok(())
    }

    async fn register_tab(&self, tab: TabId) {
        if self.tabs.write().insert(tab) {
            trace!(tab_id = %tab, "Tab registered");
        }
    }

    async fn unregister_tab(&self, tab: TabId) {
        if self.tabs.write().remove(&tab) {
            trace!(tab_id = %tab, "Tab unregistered");
        }
    }
}
