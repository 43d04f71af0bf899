//! Port interfaces for tab messaging

use async_trait::async_trait;
use mindhit_domain::{Result, TabId, TabNotification};

/// Messaging channel to the content scripts of open browser tabs.
#[async_trait]
pub trait TabNotifier: Send + Sync {
    /// Tabs currently known to be open
    async fn open_tabs(&self) -> Result<Vec<TabId>>;

    /// Send `notification` to the content script in `tab`
    async fn notify_tab(&self, tab: TabId, notification: TabNotification) -> Result<()>;

    /// Record that `tab` exists
    async fn register_tab(&self, tab: TabId);

    /// Forget `tab`
    async fn unregister_tab(&self, tab: TabId);
}
