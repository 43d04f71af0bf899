//! Broadcast of recording notifications to open tabs

use futures::future::join_all;
use mindhit_domain::TabNotification;
use tracing::{debug, warn};

use super::ports::TabNotifier;

/// Send `notification` to every open tab and return how many accepted it.
///
/// A tab without a content script simply has no observer, so per-tab
/// failures are only debug-logged.
pub async fn broadcast(notifier: &dyn TabNotifier, notification: TabNotification) -> usize {
    let tabs = match notifier.open_tabs().await {
        Ok(tabs) => tabs,
        Err(err) => {
            warn!(error = %err, "Failed to enumerate open tabs");
            return 0;
        }
    };

    let results =
        join_all(tabs.iter().map(|tab| notifier.notify_tab(*tab, notification))).await;

    let mut delivered = 0;
    for (tab, result) in tabs.iter().zip(results) {
        match result {
            Ok(()) => delivered += 1,
            Err(err) => debug!(tab_id = %tab, error = %err, "Tab did not accept notification"),
        }
    }

    debug!(?notification, tabs = tabs.len(), delivered, "Broadcast finished");
    delivered
}
