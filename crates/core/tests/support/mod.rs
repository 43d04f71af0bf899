//! Shared test helpers for `mindhit-core` integration tests.
//!
//! Lightweight in-memory mocks for the core ports so tests can focus on
//! behaviour instead of wiring.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use mindhit_core::{EventSink, KeyValueStore, TabNotifier};
use mindhit_domain::{
    BrowsingEvent, DeliveryError, MindhitError, Result as DomainResult, SessionId, TabId,
    TabNotification,
};
use serde_json::Value;
use tokio::sync::Mutex;

/// In-memory `KeyValueStore` that can be told to fail writes.
#[derive(Default)]
pub struct MockStore {
    entries: Mutex<BTreeMap<String, Value>>,
    fail_writes: AtomicBool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn insert_raw(&self, key: &str, value: Value) {
        self.entries.lock().await.insert(key.to_string(), value);
    }

    pub async fn keys(&self) -> Vec<String> {
        self.entries.lock().await.keys().cloned().collect()
    }

    pub async fn value(&self, key: &str) -> Option<Value> {
        self.entries.lock().await.get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MockStore {
    async fn get(&self, key: &str) -> DomainResult<Option<Value>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> DomainResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MindhitError::Storage("disk full".to_string()));
        }
        self.entries.lock().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> DomainResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> DomainResult<Vec<String>> {
        Ok(self
            .entries
            .lock()
            .await
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// `EventSink` that replays scripted outcomes and records every call.
///
/// Once the script is exhausted every delivery succeeds.
#[derive(Default)]
pub struct ScriptedSink {
    script: Mutex<VecDeque<Result<(), DeliveryError>>>,
    calls: Mutex<Vec<(SessionId, Vec<BrowsingEvent>)>>,
}

impl ScriptedSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_outcome(&self, outcome: Result<(), DeliveryError>) {
        self.script.lock().await.push_back(outcome);
    }

    pub async fn fail_times(&self, times: usize) {
        let mut script = self.script.lock().await;
        for _ in 0..times {
            script.push_back(Err(DeliveryError::Network("connection refused".to_string())));
        }
    }

    pub async fn calls(&self) -> Vec<(SessionId, Vec<BrowsingEvent>)> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl EventSink for ScriptedSink {
    async fn deliver(
        &self,
        session_id: &SessionId,
        events: &[BrowsingEvent],
    ) -> Result<(), DeliveryError> {
        self.calls.lock().await.push((session_id.clone(), events.to_vec()));
        self.script.lock().await.pop_front().unwrap_or(Ok(()))
    }
}

/// `TabNotifier` with a fixed set of tabs, some of which reject messages.
#[derive(Default)]
pub struct MockTabs {
    tabs: Mutex<Vec<TabId>>,
    unreachable: HashSet<TabId>,
    sent: Mutex<Vec<(TabId, TabNotification)>>,
}

impl MockTabs {
    pub fn new(tabs: &[i64], unreachable: &[i64]) -> Self {
        Self {
            tabs: Mutex::new(tabs.iter().copied().map(TabId).collect()),
            unreachable: unreachable.iter().copied().map(TabId).collect(),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub async fn sent(&self) -> Vec<(TabId, TabNotification)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl TabNotifier for MockTabs {
    async fn open_tabs(&self) -> DomainResult<Vec<TabId>> {
        Ok(self.tabs.lock().await.clone())
    }

    async fn notify_tab(&self, tab: TabId, notification: TabNotification) -> DomainResult<()> {
        if self.unreachable.contains(&tab) {
            return Err(MindhitError::NotFound(format!("no content script in tab {tab}")));
        }
        self.sent.lock().await.push((tab, notification));
        Ok(())
    }

    async fn register_tab(&self, tab: TabId) {
        let mut tabs = self.tabs.lock().await;
        if !tabs.contains(&tab) {
            tabs.push(tab);
        }
    }

    async fn unregister_tab(&self, tab: TabId) {
        self.tabs.lock().await.retain(|t| *t != tab);
    }
}

pub fn session(raw: &str) -> SessionId {
    SessionId::new(raw).expect("test session id")
}

pub fn scroll_events(count: i64) -> Vec<BrowsingEvent> {
    (1..=count).map(|n| BrowsingEvent::scroll(n, "https://example.com", 0.1)).collect()
}
