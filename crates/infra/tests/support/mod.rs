//! Shared helpers for `mindhit-infra` integration tests.
//!
//! Spins up a real pipeline actor over an in-memory store, the real tab
//! registry and a scripted sink.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mindhit_core::{EventSink, KeyValueStore};
use mindhit_domain::constants::PENDING_EVENTS_PREFIX;
use mindhit_domain::{
    BrowsingEvent, ControlEnvelope, ControlMessage, DeliveryError, MessageResponse,
    OutboundNotification, RetryPayload, SessionId, SessionSnapshot, SessionStats,
};
use mindhit_infra::{
    EventPipeline, MemoryKeyValueStore, PipelineConfig, PipelineDeps, PipelineHandle, TabRegistry,
};
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::JoinHandle;

pub const ORIGIN: &str = "chrome-extension://mindhit-test";

/// `EventSink` with scripted outcomes and an optional gate that holds
/// deliveries in flight until released.
pub struct ScriptedSink {
    script: Mutex<VecDeque<Result<(), DeliveryError>>>,
    calls: Mutex<Vec<(SessionId, Vec<BrowsingEvent>)>>,
    gated: AtomicBool,
    gate: Semaphore,
    panics: AtomicUsize,
}

impl ScriptedSink {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            gated: AtomicBool::new(false),
            gate: Semaphore::new(0),
            panics: AtomicUsize::new(0),
        }
    }

    pub async fn fail_times(&self, times: usize) {
        let mut script = self.script.lock().await;
        for _ in 0..times {
            script.push_back(Err(DeliveryError::Network("connection refused".to_string())));
        }
    }

    /// Panic inside the next `times` deliveries, after recording the call.
    pub fn panic_times(&self, times: usize) {
        self.panics.store(times, Ordering::SeqCst);
    }

    /// Hold every delivery until [`ScriptedSink::release`] is called.
    pub fn hold(&self) {
        self.gated.store(true, Ordering::SeqCst);
    }

    pub fn release(&self, deliveries: usize) {
        self.gate.add_permits(deliveries);
    }

    pub async fn calls(&self) -> Vec<(SessionId, Vec<BrowsingEvent>)> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
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
        let panicking = self
            .panics
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if panicking {
            panic!("scripted sink failure");
        }
        if self.gated.load(Ordering::SeqCst) {
            if let Ok(permit) = self.gate.acquire().await {
                permit.forget();
            }
        }
        self.script.lock().await.pop_front().unwrap_or(Ok(()))
    }
}

pub struct Harness {
    pub handle: PipelineHandle,
    pub join: JoinHandle<()>,
    pub sink: Arc<ScriptedSink>,
    pub store: Arc<MemoryKeyValueStore>,
    pub tabs: Arc<TabRegistry>,
    pub outbound: mpsc::Receiver<OutboundNotification>,
}

pub fn config(batch_size: usize, max_retry: u32, flush_interval: Duration) -> PipelineConfig {
    PipelineConfig {
        batch_size,
        max_retry,
        flush_interval,
        join_timeout: Duration::from_secs(5),
        allowed_origins: vec![ORIGIN.to_string()],
        command_buffer: 64,
    }
}

pub fn spawn(config: PipelineConfig) -> Harness {
    spawn_with(config, Arc::new(ScriptedSink::new()), Arc::new(MemoryKeyValueStore::new()))
}

pub fn spawn_with(
    config: PipelineConfig,
    sink: Arc<ScriptedSink>,
    store: Arc<MemoryKeyValueStore>,
) -> Harness {
    let (outbound_tx, outbound) = mpsc::channel(64);
    let tabs = Arc::new(TabRegistry::new(outbound_tx));

    let (handle, join) = EventPipeline::spawn(
        PipelineDeps { sink: sink.clone(), store: store.clone(), notifier: tabs.clone() },
        config,
    );

    Harness { handle, join, sink, store, tabs, outbound }
}

impl Harness {
    pub async fn send(&self, message: ControlMessage) -> MessageResponse {
        self.handle.send(message).await.expect("pipeline running")
    }

    pub async fn start(&self, session_id: &str) {
        self.send(ControlMessage::SessionStarted { session_id: session_id.to_string() }).await;
    }

    pub async fn push_events(&self, events: &[BrowsingEvent]) {
        for event in events {
            self.send(ControlMessage::Event { event: event.clone() }).await;
        }
    }

    pub async fn state(&self) -> SessionSnapshot {
        match self.send(ControlMessage::GetState).await {
            MessageResponse::State(snapshot) => snapshot,
            other => panic!("unexpected GET_STATE response {other:?}"),
        }
    }

    pub async fn stats(&self) -> SessionStats {
        match self.send(ControlMessage::GetStats).await {
            MessageResponse::Stats(stats) => stats,
            other => panic!("unexpected GET_STATS response {other:?}"),
        }
    }

    pub async fn dispatch(&self, envelope: ControlEnvelope) -> Option<MessageResponse> {
        self.handle.dispatch(envelope).await.expect("pipeline running")
    }

    /// Wait until no delivery is in flight and no replay is running.
    pub async fn settle(&self) {
        eventually("pipeline to settle", || async {
            let stats = self.stats().await;
            stats.deliveries_in_flight == 0 && !stats.replay_in_progress
        })
        .await;
        // Let persist tasks spawned by the last outcome finish
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    pub async fn durable_records(&self) -> Vec<RetryPayload> {
        durable_records(self.store.as_ref()).await
    }

    pub fn drain_outbound(&mut self) -> Vec<OutboundNotification> {
        let mut sent = Vec::new();
        while let Ok(notification) = self.outbound.try_recv() {
            sent.push(notification);
        }
        sent
    }

    pub async fn shutdown(self) {
        self.handle.shutdown().await.expect("shutdown acknowledged");
        self.join.await.expect("actor exits cleanly");
    }
}

pub async fn durable_records(store: &dyn KeyValueStore) -> Vec<RetryPayload> {
    let mut records = Vec::new();
    for key in store.list(PENDING_EVENTS_PREFIX).await.expect("list keys") {
        if let Some(value) = store.get(&key).await.expect("read record") {
            records.push(serde_json::from_value(value).expect("decodable record"));
        }
    }
    records
}

/// Poll `check` until it holds, failing the test after a bounded number of
/// attempts.
pub async fn eventually<F, Fut>(what: &str, mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..400 {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

pub fn session(raw: &str) -> SessionId {
    SessionId::new(raw).expect("test session id")
}

pub fn scroll_events(count: i64) -> Vec<BrowsingEvent> {
    (1..=count).map(|n| BrowsingEvent::scroll(n, "https://example.com", 0.1)).collect()
}
