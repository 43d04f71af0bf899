//! The pipeline actor
//!
//! A single task owns the session tracker and the pending queue. Control
//! messages, timer ticks and connectivity signals arrive as commands on one
//! bounded channel; network and storage work runs in tasks tracked by a
//! `JoinSet` whose outcomes are folded back into the actor's state in the
//! same `select!` loop. The snapshot-then-clear step of a flush therefore
//! never races another mutation.
//!
//! Live deliveries are single-flight: a flush requested while a batch of the
//! live queue is in flight is deferred until that delivery settles. The
//! final flush of a stopping session and the shutdown flush bypass this and
//! run alongside.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mindhit_core::{
    broadcast, collect, CollectOutcome, DeliveryEngine, EventQueue, FailureOutcome, FlushTrigger,
    ReplayReport, SessionTracker, StoredCredentials, TabNotifier, TimerAction, Transition,
};
use mindhit_domain::constants::TAB_STATUS_COMPLETE;
use mindhit_domain::{
    BrowsingEvent, ControlMessage, DeliveryError, MessageResponse, Result, SessionId,
    SessionStats, TabId, TabNotification,
};
use tokio::sync::mpsc;
use tokio::task::{AbortHandle, Id as TaskId, JoinError, JoinSet};
use tracing::{debug, error, info, trace, warn};

use super::commands::{PipelineCommand, TaskKind, TaskOutcome};
use crate::scheduling::FlushScheduler;

pub(crate) struct PipelineActor {
    tracker: SessionTracker,
    queue: EventQueue,
    engine: DeliveryEngine,
    credentials: StoredCredentials,
    notifier: Arc<dyn TabNotifier>,
    scheduler: FlushScheduler,
    tasks: JoinSet<TaskOutcome>,
    /// What each task in `tasks` does, so a panicked one can be accounted for
    task_kinds: HashMap<TaskId, TaskKind>,
    join_timeout: Duration,
    /// A batch of the live queue is awaiting delivery
    live_in_flight: bool,
    /// Flush requested while `live_in_flight`
    deferred_flush: Option<FlushTrigger>,
    deliveries_in_flight: usize,
    replay_running: bool,
    replay_rerun: bool,
    online: bool,
    shutting_down: bool,
}

pub(crate) struct ActorParts {
    pub engine: DeliveryEngine,
    pub credentials: StoredCredentials,
    pub notifier: Arc<dyn TabNotifier>,
    pub scheduler: FlushScheduler,
    pub batch_size: usize,
    pub max_retry: u32,
    pub join_timeout: Duration,
}

impl PipelineActor {
    pub(crate) fn new(parts: ActorParts) -> Self {
        Self {
            tracker: SessionTracker::new(),
            queue: EventQueue::new(parts.batch_size, parts.max_retry),
            engine: parts.engine,
            credentials: parts.credentials,
            notifier: parts.notifier,
            scheduler: parts.scheduler,
            tasks: JoinSet::new(),
            task_kinds: HashMap::new(),
            join_timeout: parts.join_timeout,
            live_in_flight: false,
            deferred_flush: None,
            deliveries_in_flight: 0,
            replay_running: false,
            replay_rerun: false,
            online: true,
            shutting_down: false,
        }
    }

    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<PipelineCommand>) {
        info!(
            batch_size = self.queue.batch_size(),
            flush_interval_ms = self.scheduler.interval().as_millis() as u64,
            "Event pipeline started"
        );
        self.request_replay("startup");

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => {
                        if self.handle_command(command).await.is_break() {
                            break;
                        }
                    }
                    None => {
                        debug!("All pipeline handles dropped");
                        self.shutdown().await;
                        break;
                    }
                },
                Some(joined) = self.tasks.join_next_with_id(), if !self.tasks.is_empty() => {
                    self.handle_joined(joined);
                }
            }
        }

        info!("Event pipeline stopped");
    }

    async fn handle_command(&mut self, command: PipelineCommand) -> ControlFlow<()> {
        match command {
            PipelineCommand::Control { message, tab, reply } => {
                let response = self.handle_control(message, tab).await;
                if reply.send(response).is_err() {
                    trace!("Reply receiver dropped");
                }
            }
            PipelineCommand::FlushTick => self.on_tick(),
            PipelineCommand::Connectivity { online } => self.on_connectivity(online),
            PipelineCommand::Shutdown { done } => {
                self.shutdown().await;
                if done.send(()).is_err() {
                    trace!("Shutdown receiver dropped");
                }
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    async fn handle_control(
        &mut self,
        message: ControlMessage,
        tab: Option<TabId>,
    ) -> MessageResponse {
        if let Some(tab) = tab {
            self.notifier.register_tab(tab).await;
        }

        trace!(message = message.name(), state = %self.tracker.state(), "Control message");

        match message {
            ControlMessage::SessionStarted { session_id } => match SessionId::new(session_id) {
                Some(session_id) => self.start_session(session_id).await,
                None => debug!("Ignoring SESSION_STARTED with a blank session id"),
            },
            ControlMessage::SessionPaused => {
                let transition = self.tracker.pause();
                self.apply(transition, "SESSION_PAUSED").await;
            }
            ControlMessage::SessionResumed => {
                let transition = self.tracker.resume();
                self.apply(transition, "SESSION_RESUMED").await;
            }
            ControlMessage::SessionStopped => {
                let transition = self.tracker.stop();
                self.apply(transition, "SESSION_STOPPED").await;
            }
            ControlMessage::Event { event } => self.collect_event(event),
            ControlMessage::GetState => return MessageResponse::State(self.tracker.snapshot()),
            ControlMessage::GetStats => return MessageResponse::Stats(self.stats()),
            ControlMessage::IncrementPageCount => {
                if !self.tracker.increment_page_count() {
                    debug!("Ignoring page count while idle");
                }
            }
            ControlMessage::IncrementHighlightCount => {
                if !self.tracker.increment_highlight_count() {
                    debug!("Ignoring highlight count while idle");
                }
            }
            ControlMessage::TabUpdated { tab_id, status, url } => {
                self.on_tab_updated(tab_id, &status, url.as_deref()).await;
            }
            ControlMessage::TabRemoved { tab_id } => self.notifier.unregister_tab(tab_id).await,
            ControlMessage::NetworkStatus { online } => self.on_connectivity(online),
            ControlMessage::AuthUpdated { token } => self.on_auth_updated(token).await,
        }

        MessageResponse::Ack(true)
    }

    async fn start_session(&mut self, session_id: SessionId) {
        let now_ms = Utc::now().timestamp_millis();
        let Some(transition) = self.tracker.start(session_id, now_ms) else {
            debug!(state = %self.tracker.state(), "Ignoring SESSION_STARTED");
            return;
        };

        self.queue.reset();
        self.deferred_flush = None;
        self.apply(Some(transition), "SESSION_STARTED").await;
    }

    async fn apply(&mut self, transition: Option<Transition>, message: &'static str) {
        let Some(transition) = transition else {
            debug!(message, state = %self.tracker.state(), "Ignoring message in current state");
            return;
        };

        match transition.timer_action() {
            TimerAction::Start => {
                if let Err(err) = self.scheduler.start() {
                    warn!(error = %err, "Failed to start flush timer");
                }
            }
            TimerAction::Stop => self.stop_timer().await,
        }

        let delivered = broadcast(self.notifier.as_ref(), transition.notification()).await;

        match transition {
            Transition::Started(session_id) => {
                info!(session_id = %session_id, tabs = delivered, "Recording started");
            }
            Transition::Paused => {
                info!(pending = self.queue.len(), tabs = delivered, "Recording paused");
            }
            Transition::Resumed => {
                info!(tabs = delivered, pending = self.queue.len(), "Recording resumed");
                self.run_deferred_flush();
            }
            Transition::Stopped(session_id) => {
                info!(
                    session_id = %session_id,
                    pending = self.queue.len(),
                    tabs = delivered,
                    "Recording stopped"
                );
                self.deferred_flush = None;
                self.flush_final(session_id, FlushTrigger::SessionStopped);
            }
        }
    }

    async fn stop_timer(&mut self) {
        if !self.scheduler.is_running() {
            return;
        }
        if let Err(err) = self.scheduler.stop().await {
            warn!(error = %err, "Failed to stop flush timer");
        }
    }

    fn collect_event(&mut self, event: BrowsingEvent) {
        match collect(self.tracker.state(), &mut self.queue, event) {
            CollectOutcome::Queued { pending } => trace!(pending, "Event queued"),
            CollectOutcome::FlushRequested { pending } => {
                debug!(pending, "Batch size reached");
                self.flush_live(FlushTrigger::Threshold);
            }
            CollectOutcome::Dropped(_) | CollectOutcome::Rejected(_) => {}
        }
    }

    async fn on_tab_updated(&mut self, tab: TabId, status: &str, url: Option<&str>) {
        self.notifier.register_tab(tab).await;

        let loaded = status == TAB_STATUS_COMPLETE && url.is_some_and(|u| !u.is_empty());
        if !(loaded && self.tracker.is_recording()) {
            return;
        }

        if let Err(err) = self.notifier.notify_tab(tab, TabNotification::PageLoaded).await {
            debug!(tab_id = %tab, error = %err, "Tab did not accept PAGE_LOADED");
        }
    }

    async fn on_auth_updated(&mut self, token: Option<String>) {
        let token = token.filter(|t| !t.trim().is_empty());
        match self.credentials.store_token(token.as_deref()).await {
            Ok(()) if token.is_some() => {
                info!("Bearer token updated");
                self.request_replay("auth_updated");
            }
            Ok(()) => info!("Bearer token cleared"),
            Err(err) => warn!(error = %err, "Failed to store bearer token"),
        }
    }

    fn on_tick(&mut self) {
        if !self.tracker.is_recording() {
            trace!(state = %self.tracker.state(), "Ignoring stale flush tick");
            return;
        }
        self.flush_live(FlushTrigger::Timer);
    }

    fn on_connectivity(&mut self, online: bool) {
        let was_online = std::mem::replace(&mut self.online, online);
        match (was_online, online) {
            (false, true) => {
                info!("Connectivity restored");
                self.request_replay("network_restored");
            }
            (true, false) => info!("Connectivity lost"),
            _ => trace!(online, "Connectivity unchanged"),
        }
    }

    /// Flush the live queue of the active session.
    ///
    /// Only a recording session flushes; a paused one keeps its events queued.
    fn flush_live(&mut self, trigger: FlushTrigger) {
        if !self.tracker.is_recording() {
            trace!(%trigger, state = %self.tracker.state(), "Not recording, keeping events queued");
            return;
        }
        let Some(session_id) = self.tracker.session_id().cloned() else {
            return;
        };

        if self.live_in_flight {
            debug!(%trigger, "Delivery in flight, deferring flush");
            self.deferred_flush.get_or_insert(trigger);
            return;
        }

        let Some(batch) = self.queue.take_batch() else {
            trace!(%trigger, "Nothing to flush");
            return;
        };

        self.live_in_flight = true;
        self.spawn_delivery(session_id, batch, trigger);
    }

    /// Run the flush that was deferred behind a live delivery, once the
    /// delivery has settled and the session is recording again.
    fn run_deferred_flush(&mut self) {
        if self.live_in_flight || self.shutting_down || !self.tracker.is_recording() {
            return;
        }
        if let Some(trigger) = self.deferred_flush.take() {
            self.flush_live(trigger);
        }
    }

    /// Flush whatever is queued without a live queue to retry from.
    fn flush_final(&mut self, session_id: SessionId, trigger: FlushTrigger) {
        if let Some(batch) = self.queue.take_batch() {
            self.spawn_delivery(session_id, batch, trigger);
        }
    }

    fn track(&mut self, handle: AbortHandle, kind: TaskKind) {
        self.task_kinds.insert(handle.id(), kind);
    }

    fn spawn_delivery(
        &mut self,
        session_id: SessionId,
        batch: Vec<BrowsingEvent>,
        trigger: FlushTrigger,
    ) {
        debug!(session_id = %session_id, count = batch.len(), %trigger, "Flushing batch");
        self.deliveries_in_flight += 1;

        let kind =
            if trigger.is_final() { TaskKind::FinalDelivery } else { TaskKind::LiveDelivery };
        let engine = self.engine.clone();
        let handle = self.tasks.spawn(async move {
            let result = engine.deliver(&session_id, &batch).await;
            TaskOutcome::Delivered { session_id, batch, trigger, result }
        });
        self.track(handle, kind);
    }

    fn spawn_persist(&mut self, session_id: SessionId, batch: Vec<BrowsingEvent>) {
        let engine = self.engine.clone();
        let handle = self.tasks.spawn(async move {
            let result = engine.persist(&session_id, &batch).await;
            TaskOutcome::Persisted { session_id, batch, result }
        });
        self.track(handle, TaskKind::Persist);
    }

    fn request_replay(&mut self, reason: &'static str) {
        if self.shutting_down {
            return;
        }
        if self.replay_running {
            debug!(reason, "Replay in progress, scheduling one more sweep");
            self.replay_rerun = true;
            return;
        }

        debug!(reason, "Starting replay sweep");
        self.replay_running = true;
        let engine = self.engine.clone();
        let handle =
            self.tasks.spawn(async move { TaskOutcome::Replayed(engine.replay_pending().await) });
        self.track(handle, TaskKind::Replay);
    }

    fn handle_joined(
        &mut self,
        joined: std::result::Result<(TaskId, TaskOutcome), JoinError>,
    ) {
        let (id, outcome) = match joined {
            Ok(joined) => joined,
            Err(err) => return self.on_task_lost(err),
        };
        self.task_kinds.remove(&id);

        match outcome {
            TaskOutcome::Delivered { session_id, batch, trigger, result } => {
                self.on_delivered(session_id, batch, trigger, result);
            }
            TaskOutcome::Persisted { session_id, batch, result } => {
                self.on_persisted(session_id, batch, result);
            }
            TaskOutcome::Replayed(result) => self.on_replayed(result),
        }
    }

    /// Release whatever the lost task was holding. Its payload cannot be
    /// recovered.
    fn on_task_lost(&mut self, err: JoinError) {
        let Some(kind) = self.task_kinds.remove(&err.id()) else {
            error!(error = %err, "Untracked pipeline task failed");
            return;
        };

        if err.is_cancelled() {
            trace!(?kind, "Pipeline task cancelled");
        } else {
            error!(?kind, error = %err, "Pipeline task panicked");
        }

        match kind {
            TaskKind::LiveDelivery => {
                self.deliveries_in_flight = self.deliveries_in_flight.saturating_sub(1);
                self.live_in_flight = false;
                self.run_deferred_flush();
            }
            TaskKind::FinalDelivery => {
                self.deliveries_in_flight = self.deliveries_in_flight.saturating_sub(1);
            }
            TaskKind::Persist => {}
            TaskKind::Replay => {
                self.replay_running = false;
                if std::mem::take(&mut self.replay_rerun) {
                    self.request_replay("rerun");
                }
            }
        }
    }

    fn on_delivered(
        &mut self,
        session_id: SessionId,
        batch: Vec<BrowsingEvent>,
        trigger: FlushTrigger,
        result: std::result::Result<(), DeliveryError>,
    ) {
        self.deliveries_in_flight = self.deliveries_in_flight.saturating_sub(1);
        let live = !trigger.is_final();
        if live {
            self.live_in_flight = false;
        }
        let active = self.tracker.session_id() == Some(&session_id);

        match result {
            Ok(()) => {
                info!(session_id = %session_id, count = batch.len(), %trigger, "Batch delivered");
                if live && active {
                    self.queue.record_success();
                }
            }
            Err(err) if !live || !active || self.shutting_down => {
                warn!(
                    session_id = %session_id,
                    count = batch.len(),
                    %trigger,
                    error = %err,
                    "Delivery failed without a live queue, persisting batch"
                );
                self.spawn_persist(session_id, batch);
            }
            Err(err) => match self.queue.record_failure(batch) {
                FailureOutcome::Requeued => {
                    debug!(
                        retry_count = self.queue.retry_count(),
                        pending = self.queue.len(),
                        kind = err.label(),
                        "Batch re-queued"
                    );
                }
                FailureOutcome::Exhausted(batch) => {
                    warn!(
                        session_id = %session_id,
                        count = batch.len(),
                        "Retry budget exhausted, persisting batch"
                    );
                    self.spawn_persist(session_id, batch);
                }
            },
        }

        self.run_deferred_flush();
    }

    fn on_persisted(
        &mut self,
        session_id: SessionId,
        batch: Vec<BrowsingEvent>,
        result: Result<String>,
    ) {
        let Err(err) = result else {
            return;
        };

        let active = self.tracker.session_id() == Some(&session_id);
        if active && !self.shutting_down {
            warn!(error = %err, count = batch.len(), "Failed to persist batch, keeping it queued");
            self.queue.requeue_front(batch);
        } else {
            error!(
                session_id = %session_id,
                error = %err,
                count = batch.len(),
                "Failed to persist batch, events lost"
            );
        }
    }

    fn on_replayed(&mut self, result: Result<ReplayReport>) {
        self.replay_running = false;

        match result {
            Ok(report) if report.attempted > 0 || report.corrupt > 0 => info!(
                replayed = report.replayed,
                failed = report.failed,
                corrupt = report.corrupt,
                events = report.events_delivered,
                "Replay sweep finished"
            ),
            Ok(_) => trace!("Replay sweep found nothing to deliver"),
            Err(err) => warn!(error = %err, "Replay sweep failed"),
        }

        if std::mem::take(&mut self.replay_rerun) {
            self.request_replay("rerun");
        }
    }

    fn stats(&self) -> SessionStats {
        SessionStats {
            state: self.tracker.state(),
            session_id: self.tracker.session_id().cloned(),
            counters: self.tracker.counters(),
            started_at: self.tracker.started_at(),
            pending_events: self.queue.len(),
            deliveries_in_flight: self.deliveries_in_flight,
            replay_in_progress: self.replay_running,
        }
    }

    async fn shutdown(&mut self) {
        if self.shutting_down {
            return;
        }
        self.shutting_down = true;

        info!(pending = self.queue.len(), tasks = self.tasks.len(), "Shutting down event pipeline");
        self.stop_timer().await;

        if let Some(session_id) = self.tracker.session_id().cloned() {
            if let Some(batch) = self.queue.take_batch() {
                self.spawn_persist(session_id, batch);
            }
        }

        let deadline = tokio::time::sleep(self.join_timeout);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                joined = self.tasks.join_next_with_id() => match joined {
                    Some(joined) => self.handle_joined(joined),
                    None => break,
                },
                _ = &mut deadline => {
                    warn!(remaining = self.tasks.len(), "Timed out waiting for pipeline tasks");
                    self.tasks.abort_all();
                    break;
                }
            }
        }
    }
}
