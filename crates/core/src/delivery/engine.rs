//! Delivery and durable retry engine
//!
//! Sends batches through an [`EventSink`], writes batches that exhausted
//! their in-memory retry budget to the [`KeyValueStore`], and replays those
//! records later against the session they were created under.

use std::sync::Arc;

use chrono::Utc;
use mindhit_domain::constants::PENDING_EVENTS_PREFIX;
use mindhit_domain::{
    BrowsingEvent, DeliveryError, MindhitError, Result, RetryPayload, RetryRecord, SessionId,
};
use tracing::{debug, info, instrument, warn};

use super::ports::EventSink;
use crate::storage::ports::KeyValueStore;

/// Outcome of one replay sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Records whose delivery was attempted
    pub attempted: usize,
    /// Records delivered and deleted
    pub replayed: usize,
    /// Records left in place after a failed attempt
    pub failed: usize,
    /// Records that could not be decoded; left untouched
    pub corrupt: usize,
    /// Records without events, deleted without delivery
    pub removed_empty: usize,
    pub events_delivered: usize,
}

impl ReplayReport {
    /// True when every deliverable record was delivered.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

/// Network delivery with durable fallback.
#[derive(Clone)]
pub struct DeliveryEngine {
    sink: Arc<dyn EventSink>,
    store: Arc<dyn KeyValueStore>,
}

impl DeliveryEngine {
    pub fn new(sink: Arc<dyn EventSink>, store: Arc<dyn KeyValueStore>) -> Self {
        Self { sink, store }
    }

    /// Attempt one delivery of `events` for `session_id`.
    ///
    /// # Errors
    /// Returns the sink's [`DeliveryError`] unchanged.
    #[instrument(skip(self, events), fields(session_id = %session_id, count = events.len()))]
    pub async fn deliver(
        &self,
        session_id: &SessionId,
        events: &[BrowsingEvent],
    ) -> std::result::Result<(), DeliveryError> {
        match self.sink.deliver(session_id, events).await {
            Ok(()) => {
                debug!("Batch delivered");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, kind = err.label(), "Batch delivery failed");
                Err(err)
            }
        }
    }

    /// Write `events` as a durable retry record and return its key.
    ///
    /// # Errors
    /// Returns `MindhitError::Storage` when the record cannot be written.
    #[instrument(skip(self, events), fields(session_id = %session_id, count = events.len()))]
    pub async fn persist(&self, session_id: &SessionId, events: &[BrowsingEvent]) -> Result<String> {
        let record = RetryRecord::new(session_id.clone(), events.to_vec(), Utc::now());
        let value = serde_json::to_value(&record.payload)
            .map_err(|e| MindhitError::Internal(format!("Failed to encode retry record: {e}")))?;

        self.store.set(&record.key, value).await?;
        info!(key = %record.key, "Batch persisted for replay");
        Ok(record.key)
    }

    /// Keys of all durable retry records, oldest first.
    pub async fn pending_keys(&self) -> Result<Vec<String>> {
        self.store.list(PENDING_EVENTS_PREFIX).await
    }

    /// Try to deliver every durable retry record once.
    ///
    /// Delivered records are deleted; failed ones stay for the next sweep.
    ///
    /// # Errors
    /// Fails only when the records cannot be enumerated. Per-record problems
    /// are counted in the returned report.
    #[instrument(skip(self))]
    pub async fn replay_pending(&self) -> Result<ReplayReport> {
        let keys = self.pending_keys().await?;
        let mut report = ReplayReport::default();

        if keys.is_empty() {
            debug!("No durable records to replay");
            return Ok(report);
        }

        info!(records = keys.len(), "Replaying durable records");

        for key in keys {
            let value = match self.store.get(&key).await {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(err) => {
                    warn!(key = %key, error = %err, "Failed to read durable record");
                    report.failed += 1;
                    continue;
                }
            };

            let payload: RetryPayload = match serde_json::from_value(value) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(key = %key, error = %err, "Skipping undecodable durable record");
                    report.corrupt += 1;
                    continue;
                }
            };

            if payload.events.is_empty() {
                if let Err(err) = self.store.remove(&key).await {
                    warn!(key = %key, error = %err, "Failed to remove empty durable record");
                } else {
                    report.removed_empty += 1;
                }
                continue;
            }

            report.attempted += 1;
            if self.deliver(&payload.session_id, &payload.events).await.is_err() {
                report.failed += 1;
                continue;
            }

            if let Err(err) = self.store.remove(&key).await {
                // The batch will be sent again on the next sweep.
                warn!(key = %key, error = %err, "Failed to remove replayed record");
            }
            report.replayed += 1;
            report.events_delivered += payload.events.len();
        }

        info!(
            replayed = report.replayed,
            failed = report.failed,
            corrupt = report.corrupt,
            "Durable replay finished"
        );
        Ok(report)
    }
}
